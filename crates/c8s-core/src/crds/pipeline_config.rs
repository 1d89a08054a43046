//! `PipelineConfig` — desired pipeline shape (section 3).

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::duration::WireDuration;

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "c8s.dev",
    version = "v1alpha1",
    kind = "PipelineConfig",
    namespaced,
    status = "PipelineConfigStatus",
    printcolumn = r#"{"name":"Repository", "type":"string", "jsonPath":".spec.repository"}"#,
    printcolumn = r#"{"name":"Steps", "type":"integer", "jsonPath":".spec.steps.length"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfigSpec {
    /// Git URL (http(s)/git/ssh scheme, host required).
    pub repository: String,

    /// Ordered sequence of glob patterns; default `["*"]`.
    #[serde(default = "default_branches")]
    pub branches: Vec<String>,

    /// Ordered sequence of steps, minimum 1, names unique within a config.
    pub steps: Vec<Step>,

    /// Optional cartesian matrix of dimension -> values with exclusions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix: Option<MatrixSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<RetryPolicy>,
}

fn default_branches() -> Vec<String> {
    vec!["*".to_string()]
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfigStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// DNS-1123-like step name, unique within a config.
    pub name: String,
    pub image: String,
    /// Non-empty.
    pub commands: Vec<String>,
    /// Subset of prior step names; must not reference self.
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub resources: ResourceRequirements,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<WireDuration>,
    #[serde(default)]
    pub artifacts: Vec<String>,
    #[serde(default)]
    pub secrets: Vec<SecretRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional: Option<Conditional>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequirements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecretRef {
    pub secret_name: String,
    pub key: String,
    /// Defaults to `key` when absent (section 4.2).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_var: Option<String>,
}

impl SecretRef {
    pub fn env_var_name(&self) -> &str {
        self.env_var.as_deref().unwrap_or(&self.key)
    }
}

/// `branch` is treated as a pre-expansion filter on step inclusion;
/// `onSuccess` defaults to the usual "all deps Succeeded" gating, and
/// `onSuccess: false` marks a cleanup step that becomes ready once its
/// dependencies reach any terminal state (decision recorded in DESIGN.md).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Conditional {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default = "default_on_success")]
    pub on_success: bool,
}

fn default_on_success() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatrixSpec {
    pub dimensions: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub exclude: Vec<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// 0..=10.
    pub max_retries: u32,
    #[serde(default)]
    pub backoff_seconds: u64,
}

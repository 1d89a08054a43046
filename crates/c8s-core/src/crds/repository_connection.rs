//! `RepositoryConnection` — binds a repo URL to webhook/auth credentials
//! and a default PipelineConfig (section 3).

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum GitProvider {
    Github,
    Gitlab,
    Bitbucket,
}

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "c8s.dev",
    version = "v1alpha1",
    kind = "RepositoryConnection",
    namespaced,
    status = "RepositoryConnectionStatus",
    printcolumn = r#"{"name":"Repository", "type":"string", "jsonPath":".spec.repository"}"#,
    printcolumn = r#"{"name":"Provider", "type":"string", "jsonPath":".spec.provider"}"#,
    printcolumn = r#"{"name":"Registered", "type":"boolean", "jsonPath":".status.registered"}"#,
    printcolumn = r#"{"name":"Last Event", "type":"date", "jsonPath":".status.lastEventAt"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryConnectionSpec {
    /// Git URL this connection watches (HTTPS clone URL, canonically).
    pub repository: String,
    pub provider: GitProvider,
    /// Name of a Secret (in the same namespace) holding the webhook
    /// signing secret / token, under key `secret`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_secret_name: Option<String>,
    /// Name of a Secret holding auth credentials for cloning, if private.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_secret_name: Option<String>,
    /// Default PipelineConfig triggered by push events on this connection.
    pub pipeline_config_ref: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryConnectionStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_endpoint: Option<String>,
    #[serde(default)]
    pub registered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event_commit: Option<String>,
}

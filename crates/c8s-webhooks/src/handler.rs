//! Shared push-event processing (section 4.6 steps 4-7), parameterized
//! over the provider-specific parsing/signature pieces in `event`/`signature`.

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::HeaderMap;
use axum::Json;
use c8s_core::crds::{PipelineConfig, PipelineRun, PipelineRunSpec, RepositoryConnection};
use c8s_core::labels;
use c8s_store::StateStore;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Api, ResourceExt};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::WebhookError;
use crate::event::NormalizedPushEvent;
use crate::Context;

pub async fn process(
    ctx: &Arc<Context>,
    event: NormalizedPushEvent,
    headers: &HeaderMap,
    body: &Bytes,
    verify: impl Fn(&str, &[u8], &HeaderMap) -> bool,
) -> Result<Json<Value>, WebhookError> {
    let (namespace, connection) = find_connection(ctx, &event.clone_urls)
        .await?
        .ok_or_else(|| WebhookError::NotFound("no RepositoryConnection matches this repository".to_string()))?;

    if let Some(secret_name) = &connection.spec.webhook_secret_name {
        let secret: Secret = ctx
            .store
            .get_opt(&namespace, secret_name)
            .await?
            .ok_or_else(|| WebhookError::Internal(format!("webhook secret '{secret_name}' not found")))?;
        let token = secret_value(&secret, "secret")
            .ok_or_else(|| WebhookError::Internal(format!("secret '{secret_name}' has no 'secret' key")))?;
        if !verify(&token, body, headers) {
            warn!(connection = %connection.name_any(), "webhook signature mismatch");
            return Err(WebhookError::Unauthorized("signature verification failed".to_string()));
        }
    }

    let config: PipelineConfig = ctx
        .store
        .get_opt(&namespace, &connection.spec.pipeline_config_ref)
        .await?
        .ok_or_else(|| {
            WebhookError::Internal(format!(
                "RepositoryConnection '{}' references missing PipelineConfig '{}'",
                connection.name_any(),
                connection.spec.pipeline_config_ref
            ))
        })?;

    let Some(branch) = event.branch.as_deref() else {
        info!("push event carries no branch ref (likely a tag push); ignoring");
        return Ok(Json(json!({ "status": "ignored", "reason": "not a branch push" })));
    };

    if !matches_branch_pattern(branch, &config.spec.branches) {
        info!(branch, "push does not match configured trigger branches; ignoring");
        return Ok(Json(json!({ "status": "ignored", "reason": "branch not triggered" })));
    }

    let short_commit = &event.commit[..8.min(event.commit.len())];
    let run_name = format!("{}-{short_commit}", connection.name_any());

    if ctx.store.get_opt::<PipelineRun>(&namespace, &run_name).await?.is_some() {
        info!(run = %run_name, "pipeline run already exists for this commit; skipping");
        return Ok(Json(json!({ "status": "ok", "run": run_name, "created": false })));
    }

    let mut labels_map = std::collections::BTreeMap::new();
    labels_map.insert(labels::LABEL_REPOSITORY_CONNECTION.to_string(), connection.name_any());
    labels_map.insert(labels::LABEL_BRANCH.to_string(), branch.to_string());
    labels_map.insert(labels::LABEL_COMMIT.to_string(), short_commit.to_string());
    labels_map.insert(labels::LABEL_PIPELINE_CONFIG.to_string(), connection.spec.pipeline_config_ref.clone());

    let mut annotations = std::collections::BTreeMap::new();
    if let Some(author) = &event.author {
        annotations.insert(labels::ANNOTATION_AUTHOR.to_string(), author.clone());
    }
    annotations.insert(labels::ANNOTATION_CLONE_URL.to_string(), event.clone_urls[0].clone());
    if let Some(message) = &event.message {
        annotations.insert(labels::ANNOTATION_COMMIT_MESSAGE.to_string(), message.clone());
    }

    let run = PipelineRun {
        metadata: ObjectMeta {
            name: Some(run_name.clone()),
            namespace: Some(namespace.clone()),
            labels: Some(labels_map),
            annotations: Some(annotations),
            ..Default::default()
        },
        spec: PipelineRunSpec {
            pipeline_config_ref: connection.spec.pipeline_config_ref.clone(),
            commit: event.commit.clone(),
            branch: branch.to_string(),
            triggered_by: event.author.clone(),
            triggered_at: Some(event.timestamp.unwrap_or_else(chrono::Utc::now)),
            matrix_index: None,
            commit_message: event.message.clone(),
            author: event.author.clone(),
        },
        status: None,
    };

    ctx.store.create(&namespace, &run).await?;
    info!(run = %run_name, namespace, "created pipeline run from webhook");
    Ok(Json(json!({ "status": "ok", "run": run_name, "created": true })))
}

fn secret_value(secret: &Secret, key: &str) -> Option<String> {
    if let Some(string_data) = &secret.string_data {
        if let Some(v) = string_data.get(key) {
            return Some(v.clone());
        }
    }
    secret
        .data
        .as_ref()
        .and_then(|d| d.get(key))
        .map(|v| String::from_utf8_lossy(&v.0).to_string())
}

/// Cluster-wide scan for a `RepositoryConnection` whose `spec.repository`
/// matches one of the event's clone URLs. The webhook service has no
/// namespace in its request path (section 6), so unlike every other c8s
/// lookup this one goes through `Api::all` directly rather than
/// `StateStore`, which is namespace-scoped by design.
async fn find_connection(
    ctx: &Context,
    clone_urls: &[String],
) -> Result<Option<(String, RepositoryConnection)>, WebhookError> {
    let api: Api<RepositoryConnection> = Api::all(ctx.store.client().clone());
    let list = api.list(&Default::default()).await.map_err(c8s_core::Error::from)?;

    for url in clone_urls {
        for connection in &list.items {
            if &connection.spec.repository == url {
                let namespace = connection
                    .namespace()
                    .ok_or_else(|| WebhookError::Internal("RepositoryConnection has no namespace".to_string()))?;
                return Ok(Some((namespace, connection.clone())));
            }
        }
    }
    Ok(None)
}

/// Glob-ish branch matching: `*` wildcard, same four-case handling as
/// `buildit_api::routes::webhooks::matches_branch_pattern`.
pub fn matches_branch_pattern(branch: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|pattern| {
        if let Some(stripped) = pattern.strip_prefix('*') {
            if pattern.ends_with('*') && pattern.len() > 1 {
                let inner = &pattern[1..pattern.len() - 1];
                return branch.contains(inner);
            }
            return branch.ends_with(stripped);
        }
        if let Some(prefix) = pattern.strip_suffix('*') {
            return branch.starts_with(prefix);
        }
        branch == pattern
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_matches_everything() {
        assert!(matches_branch_pattern("main", &["*".to_string()]));
    }

    #[test]
    fn prefix_glob() {
        assert!(matches_branch_pattern("release-1.2", &["release-*".to_string()]));
        assert!(!matches_branch_pattern("main", &["release-*".to_string()]));
    }

    #[test]
    fn exact_match_only() {
        assert!(matches_branch_pattern("main", &["main".to_string()]));
        assert!(!matches_branch_pattern("develop", &["main".to_string()]));
    }
}

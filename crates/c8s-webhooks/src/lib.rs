//! Webhook ingester (component 6, section 4.6): one HTTP endpoint per
//! supported Git provider, each normalizing its push payload and turning it
//! into (at most) one `PipelineRun`.
//!
//! Grounds the router/handler shape on `buildit_api::routes::webhooks`
//! (header inspection, signature verification, payload parsing into a
//! normalized push event, triggering downstream work) reworked to create a
//! `PipelineRun` object instead of inserting a SQL row.

pub mod error;
pub mod event;
pub mod handler;
mod signature;

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use c8s_store::KubeStateStore;
use serde_json::Value;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::WebhookError;

pub struct Context {
    pub store: KubeStateStore,
}

pub fn router(ctx: Arc<Context>) -> Router {
    Router::new()
        .route("/webhooks/github", post(github))
        .route("/webhooks/gitlab", post(gitlab))
        .route("/webhooks/bitbucket", post(bitbucket))
        .route("/health", get(health))
        .route("/ready", get(health))
        .route("/", get(index))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn health() -> &'static str {
    "ok"
}

async fn index() -> &'static str {
    "c8s-webhooks: POST /webhooks/{github,gitlab,bitbucket}"
}

async fn github(
    State(ctx): State<Arc<Context>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, WebhookError> {
    let event_type = headers.get("X-GitHub-Event").and_then(|v| v.to_str().ok()).unwrap_or("");
    if event_type != "push" {
        info!(event = event_type, "ignoring non-push GitHub event");
        return Ok(Json(serde_json::json!({ "status": "ignored", "reason": "not a push event" })));
    }

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| WebhookError::BadRequest(format!("invalid JSON: {e}")))?;
    let event = event::from_github_payload(&payload)
        .ok_or_else(|| WebhookError::BadRequest("push payload missing required fields".to_string()))?;

    handler::process(&ctx, event, &headers, &body, |secret, body, headers| {
        let sig = headers.get("X-Hub-Signature-256").and_then(|v| v.to_str().ok());
        signature::verify_hmac_sha256(secret, body, sig)
    })
    .await
}

async fn gitlab(
    State(ctx): State<Arc<Context>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, WebhookError> {
    let event_type = headers.get("X-Gitlab-Event").and_then(|v| v.to_str().ok()).unwrap_or("");
    if event_type != "Push Hook" {
        info!(event = event_type, "ignoring non-push GitLab event");
        return Ok(Json(serde_json::json!({ "status": "ignored", "reason": "not a push event" })));
    }

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| WebhookError::BadRequest(format!("invalid JSON: {e}")))?;
    let event = event::from_gitlab_payload(&payload)
        .ok_or_else(|| WebhookError::BadRequest("push payload missing required fields".to_string()))?;

    handler::process(&ctx, event, &headers, &body, |secret, _body, headers| {
        let token = headers.get("X-Gitlab-Token").and_then(|v| v.to_str().ok());
        signature::verify_token(secret, token)
    })
    .await
}

async fn bitbucket(
    State(ctx): State<Arc<Context>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, WebhookError> {
    let event_type = headers.get("X-Event-Key").and_then(|v| v.to_str().ok()).unwrap_or("");
    if event_type != "repo:push" {
        info!(event = event_type, "ignoring non-push Bitbucket event");
        return Ok(Json(serde_json::json!({ "status": "ignored", "reason": "not a push event" })));
    }

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| WebhookError::BadRequest(format!("invalid JSON: {e}")))?;
    let event = event::from_bitbucket_payload(&payload)
        .ok_or_else(|| WebhookError::BadRequest("push payload missing required fields".to_string()))?;

    handler::process(&ctx, event, &headers, &body, |secret, body, headers| {
        let sig = headers.get("X-Hub-Signature").and_then(|v| v.to_str().ok());
        signature::verify_hmac_sha256(secret, body, sig)
    })
    .await
}

//! Log pipeline (component 7, section 4.7): per-step ring buffer and
//! broadcast fan-out for the live phase, secret masking on every write,
//! object-store archival on step completion, and the HTTP retrieval
//! endpoint that serves whichever phase a step is currently in.

pub mod archive;
pub mod error;
pub mod http;
pub mod ingest;
pub mod masking;
pub mod pipeline;
pub mod ring;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

pub use archive::ObjectStoreArchiver;
pub use http::LogsContext;
pub use masking::SecretMasker;
pub use pipeline::{LogRegistry, StepKey, StepPipeline};

pub fn router(ctx: Arc<LogsContext>) -> Router {
    Router::new()
        .route(
            "/api/v1/namespaces/{namespace}/pipelineruns/{run}/logs/{step}",
            get(http::get_logs),
        )
        .route("/health", get(health))
        .route("/ready", get(health))
        .route("/", get(index))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

pub fn new_context(
    registry: Arc<LogRegistry>,
    operator: opendal::Operator,
    log_prefix: impl Into<String>,
    signed_url_expiry: Duration,
) -> LogsContext {
    LogsContext {
        registry,
        operator,
        log_prefix: log_prefix.into(),
        signed_url_expiry,
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn index() -> &'static str {
    "c8s-logs: GET /api/v1/namespaces/{namespace}/pipelineruns/{run}/logs/{step}?follow=<bool>"
}

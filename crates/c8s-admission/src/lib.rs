//! Admission validators (component 5, section 4.5): two synchronous HTTP
//! services consuming `admission.k8s.io/v1` `AdmissionReview` requests and
//! returning the matching response, always echoing the request UID.
//!
//! Grounds the axum service shape and router-per-crate convention on
//! `buildit-api::routes::router`/`buildit-api::routes::health`; the
//! request/response envelope itself is `kube::core::admission`, not a
//! hand-rolled type, since that's the crate the operator already depends on
//! for everything else k8s-shaped.

pub mod quota;
pub mod secrets;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use c8s_core::Defaults;
use c8s_store::KubeStateStore;
use tower_http::trace::TraceLayer;

/// Shared state for both validators: a state store to look up referenced
/// objects, and the defaults used to fill in unset step resource requests.
pub struct AdmissionContext {
    pub store: KubeStateStore,
    pub defaults: Defaults,
}

pub fn router(ctx: Arc<AdmissionContext>) -> Router {
    Router::new()
        .route("/validate/pipelineconfig", post(secrets::validate))
        .route("/validate/pipelinerun", post(quota::validate))
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
    "c8s-admission: POST /validate/pipelineconfig, /validate/pipelinerun"
}

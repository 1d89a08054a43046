//! Local HTTP error wrapper (section 7.1): mirrors
//! `buildit_api::error::ApiError`'s status-code mapping and `{"error": ...}`
//! body shape, over `c8s_core::Error` plus the couple of HTTP-only cases
//! (missing connection, bad signature) that don't correspond to a store error.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug)]
pub enum WebhookError {
    NotFound(String),
    Unauthorized(String),
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            WebhookError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            WebhookError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            WebhookError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            WebhookError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<c8s_core::Error> for WebhookError {
    fn from(err: c8s_core::Error) -> Self {
        match err {
            c8s_core::Error::Validation(msg) => WebhookError::BadRequest(msg),
            c8s_core::Error::Reference(kind) => WebhookError::NotFound(kind.to_string()),
            c8s_core::Error::Auth(msg) => WebhookError::Unauthorized(msg),
            other => WebhookError::Internal(other.to_string()),
        }
    }
}

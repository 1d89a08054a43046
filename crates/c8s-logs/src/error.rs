//! Local HTTP error wrapper (section 7.1), matching `buildit_api::error::ApiError`'s
//! status-code mapping and `{"error": ...}` body shape.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug)]
pub enum LogsError {
    NotFound(String),
    Internal(String),
}

impl IntoResponse for LogsError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            LogsError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            LogsError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

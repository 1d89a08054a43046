//! Retrieval endpoint (section 4.7 "Retrieval", section 6's
//! `GET .../logs/{step}?follow=<bool>`): proxies the live stream while a
//! step is active, otherwise serves (or signs a URL for) the archived object.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::stream;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;

use crate::archive::archive_key;
use crate::error::LogsError;
use crate::pipeline::LogRegistry;

pub struct LogsContext {
    pub registry: Arc<LogRegistry>,
    pub operator: opendal::Operator,
    pub log_prefix: String,
    pub signed_url_expiry: Duration,
}

#[derive(Debug, Deserialize, Default)]
pub struct LogQuery {
    #[serde(default)]
    pub follow: bool,
    /// Ask for a signed URL instead of the archived content itself.
    #[serde(default)]
    pub url: bool,
}

pub async fn get_logs(
    State(ctx): State<Arc<LogsContext>>,
    Path((namespace, run, step)): Path<(String, String, String)>,
    Query(params): Query<LogQuery>,
) -> Result<Response, LogsError> {
    let key = (namespace.clone(), run.clone(), step.clone());

    if let Some(pipeline) = ctx.registry.get(&key) {
        if params.follow {
            let rx = pipeline.subscribe();
            let chunks = stream::unfold(rx, |mut rx| async move {
                loop {
                    match rx.recv().await {
                        Ok(bytes) => return Some((Ok::<_, std::io::Error>(bytes), rx)),
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => return None,
                    }
                }
            });
            let body = Body::from_stream(chunks);
            return Ok((
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                body,
            )
                .into_response());
        }
        return Ok((
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            pipeline.snapshot(),
        )
            .into_response());
    }

    let path = archive_key(&ctx.log_prefix, &namespace, &run, &step);

    if params.url {
        let presigned = ctx
            .operator
            .presign_read(&path, ctx.signed_url_expiry)
            .await
            .map_err(|e| LogsError::Internal(e.to_string()))?;
        return Ok(Json(serde_json::json!({ "url": presigned.uri().to_string() })).into_response());
    }

    let data = ctx
        .operator
        .read(&path)
        .await
        .map_err(|e| LogsError::NotFound(format!("archived log not found: {e}")))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        data.to_vec(),
    )
        .into_response())
}

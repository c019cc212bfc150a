//! HTTP handlers

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::{info, warn};

use coursellm_core::{CancellationToken, ChatRequest};

use crate::error::ProxyError;
use crate::AppState;

/// `POST /api/chat`: relay a streamed completion to the caller
///
/// The response body is the upstream stream, byte for byte. Dropping the
/// body (caller disconnect) cancels the upstream read.
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ProxyError> {
    let Json(request) = payload?;

    let pipe = match state
        .controller
        .start_relay(&request, CancellationToken::new())
        .await
    {
        Ok(pipe) => pipe,
        Err(failure) => {
            warn!(trace = ?failure.trace, "chat request failed: {}", failure);
            return Err(failure.into());
        }
    };

    info!(
        messages = request.messages.len(),
        model = request.model.as_deref().unwrap_or("default"),
        "relaying upstream stream"
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(pipe.into_stream()),
    )
        .into_response())
}

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

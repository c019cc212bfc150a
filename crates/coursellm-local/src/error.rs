//! Companion error type and its HTTP mapping

use axum::extract::rejection::JsonRejection;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LocalError {
    /// Every slot is taken and the gate is in reject mode
    #[error("local engine busy, retry shortly")]
    Busy,

    /// Waited in the queue longer than the configured timeout
    #[error("timed out waiting for a free generation slot")]
    QueueTimeout,

    /// Engine answered with a non-2xx status
    #[error("Local engine API error: {body}")]
    Engine { status: u16, body: String },

    #[error("local engine unreachable: {0}")]
    EngineUnreachable(String),

    #[error("model {model} did not load within the warm-up deadline")]
    WarmupTimeout { model: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl LocalError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Busy | Self::QueueTimeout => StatusCode::SERVICE_UNAVAILABLE,
            Self::Engine { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::EngineUnreachable(_) => StatusCode::BAD_GATEWAY,
            Self::WarmupTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Whether a caller should simply try again
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Busy | Self::QueueTimeout)
    }
}

impl From<JsonRejection> for LocalError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for LocalError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            Self::Engine { .. } => (
                status,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                self.to_string(),
            )
                .into_response(),
            ref error if error.is_retriable() => (
                status,
                [(header::RETRY_AFTER, "1")],
                Json(json!({ "error": error.to_string() })),
            )
                .into_response(),
            error => (status, Json(json!({ "error": error.to_string() }))).into_response(),
        }
    }
}

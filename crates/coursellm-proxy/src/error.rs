//! Mapping from core failures to HTTP responses
//!
//! Only failures that happen before the first byte is relayed end up here.
//! Once streaming has begun, an upstream problem just ends the body.

use axum::extract::rejection::JsonRejection;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use coursellm_core::providers::CREDENTIAL_MISSING_MESSAGE;
use coursellm_core::{FallbackFailure, ProviderError};

#[derive(Debug, Error)]
pub enum ProxyError {
    /// Body could not be decoded as a chat request
    #[error("{0}")]
    BadRequest(String),

    /// The provider chain failed before streaming
    #[error(transparent)]
    Upstream(#[from] FallbackFailure),
}

impl From<JsonRejection> for ProxyError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let failure = match self {
            Self::BadRequest(message) => return json_error(StatusCode::BAD_REQUEST, message),
            Self::Upstream(failure) => failure,
        };

        match failure.error {
            ProviderError::CredentialMissing { .. } => {
                json_error(StatusCode::INTERNAL_SERVER_ERROR, CREDENTIAL_MISSING_MESSAGE)
            }
            ProviderError::UpstreamRejected { status, body, .. } => {
                let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
                (
                    status,
                    [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                    format!("{} API error: {}", failure.provider, body),
                )
                    .into_response()
            }
            error @ ProviderError::UpstreamUnreachable { .. } => {
                json_error(StatusCode::BAD_GATEWAY, error.to_string())
            }
            ProviderError::InvalidRequest(message) => json_error(StatusCode::BAD_REQUEST, message),
            error => json_error(StatusCode::INTERNAL_SERVER_ERROR, error.to_string()),
        }
    }
}

//! Provider error types

use thiserror::Error;

/// Message returned to callers when no credential could be found
pub const CREDENTIAL_MISSING_MESSAGE: &str = "API key not configured on the server";

/// Errors that can occur while dispatching to or streaming from a provider
#[derive(Error, Debug)]
pub enum ProviderError {
    /// No usable secret anywhere in the resolution chain
    #[error("API key not configured on the server")]
    CredentialMissing { provider: String },

    /// Upstream answered with a non-2xx status
    #[error("{provider} API error ({status}): {body}")]
    UpstreamRejected {
        provider: String,
        status: u16,
        body: String,
    },

    /// Upstream could not be reached (DNS, refused, timeout)
    #[error("{provider} unreachable: {message}")]
    UpstreamUnreachable { provider: String, message: String },

    /// Upstream dropped after streaming began
    #[error("{provider} stream interrupted: {message}")]
    StreamInterrupted { provider: String, message: String },

    /// Request was cancelled by the caller
    #[error("Request cancelled")]
    Cancelled,

    /// The inbound request violated an invariant
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// JSON encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Anything else that went wrong before streaming started
    #[error("{0}")]
    Internal(String),
}

impl ProviderError {
    pub fn credential_missing(provider: impl Into<String>) -> Self {
        Self::CredentialMissing {
            provider: provider.into(),
        }
    }

    pub fn rejected(provider: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::UpstreamRejected {
            provider: provider.into(),
            status,
            body: body.into(),
        }
    }

    pub fn unreachable(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UpstreamUnreachable {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn interrupted(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StreamInterrupted {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Classify a reqwest failure raised while sending a request
    ///
    /// Nothing has streamed yet, so every send-phase failure (connect,
    /// timeout, redirect, body) counts as the provider being unreachable.
    pub fn from_send_error(provider: impl Into<String>, error: reqwest::Error) -> Self {
        Self::unreachable(provider, error.to_string())
    }

    /// Whether the fallback chain may move on to the next provider
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(
            self,
            Self::CredentialMissing { .. }
                | Self::UpstreamRejected { .. }
                | Self::UpstreamUnreachable { .. }
        )
    }

    /// Upstream status to mirror back to the caller, if any
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::UpstreamRejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_missing_message() {
        let err = ProviderError::credential_missing("groq");
        assert_eq!(err.to_string(), CREDENTIAL_MISSING_MESSAGE);
    }

    #[test]
    fn test_rejected_keeps_status_and_body() {
        let err = ProviderError::rejected("Groq", 429, "rate limited");
        assert_eq!(err.upstream_status(), Some(429));
        assert!(err.to_string().contains("rate limited"));
    }

    #[test]
    fn test_fallback_eligibility() {
        assert!(ProviderError::credential_missing("groq").is_fallback_eligible());
        assert!(ProviderError::rejected("groq", 500, "").is_fallback_eligible());
        assert!(ProviderError::unreachable("local", "refused").is_fallback_eligible());
        assert!(!ProviderError::Cancelled.is_fallback_eligible());
        assert!(!ProviderError::InvalidRequest("empty".into()).is_fallback_eligible());
        assert!(!ProviderError::interrupted("groq", "eof").is_fallback_eligible());
    }

    #[tokio::test]
    async fn test_redirect_failure_is_unreachable() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("location", format!("{}/loop", server.uri())),
            )
            .mount(&server)
            .await;

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(0))
            .build()
            .unwrap();
        let send_error = client.post(server.uri()).send().await.unwrap_err();
        assert!(send_error.is_redirect());

        let err = ProviderError::from_send_error("groq", send_error);
        assert!(matches!(err, ProviderError::UpstreamUnreachable { .. }));
        assert!(err.is_fallback_eligible());
    }
}

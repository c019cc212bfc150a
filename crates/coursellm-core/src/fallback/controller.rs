//! Ordered provider chain with a single attempt per provider
//!
//! ```text
//! ResolvingCredential -> DispatchingPrimary -> Success
//!                                           -> DispatchFailed -> DispatchingSecondary -> Success
//!                                                             -> TerminalFailure      -> TerminalFailure
//! ResolvingCredential -> TerminalFailure (credential missing, no secondary)
//! ```
//!
//! Success means upstream accepted the request and started streaming. There
//! is no retry of the same provider and no backoff: a missing key or a
//! stopped engine does not fix itself on a second try.

use std::sync::Arc;

use thiserror::Error;

use crate::config::ProxyConfig;
use crate::logging::SharedLogger;
use crate::{log_info, log_warn};
use crate::providers::{create_providers, Provider, ProviderError, UpstreamStream};
use crate::relay::RelayPipe;
use crate::types::{CancellationToken, ChatRequest};

/// States visited while serving one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackState {
    ResolvingCredential,
    DispatchingPrimary,
    DispatchFailed,
    DispatchingSecondary,
    Success,
    TerminalFailure,
}

/// A provider accepted the request
pub struct FallbackOutcome {
    /// `name()` of the provider that is streaming
    pub provider: String,
    pub stream: UpstreamStream,
    pub trace: Vec<FallbackState>,
}

impl FallbackOutcome {
    /// Couple the live stream to the caller
    pub fn into_pipe(self, cancel_token: CancellationToken, logger: SharedLogger) -> RelayPipe {
        RelayPipe::new(self.stream, cancel_token, self.provider, logger)
    }
}

impl std::fmt::Debug for FallbackOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackOutcome")
            .field("provider", &self.provider)
            .field("trace", &self.trace)
            .finish()
    }
}

/// Every provider failed, or the request could not be attempted
#[derive(Debug, Error)]
#[error("{provider}: {error}")]
pub struct FallbackFailure {
    /// Display name of the provider whose error is surfaced
    pub provider: String,
    pub error: ProviderError,
    pub trace: Vec<FallbackState>,
}

/// Runs the provider chain for one request
pub struct FallbackController {
    providers: Vec<Arc<dyn Provider>>,
    logger: SharedLogger,
}

impl FallbackController {
    /// Chain in priority order: primary first
    pub fn new(providers: Vec<Arc<dyn Provider>>, logger: SharedLogger) -> Self {
        Self { providers, logger }
    }

    /// Cloud provider, then local when fallback is enabled
    pub fn from_config(config: &ProxyConfig, client: reqwest::Client, logger: SharedLogger) -> Self {
        let providers = create_providers(config, client, Arc::clone(&logger));
        Self::new(providers, logger)
    }

    pub fn providers(&self) -> &[Arc<dyn Provider>] {
        &self.providers
    }

    pub fn has_secondary(&self) -> bool {
        self.providers.len() > 1
    }

    /// Try each provider once, in order, until one starts streaming
    ///
    /// When every provider fails, the primary's error is the one surfaced;
    /// later failures are logged.
    pub async fn dispatch(
        &self,
        request: &ChatRequest,
        cancel_token: CancellationToken,
    ) -> Result<FallbackOutcome, FallbackFailure> {
        let mut trace = vec![FallbackState::ResolvingCredential];

        if let Err(message) = request.validate() {
            trace.push(FallbackState::TerminalFailure);
            return Err(FallbackFailure {
                provider: "proxy".to_string(),
                error: ProviderError::InvalidRequest(message),
                trace,
            });
        }

        let mut first_failure: Option<(String, ProviderError)> = None;

        for (index, provider) in self.providers.iter().enumerate() {
            if cancel_token.is_cancelled() {
                trace.push(FallbackState::TerminalFailure);
                return Err(FallbackFailure {
                    provider: provider.display_name().to_string(),
                    error: ProviderError::Cancelled,
                    trace,
                });
            }

            trace.push(if index == 0 {
                FallbackState::DispatchingPrimary
            } else {
                FallbackState::DispatchingSecondary
            });

            match provider.dispatch(request, cancel_token.clone()).await {
                Ok(stream) => {
                    trace.push(FallbackState::Success);
                    log_info!(
                        self.logger,
                        "FallbackController: {} accepted request (attempt {})",
                        provider.name(),
                        index + 1
                    );
                    return Ok(FallbackOutcome {
                        provider: provider.name().to_string(),
                        stream,
                        trace,
                    });
                }
                Err(error) => {
                    // A missing key fails before anything leaves the proxy
                    let never_dispatched =
                        index == 0 && matches!(error, ProviderError::CredentialMissing { .. });
                    if never_dispatched {
                        trace.pop();
                    }

                    log_warn!(
                        self.logger,
                        "FallbackController: {} failed: {}",
                        provider.name(),
                        error
                    );

                    let eligible = error.is_fallback_eligible();
                    let failure = first_failure
                        .take()
                        .unwrap_or_else(|| (provider.display_name().to_string(), error));

                    if !eligible || index + 1 == self.providers.len() {
                        trace.push(FallbackState::TerminalFailure);
                        return Err(FallbackFailure {
                            provider: failure.0,
                            error: failure.1,
                            trace,
                        });
                    }

                    if !never_dispatched {
                        trace.push(FallbackState::DispatchFailed);
                    }
                    first_failure = Some(failure);
                }
            }
        }

        trace.push(FallbackState::TerminalFailure);
        let (provider, error) = first_failure.unwrap_or_else(|| {
            (
                "proxy".to_string(),
                ProviderError::Internal("no upstream providers configured".to_string()),
            )
        });
        Err(FallbackFailure {
            provider,
            error,
            trace,
        })
    }

    /// `dispatch`, then wrap the winning stream in a relay pipe
    pub async fn start_relay(
        &self,
        request: &ChatRequest,
        cancel_token: CancellationToken,
    ) -> Result<RelayPipe, FallbackFailure> {
        let outcome = self.dispatch(request, cancel_token.clone()).await?;
        Ok(outcome.into_pipe(cancel_token, Arc::clone(&self.logger)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NoOpLogger;
    use crate::providers::MockProvider;
    use crate::types::ChatMessage;
    use futures::StreamExt;
    use FallbackState::*;

    fn request() -> ChatRequest {
        ChatRequest::new(vec![ChatMessage::user("Summarize lesson 3")])
    }

    fn controller(providers: Vec<Arc<dyn Provider>>) -> FallbackController {
        FallbackController::new(providers, Arc::new(NoOpLogger))
    }

    #[tokio::test]
    async fn test_primary_success_dispatches_once() {
        let primary = Arc::new(MockProvider::labeled("groq", 3));
        let secondary = Arc::new(MockProvider::labeled("local", 3));
        let (p, s) = (primary.counters(), secondary.counters());

        let outcome = controller(vec![primary, secondary])
            .dispatch(&request(), CancellationToken::new())
            .await
            .expect("primary should win");

        assert_eq!(outcome.provider, "groq");
        assert_eq!(outcome.trace, vec![ResolvingCredential, DispatchingPrimary, Success]);
        assert_eq!(p.dispatches(), 1);
        assert_eq!(s.dispatches(), 0);
    }

    #[tokio::test]
    async fn test_credential_missing_without_secondary_is_terminal() {
        let primary = Arc::new(MockProvider::without_credential("groq"));
        let failure = controller(vec![primary])
            .dispatch(&request(), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(failure.error, ProviderError::CredentialMissing { .. }));
        assert_eq!(failure.trace, vec![ResolvingCredential, TerminalFailure]);
    }

    #[tokio::test]
    async fn test_credential_missing_falls_back_to_local() {
        let primary = Arc::new(MockProvider::without_credential("groq"));
        let secondary = Arc::new(MockProvider::labeled("local", 2));

        let outcome = controller(vec![primary, secondary])
            .dispatch(&request(), CancellationToken::new())
            .await
            .expect("local should answer");

        assert_eq!(outcome.provider, "local");
        assert_eq!(
            outcome.trace,
            vec![ResolvingCredential, DispatchingSecondary, Success]
        );
    }

    #[tokio::test]
    async fn test_rejection_falls_back_to_secondary() {
        let primary = Arc::new(MockProvider::rejecting("groq", 503, "overloaded"));
        let secondary = Arc::new(MockProvider::labeled("local", 2));
        let counters = secondary.counters();

        let outcome = controller(vec![primary, secondary])
            .dispatch(&request(), CancellationToken::new())
            .await
            .expect("local should answer");

        assert_eq!(outcome.provider, "local");
        assert_eq!(
            outcome.trace,
            vec![
                ResolvingCredential,
                DispatchingPrimary,
                DispatchFailed,
                DispatchingSecondary,
                Success
            ]
        );
        assert_eq!(counters.dispatches(), 1);
        let chunks: Vec<_> = outcome.stream.collect().await;
        assert_eq!(chunks.len(), 2);
    }

    #[tokio::test]
    async fn test_rejection_without_secondary_surfaces_upstream_error() {
        let primary = Arc::new(MockProvider::rejecting("groq", 429, "rate limited"));
        let failure = controller(vec![primary])
            .dispatch(&request(), CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(failure.error.upstream_status(), Some(429));
        assert!(failure.error.to_string().contains("rate limited"));
        assert_eq!(
            failure.trace,
            vec![ResolvingCredential, DispatchingPrimary, TerminalFailure]
        );
    }

    #[tokio::test]
    async fn test_both_fail_surfaces_primary_error() {
        let primary = Arc::new(MockProvider::rejecting("groq", 401, "invalid api key"));
        let secondary = Arc::new(MockProvider::unreachable("local"));
        let counters = secondary.counters();

        let failure = controller(vec![primary, secondary])
            .dispatch(&request(), CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(failure.provider, "groq");
        assert_eq!(failure.error.upstream_status(), Some(401));
        assert_eq!(counters.dispatches(), 1);
        assert_eq!(failure.trace.last(), Some(&TerminalFailure));
    }

    #[tokio::test]
    async fn test_empty_messages_never_dispatch() {
        let primary = Arc::new(MockProvider::labeled("groq", 1));
        let counters = primary.counters();

        let failure = controller(vec![primary])
            .dispatch(&ChatRequest::default(), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(failure.error, ProviderError::InvalidRequest(_)));
        assert_eq!(counters.dispatches(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_request_is_not_retried() {
        let primary = Arc::new(MockProvider::labeled("groq", 1));
        let counters = primary.counters();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let failure = controller(vec![primary])
            .dispatch(&request(), cancel)
            .await
            .unwrap_err();

        assert!(matches!(failure.error, ProviderError::Cancelled));
        assert_eq!(counters.dispatches(), 0);
    }

    #[tokio::test]
    async fn test_no_providers_is_internal_failure() {
        let failure = controller(Vec::new())
            .dispatch(&request(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(failure.error, ProviderError::Internal(_)));
    }

    #[tokio::test]
    async fn test_start_relay_wraps_winner() {
        let primary = Arc::new(MockProvider::labeled("groq", 4));
        let pipe = controller(vec![primary])
            .start_relay(&request(), CancellationToken::new())
            .await
            .expect("relay should start");
        let stats = pipe.stats();

        let chunks: Vec<_> = pipe.into_stream().collect().await;
        assert_eq!(chunks.len(), 4);
        assert_eq!(stats.chunks(), 4);
    }
}

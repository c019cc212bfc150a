//! Local provider: the companion server in front of a local inference engine

use async_trait::async_trait;

use super::error::ProviderResult;
use super::http::post_streaming;
use super::traits::{Provider, UpstreamStream};
use crate::config::LocalFallbackSettings;
use crate::logging::SharedLogger;
use crate::types::{CancellationToken, ChatRequest};

/// Secondary provider
///
/// Needs no credential. The companion augments each event with timing and
/// token-count metadata, which the relay forwards untouched.
pub struct LocalProvider {
    settings: LocalFallbackSettings,
    client: reqwest::Client,
    logger: SharedLogger,
}

impl LocalProvider {
    pub fn new(settings: LocalFallbackSettings, client: reqwest::Client, logger: SharedLogger) -> Self {
        Self {
            settings,
            client,
            logger,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.settings.url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Provider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    fn display_name(&self) -> &str {
        "Local engine"
    }

    fn default_model(&self) -> &str {
        &self.settings.default_model
    }

    async fn dispatch(
        &self,
        request: &ChatRequest,
        cancel_token: CancellationToken,
    ) -> ProviderResult<UpstreamStream> {
        let payload = request.to_upstream(self.default_model());
        post_streaming(
            &self.client,
            &self.endpoint(),
            None,
            &payload,
            self.name(),
            &cancel_token,
            &self.logger,
        )
        .await
    }
}

//! Cloud provider: an OpenAI-compatible chat-completions API (Groq by default)

use std::sync::Arc;

use async_trait::async_trait;

use super::error::ProviderResult;
use super::http::post_streaming;
use super::traits::{Provider, UpstreamStream};
use crate::config::CloudSettings;
use crate::logging::SharedLogger;
use crate::resolver::CredentialResolver;
use crate::types::{CancellationToken, ChatRequest};

/// Primary provider
///
/// Resolves its credential on every dispatch. A missing credential fails the
/// dispatch before any connection to the provider is opened.
pub struct CloudProvider {
    settings: CloudSettings,
    client: reqwest::Client,
    resolver: Arc<CredentialResolver>,
    logger: SharedLogger,
}

impl CloudProvider {
    pub fn new(
        settings: CloudSettings,
        client: reqwest::Client,
        resolver: Arc<CredentialResolver>,
        logger: SharedLogger,
    ) -> Self {
        Self {
            settings,
            client,
            resolver,
            logger,
        }
    }

    /// Full chat-completions URL
    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.settings.api_base.trim_end_matches('/'))
    }
}

#[async_trait]
impl Provider for CloudProvider {
    fn name(&self) -> &str {
        &self.settings.provider
    }

    fn display_name(&self) -> &str {
        &self.settings.display_name
    }

    fn default_model(&self) -> &str {
        &self.settings.default_model
    }

    async fn dispatch(
        &self,
        request: &ChatRequest,
        cancel_token: CancellationToken,
    ) -> ProviderResult<UpstreamStream> {
        let secret = self.resolver.resolve(&self.settings.provider).await?;
        let payload = request.to_upstream(self.default_model());

        post_streaming(
            &self.client,
            &self.endpoint(),
            Some(&secret.value),
            &payload,
            self.name(),
            &cancel_token,
            &self.logger,
        )
        .await
    }
}

//! Upstream providers
//!
//! Every upstream is a `Provider`: one `dispatch` that either returns the
//! live response body or a classified error. The fallback controller is
//! written against the trait only.
//!
//! - `CloudProvider`: OpenAI-compatible cloud API, credential resolved per request
//! - `LocalProvider`: the companion local-inference server
//! - `MockProvider`: scripted behavior for tests

mod traits;
mod error;
mod http;
mod cloud;
mod local;
mod mock;

pub use traits::{Provider, UpstreamStream};
pub use error::{ProviderError, ProviderResult, CREDENTIAL_MISSING_MESSAGE};
pub use cloud::CloudProvider;
pub use local::LocalProvider;
pub use mock::{MockCounters, MockMode, MockProvider};

use std::sync::Arc;

use crate::config::ProxyConfig;
use crate::logging::SharedLogger;
use crate::resolver::CredentialResolver;

/// Build the ordered provider chain described by the configuration
///
/// The cloud provider is always first. The local provider follows when local
/// fallback is enabled.
pub fn create_providers(
    config: &ProxyConfig,
    client: reqwest::Client,
    logger: SharedLogger,
) -> Vec<Arc<dyn Provider>> {
    let resolver = Arc::new(CredentialResolver::from_config(
        config,
        client.clone(),
        Arc::clone(&logger),
    ));

    let mut providers: Vec<Arc<dyn Provider>> = vec![Arc::new(CloudProvider::new(
        config.cloud.clone(),
        client.clone(),
        resolver,
        Arc::clone(&logger),
    ))];

    if config.local_fallback.enabled {
        providers.push(Arc::new(LocalProvider::new(
            config.local_fallback.clone(),
            client,
            logger,
        )));
    }

    providers
}

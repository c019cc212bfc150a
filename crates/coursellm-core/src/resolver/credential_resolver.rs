//! Credential resolution across an ordered list of sources
//!
//! Default order:
//! 1. Process environment (`GROQ_API_KEY`)
//! 2. Remote settings document, when one is configured

use std::sync::Arc;

use crate::config::ProxyConfig;
use crate::logging::SharedLogger;
use crate::{log_debug, log_warn};
use crate::providers::{ProviderError, ProviderResult};
use crate::secrets::{ChainSecretStore, DocumentSecretStore, EnvSecretStore, SecretStore};

/// A secret together with where it came from
///
/// Owned by a single request; `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedSecret {
    pub value: String,
    /// Name of the store that answered
    pub source: String,
}

impl std::fmt::Debug for ResolvedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecret")
            .field("value", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Resolves the cloud credential, first hit wins
///
/// Nothing is cached: every call walks the chain again, so a key rotated in
/// the environment or the settings document is picked up on the next request.
pub struct CredentialResolver {
    chain: ChainSecretStore,
    logger: SharedLogger,
}

impl CredentialResolver {
    /// Build a resolver over an explicit list of stores
    pub fn new(stores: Vec<Arc<dyn SecretStore>>, logger: SharedLogger) -> Self {
        Self {
            chain: ChainSecretStore::new(stores),
            logger,
        }
    }

    /// Environment first, then the settings document if configured
    pub fn from_config(config: &ProxyConfig, client: reqwest::Client, logger: SharedLogger) -> Self {
        let mut stores: Vec<Arc<dyn SecretStore>> = vec![Arc::new(EnvSecretStore::new())];

        if let Some(document) = &config.document {
            let mut store = DocumentSecretStore::new(&document.url, &document.field, Arc::clone(&logger))
                .with_client(client)
                .with_timeout(document.timeout());
            if let Some(key) = &document.service_api_key {
                store = store.with_service_api_key(key);
            }
            stores.push(Arc::new(store));
        }

        Self::new(stores, logger)
    }

    /// Names of the sources in priority order
    pub fn sources(&self) -> Vec<&str> {
        self.chain.stores().iter().map(|s| s.name()).collect()
    }

    /// Resolve the secret for `key` or fail with `CredentialMissing`
    pub async fn resolve(&self, key: &str) -> ProviderResult<ResolvedSecret> {
        match self.chain.find(key).await {
            Some((value, source)) => {
                log_debug!(
                    self.logger,
                    "CredentialResolver: '{}' resolved from {}",
                    key, source
                );
                Ok(ResolvedSecret {
                    value,
                    source: source.to_string(),
                })
            }
            None => {
                log_warn!(
                    self.logger,
                    "CredentialResolver: no credential for '{}' in [{}]",
                    key,
                    self.sources().join(", ")
                );
                Err(ProviderError::credential_missing(key))
            }
        }
    }
}

impl std::fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialResolver")
            .field("chain", &self.chain)
            .finish()
    }
}

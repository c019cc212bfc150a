//! Core traits and types for credential lookup

use async_trait::async_trait;
use thiserror::Error;

/// Information about a secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretInfo {
    /// Whether the secret exists
    pub available: bool,
    /// Which store provided the secret (useful for chain stores)
    pub source: String,
}

impl SecretInfo {
    pub fn new(available: bool, source: impl Into<String>) -> Self {
        Self {
            available,
            source: source.into(),
        }
    }

    pub fn not_found() -> Self {
        Self {
            available: false,
            source: "none".to_string(),
        }
    }
}

/// Errors a store can hit while looking a secret up
///
/// These never escape a `SecretStore::get` call: stores log them and report a
/// miss, so the resolver can move on to the next source.
#[derive(Error, Debug)]
pub enum SecretStoreError {
    #[error("Store not available: {0}")]
    NotAvailable(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {0}")]
    Status(u16),

    #[error("Lookup timed out")]
    Timeout,

    #[error("Malformed document: {0}")]
    Malformed(String),
}

pub type SecretStoreResult<T> = Result<T, SecretStoreError>;

/// A single credential source
///
/// Each store exposes one capability: resolve a key to a secret or report a
/// miss. Stores are read-only; nothing in the proxy writes credentials.
///
/// Implementations:
/// - `EnvSecretStore`: process environment
/// - `MemorySecretStore`: in-process map
/// - `DocumentSecretStore`: remote settings document over REST
/// - `ChainSecretStore`: ordered fallback over other stores
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Human-readable name of this store
    fn name(&self) -> &str;

    /// Check if this store is available
    ///
    /// A document store without a configured URL is unavailable, for example.
    fn is_available(&self) -> bool {
        true
    }

    /// Retrieve a secret by key, `None` on a miss
    async fn get(&self, key: &str) -> Option<String>;

    /// Check if a secret exists
    async fn has(&self, key: &str) -> bool {
        self.get(key).await.is_some()
    }

    /// Get information about a secret
    async fn get_info(&self, key: &str) -> SecretInfo {
        if self.has(key).await {
            SecretInfo::new(true, self.name())
        } else {
            SecretInfo::not_found()
        }
    }
}

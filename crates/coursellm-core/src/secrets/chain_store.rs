//! Chained secret store with ordered fallback

use std::sync::Arc;

use async_trait::async_trait;

use super::traits::{SecretInfo, SecretStore};

/// Tries each store in order and returns the first hit
///
/// Unavailable stores are skipped without being queried, so an unconfigured
/// document store never costs a network round trip.
///
/// # Example
///
/// ```
/// use coursellm_core::secrets::{ChainSecretStore, EnvSecretStore, MemorySecretStore};
/// use std::sync::Arc;
///
/// let chain = ChainSecretStore::new(vec![
///     Arc::new(EnvSecretStore::new()),
///     Arc::new(MemorySecretStore::new()),
/// ]);
/// assert_eq!(chain.stores().len(), 2);
/// ```
pub struct ChainSecretStore {
    stores: Vec<Arc<dyn SecretStore>>,
}

impl ChainSecretStore {
    /// Create a new chain; an empty chain always misses
    pub fn new(stores: Vec<Arc<dyn SecretStore>>) -> Self {
        Self { stores }
    }

    /// Append a store at the lowest priority
    pub fn push(&mut self, store: Arc<dyn SecretStore>) {
        self.stores.push(store);
    }

    /// Get the stores in this chain
    pub fn stores(&self) -> &[Arc<dyn SecretStore>] {
        &self.stores
    }

    /// Resolve a key and report which store answered
    pub async fn find(&self, key: &str) -> Option<(String, &str)> {
        for store in &self.stores {
            if !store.is_available() {
                continue;
            }
            if let Some(value) = store.get(key).await {
                return Some((value, store.name()));
            }
        }
        None
    }
}

#[async_trait]
impl SecretStore for ChainSecretStore {
    fn name(&self) -> &str {
        "chain"
    }

    fn is_available(&self) -> bool {
        self.stores.iter().any(|s| s.is_available())
    }

    async fn get(&self, key: &str) -> Option<String> {
        self.find(key).await.map(|(value, _)| value)
    }

    async fn get_info(&self, key: &str) -> SecretInfo {
        match self.find(key).await {
            Some((_, source)) => SecretInfo::new(true, source),
            None => SecretInfo::not_found(),
        }
    }
}

impl std::fmt::Debug for ChainSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.stores.iter().map(|s| s.name()).collect();
        f.debug_struct("ChainSecretStore")
            .field("stores", &names)
            .finish()
    }
}

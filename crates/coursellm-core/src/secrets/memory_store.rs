//! In-memory secret store

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::traits::SecretStore;

/// In-memory secret store for tests and programmatic configuration
///
/// # Example
///
/// ```
/// use coursellm_core::secrets::MemorySecretStore;
///
/// let store = MemorySecretStore::new().with_secret("groq", "gsk-test");
/// assert_eq!(store.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: RwLock<HashMap<String, String>>,
}

impl MemorySecretStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory store with initial values
    pub fn with_secrets(initial: HashMap<String, String>) -> Self {
        Self {
            secrets: RwLock::new(initial),
        }
    }

    /// Builder-style insert
    pub fn with_secret(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        if let Ok(mut secrets) = self.secrets.write() {
            secrets.insert(key.into(), value.into());
        }
    }

    pub fn remove(&self, key: &str) {
        if let Ok(mut secrets) = self.secrets.write() {
            secrets.remove(key);
        }
    }

    pub fn len(&self) -> usize {
        self.secrets.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Option<String> {
        self.secrets.read().ok()?.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemorySecretStore::new();
        assert!(store.is_empty());

        store.insert("groq", "gsk-1");
        assert_eq!(store.get("groq").await, Some("gsk-1".to_string()));
        assert!(store.has("groq").await);

        store.remove("groq");
        assert_eq!(store.get("groq").await, None);
    }

    #[tokio::test]
    async fn test_with_secrets() {
        let mut initial = HashMap::new();
        initial.insert("a".to_string(), "1".to_string());
        let store = MemorySecretStore::with_secrets(initial);
        assert_eq!(store.get("a").await, Some("1".to_string()));
        assert_eq!(store.get_info("a").await.source, "memory");
    }
}

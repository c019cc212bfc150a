//! Environment variable secret store

use std::collections::HashMap;
use std::env;

use async_trait::async_trait;
use once_cell::sync::Lazy;

use super::traits::SecretStore;

/// Mapping from provider names to environment variable names
static ENV_VAR_MAP: Lazy<HashMap<&'static str, Vec<&'static str>>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("groq", vec!["GROQ_API_KEY"]);
    m.insert("openai", vec!["OPENAI_API_KEY"]);
    m.insert("local", vec![]); // The local engine doesn't need an API key
    m
});

/// Secret store that reads from the process environment
///
/// This is the first and most trusted source: a key set on the process wins
/// over anything stored remotely.
///
/// # Provider Mapping
///
/// - `groq` → `GROQ_API_KEY`
/// - `openai` → `OPENAI_API_KEY`
///
/// Keys are also tried verbatim and with an `_API_KEY` suffix, so
/// `get("GROQ_API_KEY")` and `get("groq")` are equivalent. Empty values count
/// as unset.
#[derive(Debug, Default)]
pub struct EnvSecretStore {
    _private: (),
}

impl EnvSecretStore {
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Get the environment variable names for a provider
    pub fn get_env_vars_for_provider(provider: &str) -> Option<&'static [&'static str]> {
        ENV_VAR_MAP.get(provider.to_lowercase().as_str()).map(|v| v.as_slice())
    }

    fn read(var: &str) -> Option<String> {
        env::var(var).ok().filter(|value| !value.trim().is_empty())
    }

    fn lookup(&self, key: &str) -> Option<String> {
        if let Some(value) = Self::read(key) {
            return Some(value);
        }

        if let Some(env_vars) = Self::get_env_vars_for_provider(key) {
            for env_var in env_vars {
                if let Some(value) = Self::read(env_var) {
                    return Some(value);
                }
            }
        }

        Self::read(&format!("{}_API_KEY", key.to_uppercase()))
    }
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    fn name(&self) -> &str {
        "env"
    }

    async fn get(&self, key: &str) -> Option<String> {
        self.lookup(key)
    }
}

//! Proxy configuration
//!
//! Layered lowest to highest: built-in defaults, a YAML file
//! (`~/.config/coursellm/proxy.yaml` unless overridden), then environment
//! variables. Secrets themselves are never part of this struct; the cloud key
//! is looked up per request by the credential resolver.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::traits::{ConfigError, ConfigResult};

/// Model used when the caller does not name one
pub const DEFAULT_CLOUD_MODEL: &str = "llama3-8b-8192";

/// Groq's OpenAI-compatible base URL
pub const DEFAULT_CLOUD_API_BASE: &str = "https://api.groq.com/openai/v1";

/// Where the companion local server listens by default
pub const DEFAULT_LOCAL_URL: &str = "http://127.0.0.1:3001";

/// Top-level proxy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Socket address the HTTP server binds to
    pub listen: String,
    pub cloud: CloudSettings,
    /// Remote settings document consulted when the env var is unset
    pub document: Option<DocumentSettings>,
    pub local_fallback: LocalFallbackSettings,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8787".to_string(),
            cloud: CloudSettings::default(),
            document: None,
            local_fallback: LocalFallbackSettings::default(),
        }
    }
}

/// Cloud (primary) provider settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudSettings {
    /// Provider id, also the key handed to the credential resolver
    pub provider: String,
    /// Name used in caller-visible error prefixes
    pub display_name: String,
    pub api_base: String,
    pub default_model: String,
    pub connect_timeout_ms: u64,
}

impl Default for CloudSettings {
    fn default() -> Self {
        Self {
            provider: "groq".to_string(),
            display_name: "Groq".to_string(),
            api_base: DEFAULT_CLOUD_API_BASE.to_string(),
            default_model: DEFAULT_CLOUD_MODEL.to_string(),
            connect_timeout_ms: 10_000,
        }
    }
}

impl CloudSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Settings document holding the cloud key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentSettings {
    /// Full REST URL of the document
    pub url: String,
    /// Field (dotted path for nested maps) holding the key
    pub field: String,
    /// Optional key for service-authenticated reads
    pub service_api_key: Option<String>,
    pub timeout_ms: u64,
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            field: "groqApiKey".to_string(),
            service_api_key: None,
            timeout_ms: 5_000,
        }
    }
}

impl DocumentSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Secondary provider: the companion local-inference server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalFallbackSettings {
    pub enabled: bool,
    pub url: String,
    /// Model sent to the local engine when the caller does not pick one
    pub default_model: String,
}

impl Default for LocalFallbackSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            url: DEFAULT_LOCAL_URL.to_string(),
            default_model: "llama3".to_string(),
        }
    }
}

impl ProxyConfig {
    /// Default config file path (`<config dir>/coursellm/proxy.yaml`)
    pub fn default_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config")
        });
        config_dir.join("coursellm").join("proxy.yaml")
    }

    /// Load from a YAML file; a missing file yields the defaults
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Load the file, apply process environment overrides, validate
    pub fn resolve(path: Option<&Path>) -> ConfigResult<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);
        let mut config = Self::load(&path)?;
        config.apply_env_from(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup
    ///
    /// | variable | field |
    /// |---|---|
    /// | `COURSELLM_LISTEN` | `listen` |
    /// | `GROQ_API_BASE` | `cloud.api_base` |
    /// | `COURSELLM_DEFAULT_MODEL` | `cloud.default_model` |
    /// | `SETTINGS_DOC_URL` | `document.url` |
    /// | `SETTINGS_DOC_FIELD` | `document.field` |
    /// | `SETTINGS_DOC_API_KEY` | `document.service_api_key` |
    /// | `LOCAL_AI_URL` | `local_fallback.url` (and enables it) |
    /// | `COURSELLM_LOCAL_FALLBACK` | `local_fallback.enabled` |
    pub fn apply_env_from<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(listen) = get("COURSELLM_LISTEN") {
            self.listen = listen;
        }
        if let Some(base) = get("GROQ_API_BASE") {
            self.cloud.api_base = base;
        }
        if let Some(model) = get("COURSELLM_DEFAULT_MODEL") {
            self.cloud.default_model = model;
        }

        if let Some(url) = get("SETTINGS_DOC_URL") {
            self.document.get_or_insert_with(DocumentSettings::default).url = url;
        }
        if let Some(document) = self.document.as_mut() {
            if let Some(field) = get("SETTINGS_DOC_FIELD") {
                document.field = field;
            }
            if let Some(key) = get("SETTINGS_DOC_API_KEY") {
                document.service_api_key = Some(key);
            }
        }

        if let Some(url) = get("LOCAL_AI_URL") {
            self.local_fallback.url = url;
            self.local_fallback.enabled = true;
        }
        if let Some(flag) = get("COURSELLM_LOCAL_FALLBACK") {
            self.local_fallback.enabled = parse_bool("COURSELLM_LOCAL_FALLBACK", &flag)?;
        }
        Ok(())
    }

    /// Check that every configured URL is usable
    pub fn validate(&self) -> ConfigResult<()> {
        check_url("cloud.api_base", &self.cloud.api_base)?;
        if self.cloud.default_model.trim().is_empty() {
            return Err(ConfigError::invalid("cloud.default_model", "must not be empty"));
        }
        if let Some(document) = &self.document {
            check_url("document.url", &document.url)?;
            if document.field.trim().is_empty() {
                return Err(ConfigError::invalid("document.field", "must not be empty"));
            }
        }
        if self.local_fallback.enabled {
            check_url("local_fallback.url", &self.local_fallback.url)?;
        }
        Ok(())
    }
}

fn check_url(key: &str, value: &str) -> ConfigResult<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::invalid(key, format!("expected an http(s) URL, got '{}'", value)))
    }
}

fn parse_bool(key: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::invalid(key, format!("not a boolean: '{}'", other))),
    }
}

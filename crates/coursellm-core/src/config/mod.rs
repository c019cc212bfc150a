//! Proxy configuration: defaults, YAML file, environment overrides

mod traits;
mod proxy;

pub use traits::{ConfigError, ConfigResult};
pub use proxy::{
    CloudSettings, DocumentSettings, LocalFallbackSettings, ProxyConfig, DEFAULT_CLOUD_API_BASE,
    DEFAULT_CLOUD_MODEL, DEFAULT_LOCAL_URL,
};

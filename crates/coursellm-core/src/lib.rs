//! CourseLLM Core
//!
//! Server-side plumbing behind the course assistant: the browser never holds
//! a provider key, so every completion goes through here.
//!
//! - `resolver` finds the upstream key (environment, then a settings document)
//! - `providers` forward a chat request upstream and hand back the raw stream
//! - `relay` pipes that stream to the caller and stops upstream on disconnect
//! - `fallback` tries the cloud provider, then the local engine
//!
//! ```rust,ignore
//! use coursellm_core::{FallbackController, ProxyConfig, CancellationToken};
//!
//! let config = ProxyConfig::resolve(None)?;
//! let controller = FallbackController::from_config(&config, client, logger);
//! let pipe = controller.start_relay(&request, CancellationToken::new()).await?;
//! let body = pipe.into_stream();
//! ```

pub mod types;
pub mod logging;
pub mod secrets;
pub mod config;
pub mod resolver;
pub mod providers;
pub mod relay;
pub mod fallback;

// Re-export commonly used types
pub use types::{
    ChatMessage, ChatRequest, MessageRole, UpstreamPayload,
    StreamChunk, ChunkMetadata, sse_event, SSE_DONE,
    CancellationToken, DropGuard,
};

pub use logging::{Logger, SharedLogger, NoOpLogger, TracingLogger};

pub use secrets::{
    SecretStore, SecretInfo, SecretStoreError, SecretStoreResult,
    EnvSecretStore, MemorySecretStore, DocumentSecretStore, ChainSecretStore,
};

pub use config::{ConfigError, ConfigResult, ProxyConfig};

pub use resolver::{CredentialResolver, ResolvedSecret};

pub use providers::{
    Provider, ProviderError, ProviderResult, UpstreamStream,
    CloudProvider, LocalProvider, create_providers,
};

pub use relay::{RelayOutcome, RelayPipe, RelayStats, RelayStream};

pub use fallback::{FallbackController, FallbackFailure, FallbackOutcome, FallbackState};

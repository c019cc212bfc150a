//! Credential sources
//!
//! Each source implements `SecretStore`, a single "resolve this key or miss"
//! capability. `ChainSecretStore` composes them into the ordered list the
//! credential resolver walks.

mod traits;
mod env_store;
mod memory_store;
mod document_store;
mod chain_store;

pub use traits::{SecretInfo, SecretStore, SecretStoreError, SecretStoreResult};
pub use env_store::EnvSecretStore;
pub use memory_store::MemorySecretStore;
pub use document_store::{extract_field, DocumentSecretStore, DEFAULT_DOCUMENT_TIMEOUT};
pub use chain_store::ChainSecretStore;

//! Credential resolution
//!
//! Single entry point that walks the configured credential sources in
//! priority order.

mod credential_resolver;

pub use credential_resolver::{CredentialResolver, ResolvedSecret};

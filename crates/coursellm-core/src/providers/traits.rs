//! Provider trait definition

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use super::error::ProviderResult;
use crate::types::{CancellationToken, ChatRequest};

/// Live upstream body: raw byte chunks in arrival order
///
/// An `Err` item means the upstream connection failed after streaming began.
pub type UpstreamStream = Pin<Box<dyn Stream<Item = ProviderResult<Bytes>> + Send>>;

/// One upstream capability in the fallback chain
///
/// `dispatch` issues exactly one outbound request. It returns as soon as
/// upstream has accepted the request and started streaming; the body is
/// handed back unread.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable identifier (e.g., "groq", "local")
    fn name(&self) -> &str;

    /// Name used when prefixing upstream errors for callers
    fn display_name(&self) -> &str;

    /// Model sent upstream when the request names none
    fn default_model(&self) -> &str;

    /// Issue the request and return the live body
    async fn dispatch(
        &self,
        request: &ChatRequest,
        cancel_token: CancellationToken,
    ) -> ProviderResult<UpstreamStream>;
}

//! Core types shared by the proxy and the local companion

mod message;
mod stream;
mod cancellation;

pub use message::{
    ChatMessage, ChatRequest, MessageRole, UpstreamPayload, DEFAULT_MAX_TOKENS,
    DEFAULT_TEMPERATURE,
};
pub use stream::{sse_event, ChunkMetadata, StreamChunk, SSE_DONE};
pub use cancellation::{CancellationToken, DropGuard};

//! Streaming response types

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// One upstream chunk as it travels through the relay
///
/// The payload is the exact byte slice read from upstream. `seq` is the
/// zero-based position of the chunk within its stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamChunk {
    pub seq: u64,
    pub data: Bytes,
}

impl StreamChunk {
    pub fn new(seq: u64, data: impl Into<Bytes>) -> Self {
        Self {
            seq,
            data: data.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<StreamChunk> for Bytes {
    fn from(chunk: StreamChunk) -> Self {
        chunk.data
    }
}

/// Per-chunk timing and token counts emitted by the local engine companion
///
/// Travels inside the companion's SSE events under a `meta` key. The proxy
/// relays it byte-for-byte and never parses it on the hot path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Tokens generated so far in this response
    pub token_count: u64,
    /// Milliseconds since the generation started
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_per_second: Option<f64>,
}

impl ChunkMetadata {
    pub fn new(token_count: u64, elapsed_ms: u64) -> Self {
        let tokens_per_second = if elapsed_ms > 0 {
            Some(token_count as f64 * 1000.0 / elapsed_ms as f64)
        } else {
            None
        };
        Self {
            token_count,
            elapsed_ms,
            tokens_per_second,
        }
    }
}

/// Server-sent event line carrying the terminal marker
pub const SSE_DONE: &str = "data: [DONE]\n\n";

/// Frame a JSON payload as one server-sent event
pub fn sse_event(payload: &serde_json::Value) -> Bytes {
    Bytes::from(format!("data: {}\n\n", payload))
}

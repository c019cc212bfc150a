//! Mock provider for testing
//!
//! Deterministic, scripted upstream behavior without network access. Counts
//! dispatches and upstream chunk reads so tests can assert on call counts and
//! on reads stopping after cancellation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, StreamExt};

use super::error::{ProviderError, ProviderResult};
use super::traits::{Provider, UpstreamStream};
use crate::types::{CancellationToken, ChatRequest};

/// Mock response mode
#[derive(Debug, Clone)]
pub enum MockMode {
    /// Stream these chunks, then end
    Chunks(Vec<Bytes>),
    /// Refuse with an upstream status and body
    Reject { status: u16, body: String },
    /// Fail as if the host could not be reached
    Unreachable(String),
    /// Fail as if no credential were configured
    CredentialMissing,
    /// Stream some chunks, then drop the connection
    Interrupt { chunks: Vec<Bytes>, message: String },
}

impl Default for MockMode {
    fn default() -> Self {
        MockMode::Chunks(Vec::new())
    }
}

/// Observable counters shared with the test
#[derive(Debug, Clone, Default)]
pub struct MockCounters {
    dispatches: Arc<AtomicUsize>,
    reads: Arc<AtomicUsize>,
}

impl MockCounters {
    /// Number of `dispatch` calls
    pub fn dispatches(&self) -> usize {
        self.dispatches.load(Ordering::SeqCst)
    }

    /// Number of upstream chunks pulled by the consumer
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

/// Mock LLM provider for testing
pub struct MockProvider {
    name: String,
    mode: MockMode,
    chunk_delay: Duration,
    counters: MockCounters,
    last_request: std::sync::Mutex<Option<ChatRequest>>,
}

impl MockProvider {
    pub fn new(name: impl Into<String>, mode: MockMode) -> Self {
        Self {
            name: name.into(),
            mode,
            chunk_delay: Duration::ZERO,
            counters: MockCounters::default(),
            last_request: std::sync::Mutex::new(None),
        }
    }

    /// Stream the given chunks
    pub fn chunked<I, B>(name: impl Into<String>, chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self::new(name, MockMode::Chunks(chunks.into_iter().map(Into::into).collect()))
    }

    /// Stream `n` labeled SSE events: `data: chunk-0\n\n`, `data: chunk-1\n\n`, ...
    pub fn labeled(name: impl Into<String>, n: usize) -> Self {
        Self::chunked(name, (0..n).map(|i| format!("data: chunk-{}\n\n", i)))
    }

    pub fn rejecting(name: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::new(
            name,
            MockMode::Reject {
                status,
                body: body.into(),
            },
        )
    }

    pub fn unreachable(name: impl Into<String>) -> Self {
        Self::new(name, MockMode::Unreachable("connection refused".to_string()))
    }

    pub fn without_credential(name: impl Into<String>) -> Self {
        Self::new(name, MockMode::CredentialMissing)
    }

    pub fn interrupting<I, B>(name: impl Into<String>, chunks: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self::new(
            name,
            MockMode::Interrupt {
                chunks: chunks.into_iter().map(Into::into).collect(),
                message: message.into(),
            },
        )
    }

    /// Delay before each chunk after the first
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Handle onto the counters that stays valid after the provider is boxed
    pub fn counters(&self) -> MockCounters {
        self.counters.clone()
    }

    /// The request seen by the most recent dispatch
    pub fn last_request(&self) -> Option<ChatRequest> {
        self.last_request.lock().ok().and_then(|r| r.clone())
    }

    fn stream_of(&self, chunks: Vec<Bytes>, tail: Option<String>) -> UpstreamStream {
        let reads = Arc::clone(&self.counters.reads);
        let delay = self.chunk_delay;
        let provider = self.name.clone();

        let items = chunks
            .into_iter()
            .map(Ok)
            .chain(tail.map(Err))
            .enumerate();

        let stream = stream::iter(items).then(move |(i, item)| {
            let reads = Arc::clone(&reads);
            let provider = provider.clone();
            async move {
                if i > 0 && !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                reads.fetch_add(1, Ordering::SeqCst);
                item.map_err(|message| ProviderError::interrupted(provider, message))
            }
        });

        Box::pin(stream)
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn default_model(&self) -> &str {
        "mock-model"
    }

    async fn dispatch(
        &self,
        request: &ChatRequest,
        cancel_token: CancellationToken,
    ) -> ProviderResult<UpstreamStream> {
        self.counters.dispatches.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request.clone());
        }

        if cancel_token.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        match &self.mode {
            MockMode::Chunks(chunks) => Ok(self.stream_of(chunks.clone(), None)),
            MockMode::Reject { status, body } => {
                Err(ProviderError::rejected(&self.name, *status, body.clone()))
            }
            MockMode::Unreachable(message) => {
                Err(ProviderError::unreachable(&self.name, message.clone()))
            }
            MockMode::CredentialMissing => Err(ProviderError::credential_missing(&self.name)),
            MockMode::Interrupt { chunks, message } => {
                Ok(self.stream_of(chunks.clone(), Some(message.clone())))
            }
        }
    }
}

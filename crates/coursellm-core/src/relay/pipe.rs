//! Pass-through pipe between an upstream body and the caller
//!
//! The pipe couples one upstream stream to one outbound stream:
//! - chunks are forwarded unchanged and strictly in arrival order
//! - the next upstream chunk is pulled only when the outbound side asks for
//!   one, so a slow caller blocks the pipe instead of growing a buffer
//! - upstream EOF or failure ends the outbound stream
//! - dropping the outbound stream (caller gone) or cancelling the token stops
//!   upstream reads and drops the upstream connection

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};

use futures::Stream;

use crate::logging::SharedLogger;
use crate::{log_info, log_warn};
use crate::providers::UpstreamStream;
use crate::types::{CancellationToken, DropGuard, StreamChunk};

/// How a relay ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Upstream reached EOF
    Completed,
    /// Upstream failed after streaming began; the caller saw a truncated stream
    Interrupted(String),
    /// The caller went away or the token was cancelled
    Cancelled,
}

/// Counters for one relay, readable after the stream is gone
#[derive(Debug, Clone, Default)]
pub struct RelayStats {
    inner: Arc<RelayStatsInner>,
}

#[derive(Debug, Default)]
struct RelayStatsInner {
    chunks: AtomicU64,
    bytes: AtomicU64,
    outcome: OnceLock<RelayOutcome>,
}

impl RelayStats {
    pub fn chunks(&self) -> u64 {
        self.inner.chunks.load(Ordering::SeqCst)
    }

    pub fn bytes(&self) -> u64 {
        self.inner.bytes.load(Ordering::SeqCst)
    }

    /// `None` while the relay is still running
    pub fn outcome(&self) -> Option<RelayOutcome> {
        self.inner.outcome.get().cloned()
    }

    fn record(&self, len: usize) {
        self.inner.chunks.fetch_add(1, Ordering::SeqCst);
        self.inner.bytes.fetch_add(len as u64, Ordering::SeqCst);
    }

    /// First outcome wins
    fn finish(&self, outcome: RelayOutcome) -> bool {
        self.inner.outcome.set(outcome).is_ok()
    }
}

/// A single upstream-to-caller coupling with cancellation both ways
pub struct RelayPipe {
    upstream: UpstreamStream,
    cancel_token: CancellationToken,
    provider: String,
    stats: RelayStats,
    logger: SharedLogger,
}

impl RelayPipe {
    pub fn new(
        upstream: UpstreamStream,
        cancel_token: CancellationToken,
        provider: impl Into<String>,
        logger: SharedLogger,
    ) -> Self {
        Self {
            upstream,
            cancel_token,
            provider: provider.into(),
            stats: RelayStats::default(),
            logger,
        }
    }

    /// Token that aborts the relay when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn stats(&self) -> RelayStats {
        self.stats.clone()
    }

    /// Turn the pipe into the outbound stream
    pub fn into_stream(self) -> RelayStream {
        let token = self.cancel_token.clone();
        RelayStream {
            upstream: Some(self.upstream),
            cancelled: Box::pin(async move { token.cancelled().await }),
            guard: Some(self.cancel_token.drop_guard()),
            seq: 0,
            provider: self.provider,
            stats: self.stats,
            logger: self.logger,
        }
    }
}

/// Outbound side of a `RelayPipe`
///
/// Yields `StreamChunk`s, which convert into `Bytes` for an HTTP body. The
/// stream never yields an error: an upstream failure mid-stream can only end
/// the stream, because the response status has already been sent.
pub struct RelayStream {
    upstream: Option<UpstreamStream>,
    cancelled: Pin<Box<dyn Future<Output = ()> + Send>>,
    guard: Option<DropGuard>,
    seq: u64,
    provider: String,
    stats: RelayStats,
    logger: SharedLogger,
}

impl RelayStream {
    fn close(&mut self, outcome: RelayOutcome) {
        // Dropping the upstream stream drops the upstream connection
        self.upstream = None;

        match &outcome {
            RelayOutcome::Completed => {
                // Nothing to abort; keep the token uncancelled
                if let Some(guard) = self.guard.take() {
                    guard.disarm();
                }
                log_info!(
                    self.logger,
                    "[{}] relay completed: {} chunks, {} bytes",
                    self.provider,
                    self.stats.chunks(),
                    self.stats.bytes()
                );
            }
            RelayOutcome::Interrupted(message) => {
                self.guard.take();
                log_warn!(
                    self.logger,
                    "[{}] upstream interrupted after {} chunks: {}",
                    self.provider,
                    self.stats.chunks(),
                    message
                );
            }
            RelayOutcome::Cancelled => {
                self.guard.take();
                log_info!(
                    self.logger,
                    "[{}] relay cancelled after {} chunks",
                    self.provider,
                    self.stats.chunks()
                );
            }
        }

        self.stats.finish(outcome);
    }
}

impl Stream for RelayStream {
    type Item = Result<StreamChunk, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        let Some(upstream) = this.upstream.as_mut() else {
            return Poll::Ready(None);
        };

        if this.cancelled.as_mut().poll(cx).is_ready() {
            this.close(RelayOutcome::Cancelled);
            return Poll::Ready(None);
        }

        match upstream.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(data))) => {
                this.stats.record(data.len());
                let chunk = StreamChunk::new(this.seq, data);
                this.seq += 1;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.close(RelayOutcome::Interrupted(e.to_string()));
                Poll::Ready(None)
            }
            Poll::Ready(None) => {
                this.close(RelayOutcome::Completed);
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for RelayStream {
    fn drop(&mut self) {
        if self.upstream.is_some() {
            // Caller disconnected mid-stream
            self.close(RelayOutcome::Cancelled);
        }
    }
}

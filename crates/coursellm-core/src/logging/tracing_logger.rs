//! Logger that forwards to `tracing`

use super::traits::Logger;

/// Routes core log lines into whatever `tracing` subscriber the host installed
///
/// Events are emitted under the `coursellm` target so `RUST_LOG=coursellm=debug`
/// turns on core diagnostics without touching HTTP-layer noise.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl TracingLogger {
    pub fn new() -> Self {
        Self
    }
}

impl Logger for TracingLogger {
    fn debug(&self, message: &str) {
        tracing::debug!(target: "coursellm", "{}", message);
    }

    fn info(&self, message: &str) {
        tracing::info!(target: "coursellm", "{}", message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!(target: "coursellm", "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "coursellm", "{}", message);
    }
}

//! Stream relay: pass-through forwarding with cancellation

mod pipe;

pub use pipe::{RelayOutcome, RelayPipe, RelayStats, RelayStream};

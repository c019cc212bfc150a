//! Fallback controller: ordered provider chain, one attempt each

mod controller;

pub use controller::{FallbackController, FallbackFailure, FallbackOutcome, FallbackState};

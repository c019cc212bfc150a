//! Admission control in front of the engine
//!
//! A fair `Semaphore` bounds in-flight generations. Waiters are served in
//! arrival order. A permit is released when the response stream that owns
//! it is dropped, not when the handler returns.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

use crate::config::AdmissionMode;
use crate::error::LocalError;

/// One generation slot
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

#[derive(Debug, Clone)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    mode: AdmissionMode,
    queue_timeout: Option<Duration>,
}

impl AdmissionGate {
    pub fn new(max_concurrent: usize, mode: AdmissionMode, queue_timeout: Option<Duration>) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            mode,
            queue_timeout,
        }
    }

    pub fn mode(&self) -> AdmissionMode {
        self.mode
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn in_flight(&self) -> usize {
        self.max_concurrent.saturating_sub(self.available())
    }

    /// Take a slot, waiting or refusing according to the mode
    pub async fn acquire(&self) -> Result<AdmissionPermit, LocalError> {
        let permit = match self.mode {
            AdmissionMode::Reject => match Arc::clone(&self.semaphore).try_acquire_owned() {
                Ok(permit) => permit,
                Err(TryAcquireError::NoPermits) | Err(TryAcquireError::Closed) => {
                    return Err(LocalError::Busy)
                }
            },
            AdmissionMode::Queue => {
                let waiting = Arc::clone(&self.semaphore).acquire_owned();
                let acquired = match self.queue_timeout {
                    Some(limit) => tokio::time::timeout(limit, waiting)
                        .await
                        .map_err(|_| LocalError::QueueTimeout)?,
                    None => waiting.await,
                };
                acquired.map_err(|_| LocalError::Busy)?
            }
        };
        Ok(AdmissionPermit { _permit: permit })
    }
}

//! Cooperative cancellation for long-running detection.

use crate::error::{Result, YatsmError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag.
///
/// Clones share the same flag, so a token handed to a worker can be
/// cancelled from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns true once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Returns `Cancelled` when cancellation has been requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(YatsmError::Cancelled);
        }
        Ok(())
    }
}

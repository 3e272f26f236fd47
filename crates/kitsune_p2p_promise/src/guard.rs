//! Deadlock guard for blocking waits.
//!
//! Blocking the transport's io event loop inside an await stalls every
//! connection, including the one that would complete the awaited cell.
//! Every blocking call is handed an [`AwaitGuard`] that decides whether
//! the calling thread may block.

use crate::*;
use std::sync::Arc;

/// Decides whether the current thread is allowed to block.
pub trait AwaitGuard: Send + Sync {
    /// `Ok(())` if the current thread may block,
    /// `Err(PromiseError::DeadlockGuard)` otherwise.
    fn check(&self) -> PromiseResult<()>;
}

/// A guard that never refuses.
///
/// For threads known to be outside the transport: tests, worker pools.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGuard;

impl AwaitGuard for NoGuard {
    fn check(&self) -> PromiseResult<()> {
        Ok(())
    }
}

/// Refuses to block on threads whose name carries the io thread marker.
#[derive(Debug, Clone)]
pub struct IoThreadGuard {
    prefix: Arc<str>,
}

impl Default for IoThreadGuard {
    fn default() -> Self {
        Self::new(DEFAULT_IO_THREAD_NAME_PREFIX)
    }
}

impl IoThreadGuard {
    /// Guard against threads whose name starts with `prefix`.
    pub fn new(prefix: impl Into<Arc<str>>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Build the guard from tuning params.
    pub fn from_tuning(tuning_params: &PromiseTuningParams) -> Self {
        Self::new(tuning_params.io_thread_name_prefix.as_str())
    }

    /// The reserved thread name prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Is the current thread an io thread?
    pub fn is_io_thread(&self) -> bool {
        std::thread::current()
            .name()
            .map(|n| n.starts_with(&*self.prefix))
            .unwrap_or(false)
    }
}

impl AwaitGuard for IoThreadGuard {
    fn check(&self) -> PromiseResult<()> {
        if self.is_io_thread() {
            let thread = std::thread::current()
                .name()
                .unwrap_or_default()
                .to_string();
            return Err(PromiseError::DeadlockGuard { thread });
        }
        Ok(())
    }
}

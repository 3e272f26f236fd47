//! Single-use gate. Once opened, stays open.

use crate::*;
use parking_lot::{Condvar, Mutex};

/// A gate that starts closed and can be opened exactly once.
/// Waiters block until it opens.
#[derive(Debug, Default)]
pub struct Latch {
    open: Mutex<bool>,
    cond: Condvar,
}

impl Latch {
    /// Construct a new closed latch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the latch, waking every waiter.
    /// Returns `true` if this call opened it.
    pub fn open(&self) -> bool {
        let mut open = self.open.lock();
        if *open {
            return false;
        }
        *open = true;
        self.cond.notify_all();
        true
    }

    /// Has this latch been opened?
    pub fn is_open(&self) -> bool {
        *self.open.lock()
    }

    /// Block until the latch opens.
    /// The guard is checked first, even if the latch is already open.
    pub fn wait(&self, guard: &dyn AwaitGuard) -> PromiseResult<()> {
        guard.check()?;
        let mut open = self.open.lock();
        while !*open {
            self.cond.wait(&mut open);
        }
        Ok(())
    }

    /// Block until the latch opens or the timeout elapses.
    /// Returns whether the latch is open.
    pub fn wait_timeout(
        &self,
        guard: &dyn AwaitGuard,
        timeout: std::time::Duration,
    ) -> PromiseResult<bool> {
        guard.check()?;
        let deadline = std::time::Instant::now().checked_add(timeout);
        let mut open = self.open.lock();
        while !*open {
            match deadline {
                None => self.cond.wait(&mut open),
                Some(deadline) => {
                    if self.cond.wait_until(&mut open, deadline).timed_out() {
                        break;
                    }
                }
            }
        }
        Ok(*open)
    }
}

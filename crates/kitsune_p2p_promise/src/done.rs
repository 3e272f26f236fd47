//! Result future: a cell carrying a simple value.

use crate::*;

/// A promise of a plain value, e.g. "shutdown finished" or
/// "here is the negotiated connection".
pub type FutureDone<T> = CompletionCell<T, ()>;

impl<T: 'static + Send> CompletionCell<T, ()> {
    /// Complete successfully with `value`.
    pub fn done(&self, value: T) -> bool {
        self.complete_success(value)
    }

    /// Complete successfully with nothing attached.
    pub fn done_empty(&self) -> bool {
        self.complete_empty()
    }
}

//! Completion listeners and cancel handlers.

use crate::*;
use std::sync::atomic;

static LISTENER_ID: atomic::AtomicU64 = atomic::AtomicU64::new(1);
static CANCEL_ID: atomic::AtomicU64 = atomic::AtomicU64::new(1);

/// Identifies a registered listener, for [`CompletionCell::remove_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn next() -> Self {
        Self(LISTENER_ID.fetch_add(1, atomic::Ordering::Relaxed))
    }
}

/// Identifies a registered cancel handler, for [`CompletionCell::remove_cancel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CancelId(u64);

impl CancelId {
    pub(crate) fn next() -> Self {
        Self(CANCEL_ID.fetch_add(1, atomic::Ordering::Relaxed))
    }
}

/// A cancel handler, run at most once when cancellation is requested.
pub(crate) type CancelHandler = Box<dyn FnOnce() + 'static + Send>;

/// Notified once, when the future `F` completes.
///
/// Must not block, and must not await the future it is registered on.
pub trait FutureListener<F>: 'static + Send {
    /// The future completed (success, failure or cancelled).
    fn operation_complete(&mut self, future: &F) -> PromiseResult<()>;

    /// `operation_complete` returned an error or panicked.
    /// If this also fails, the error is logged and dropped.
    fn exception_caught(&mut self, future: &F, err: PromiseError) -> PromiseResult<()> {
        let _ = future;
        Err(err)
    }
}

/// Adapts a closure into a [`FutureListener`].
pub(crate) struct FnListener<C>(Option<C>);

impl<C> FnListener<C> {
    pub(crate) fn new(c: C) -> Self {
        Self(Some(c))
    }
}

impl<F, C> FutureListener<F> for FnListener<C>
where
    C: FnOnce(&F) + 'static + Send,
{
    fn operation_complete(&mut self, future: &F) -> PromiseResult<()> {
        if let Some(c) = self.0.take() {
            c(future);
        }
        Ok(())
    }
}

fn panic_to_error(payload: Box<dyn std::any::Any + Send>) -> PromiseError {
    let msg = if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    };
    format!("listener panicked: {}", msg).into()
}

/// Run a listener, redirecting its failure to its own exception hook.
/// Nothing a listener does can escape this function.
pub(crate) fn call_operation_complete<F: 'static>(listener: &mut dyn FutureListener<F>, future: &F) {
    use std::panic::{catch_unwind, AssertUnwindSafe};

    let err = match catch_unwind(AssertUnwindSafe(|| listener.operation_complete(future))) {
        Ok(Ok(())) => return,
        Ok(Err(err)) => err,
        Err(payload) => panic_to_error(payload),
    };

    let err = match catch_unwind(AssertUnwindSafe(|| listener.exception_caught(future, err))) {
        Ok(Ok(())) => return,
        Ok(Err(err)) => err,
        Err(payload) => panic_to_error(payload),
    };

    tracing::error!(?err, "unexpected error in listener exception_caught()");
}

/// Run a cancel handler. A panicking handler is logged, never propagated.
pub(crate) fn call_cancel(handler: CancelHandler) {
    use std::panic::{catch_unwind, AssertUnwindSafe};

    if let Err(payload) = catch_unwind(AssertUnwindSafe(handler)) {
        let err = panic_to_error(payload);
        tracing::error!(?err, "cancel handler panicked");
    }
}

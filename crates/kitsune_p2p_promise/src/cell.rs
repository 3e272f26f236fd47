//! The completion cell underlying every kitsune promise.
//!
//! A cell starts `Pending` and transitions exactly once into one of the
//! terminal states. The thread winning that transition is the only one
//! notifying listeners, and does so after releasing the state lock: the
//! listener list is moved out of the guarded state before any callback runs.
//!
//! Cancellation is a separate signal with its own lock. Requesting it runs
//! the cancel handlers (once), but does not complete the cell. The operation
//! observing the cancellation is expected to complete it, usually as failed.

use crate::*;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Draining listeners for longer than this gets logged.
const LISTENER_DRAIN_WARN: Duration = Duration::from_millis(500);

/// The state of a completion cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum PromiseState {
    /// Not completed yet.
    Pending,
    /// The operation succeeded.
    Success,
    /// The operation ran, but did not succeed.
    Failure,
    /// The operation was aborted before producing a result.
    Cancelled,
}

impl PromiseState {
    /// Everything but `Pending` is terminal.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PromiseState::Pending)
    }
}

/// Bookkeeping a specialised cell keeps under the cell's own state lock.
pub trait Extension: 'static + Send {
    /// While true, the ordinary completion calls are refused. Only the
    /// specialisation's own internal transition can complete the cell.
    fn defers_completion(&self) -> bool {
        false
    }
}

impl Extension for () {}

/// A terminal outcome, applied atomically by the winning completer.
pub(crate) struct Terminal<T> {
    pub(crate) state: PromiseState,
    pub(crate) value: Option<T>,
    pub(crate) reason: Option<FailReason>,
}

impl<T> Terminal<T> {
    pub(crate) fn success(value: Option<T>) -> Self {
        Self {
            state: PromiseState::Success,
            value,
            reason: None,
        }
    }

    pub(crate) fn failure(reason: FailReason) -> Self {
        Self {
            state: PromiseState::Failure,
            value: None,
            reason: Some(reason),
        }
    }

    pub(crate) fn cancelled(reason: FailReason) -> Self {
        Self {
            state: PromiseState::Cancelled,
            value: None,
            reason: Some(reason),
        }
    }
}

type BoxListener<T, X> = Box<dyn FutureListener<CompletionCell<T, X>>>;
type ListenerList<T, X> = Vec<(ListenerId, BoxListener<T, X>)>;

struct State<T, X> {
    state: PromiseState,
    value: Option<T>,
    reason: Option<FailReason>,
    listeners: ListenerList<T, X>,
    listeners_drained: bool,
    interrupt_epoch: u64,
    ext: X,
}

impl<T, X> State<T, X> {
    /// Apply the outcome, handing the listeners to the caller,
    /// who must notify them after dropping the lock.
    fn transition(&mut self, t: Terminal<T>) -> ListenerList<T, X> {
        tracing::trace!(state = %t.state, "completion cell transition");
        self.state = t.state;
        self.value = t.value;
        self.reason = t.reason;
        std::mem::take(&mut self.listeners)
    }
}

#[derive(Default)]
struct CancelState {
    requested: bool,
    handlers: Vec<(CancelId, CancelHandler)>,
}

struct Inner<T, X> {
    state: Mutex<State<T, X>>,
    cond: Condvar,
    cancel: Mutex<CancelState>,
}

/// Shared handle to a completion cell: a result that does not exist yet.
///
/// Clones refer to the same cell. `T` is the payload of a successful
/// completion, `X` the extension state of specialised cells such as
/// [`FutureResponse`] or [`FutureForkJoin`].
pub struct CompletionCell<T, X = ()> {
    inner: Arc<Inner<T, X>>,
}

impl<T, X> Clone for CompletionCell<T, X> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: 'static + Send> CompletionCell<T, ()> {
    /// Construct a new pending cell.
    pub fn new() -> Self {
        Self::with_extension(())
    }
}

impl<T: 'static + Send> Default for CompletionCell<T, ()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static + Send, X: Extension> std::fmt::Debug for CompletionCell<T, X> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (state, reason) = {
            let s = self.inner.state.lock();
            (s.state, s.reason.as_ref().map(FailReason::to_display_string))
        };
        f.debug_struct("CompletionCell")
            .field("state", &state)
            .field("reason", &reason)
            .field("cancel_requested", &self.is_cancel_requested())
            .finish()
    }
}

impl<T: 'static + Send, X: Extension> CompletionCell<T, X> {
    /// Construct a new pending cell carrying extension state.
    pub fn with_extension(ext: X) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    state: PromiseState::Pending,
                    value: None,
                    reason: None,
                    listeners: Vec::new(),
                    listeners_drained: false,
                    interrupt_epoch: 0,
                    ext,
                }),
                cond: Condvar::new(),
                cancel: Mutex::new(CancelState::default()),
            }),
        }
    }

    /// Do both handles refer to the same cell?
    pub fn ptr_eq(&self, oth: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &oth.inner)
    }

    /// Current state.
    pub fn state(&self) -> PromiseState {
        self.inner.state.lock().state
    }

    /// Has this cell reached a terminal state?
    pub fn is_completed(&self) -> bool {
        self.state().is_terminal()
    }

    /// Did the operation succeed?
    pub fn is_success(&self) -> bool {
        self.state() == PromiseState::Success
    }

    /// Did the operation fail or get cancelled?
    pub fn is_failed(&self) -> bool {
        matches!(
            self.state(),
            PromiseState::Failure | PromiseState::Cancelled
        )
    }

    /// The recorded failure reason, if any.
    pub fn fail_reason(&self) -> Option<FailReason> {
        self.inner.state.lock().reason.clone()
    }

    /// Diagnostic one-line description of this cell.
    pub fn failed_reason(&self) -> String {
        let cancel = self.is_cancel_requested();
        let s = self.inner.state.lock();
        let reason = s
            .reason
            .as_ref()
            .map(FailReason::to_display_string)
            .unwrap_or_else(|| FailReason::unknown().to_display_string());
        format!(
            "Future (compl/canc):{}/{}, {}, {}",
            s.state.is_terminal(),
            cancel,
            s.state,
            reason
        )
    }

    /// A clone of the attached payload, if any.
    pub fn object(&self) -> Option<T>
    where
        T: Clone,
    {
        self.inner.state.lock().value.clone()
    }

    /// Access the attached payload without cloning it.
    /// Do not call back into this cell from `f`.
    pub fn with_object<R, F>(&self, f: F) -> R
    where
        F: FnOnce(Option<&T>) -> R,
    {
        f(self.inner.state.lock().value.as_ref())
    }

    /// Complete successfully, attaching `value`.
    /// Returns `true` if this call performed the transition.
    pub fn complete_success(&self, value: T) -> bool {
        self.complete(Terminal::success(Some(value)))
    }

    /// Complete successfully without a payload.
    pub fn complete_empty(&self) -> bool {
        self.complete(Terminal::success(None))
    }

    /// Complete as failed.
    pub fn complete_failure(&self, reason: impl Into<FailReason>) -> bool {
        self.complete(Terminal::failure(reason.into()))
    }

    /// Complete as failed, attributing the failure to `origin`.
    pub fn complete_failure_from<T2, X2>(
        &self,
        message: impl Into<String>,
        origin: &CompletionCell<T2, X2>,
    ) -> bool
    where
        T2: 'static + Send,
        X2: Extension,
    {
        let cause = origin.fail_reason().unwrap_or_else(FailReason::unknown);
        self.complete_failure(FailReason::new(message).caused_by(cause))
    }

    /// Complete as cancelled.
    pub fn complete_cancelled(&self, reason: impl Into<FailReason>) -> bool {
        self.complete(Terminal::cancelled(reason.into()))
    }

    pub(crate) fn complete(&self, t: Terminal<T>) -> bool {
        let listeners = {
            let mut s = self.inner.state.lock();
            if s.state.is_terminal() || s.ext.defers_completion() {
                return false;
            }
            let listeners = s.transition(t);
            self.inner.cond.notify_all();
            listeners
        };
        self.notify_listeners(listeners);
        true
    }

    /// Run `f` on the extension state, under the state lock, if the cell
    /// is still pending. If `f` yields an outcome, the cell transitions in
    /// the same critical section, so no other update can interleave
    /// between the check and the transition. Returns `None` if the cell was
    /// already terminal.
    pub(crate) fn update<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut X) -> (R, Option<Terminal<T>>),
    {
        let (r, listeners) = {
            let mut s = self.inner.state.lock();
            if s.state.is_terminal() {
                return None;
            }
            let (r, t) = f(&mut s.ext);
            let listeners = t.map(|t| {
                let listeners = s.transition(t);
                self.inner.cond.notify_all();
                listeners
            });
            (r, listeners)
        };
        if let Some(listeners) = listeners {
            self.notify_listeners(listeners);
        }
        Some(r)
    }

    /// Read the extension state, in any cell state.
    pub(crate) fn with_ext<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&X) -> R,
    {
        f(&self.inner.state.lock().ext)
    }

    /// Never call this while holding the state lock.
    fn notify_listeners(&self, listeners: ListenerList<T, X>) {
        let start = Instant::now();
        let count = listeners.len();
        for (_, mut listener) in listeners {
            call_operation_complete(&mut *listener, self);
        }
        let elapsed = start.elapsed();
        if elapsed > LISTENER_DRAIN_WARN {
            tracing::warn!(?elapsed, count, "slow completion listeners, they must not block");
        }

        let mut s = self.inner.state.lock();
        s.listeners_drained = true;
        self.inner.cond.notify_all();
    }

    /// Register a listener to run once on completion.
    ///
    /// If the cell is already terminal, `f` runs immediately on this thread,
    /// before this call returns, and is never stored.
    pub fn add_listener<F>(&self, f: F) -> ListenerId
    where
        F: FnOnce(&Self) + 'static + Send,
    {
        self.add_listener_with_hook(FnListener::new(f))
    }

    /// Register a listener with its own exception hook.
    pub fn add_listener_with_hook<L>(&self, listener: L) -> ListenerId
    where
        L: FutureListener<Self>,
    {
        let id = ListenerId::next();
        let mut listener: BoxListener<T, X> = Box::new(listener);
        {
            let mut s = self.inner.state.lock();
            if !s.state.is_terminal() {
                s.listeners.push((id, listener));
                return id;
            }
        }
        call_operation_complete(&mut *listener, self);
        id
    }

    /// Remove a listener that has not run yet.
    /// A no-op once the cell is terminal.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut s = self.inner.state.lock();
        if s.state.is_terminal() {
            return false;
        }
        let before = s.listeners.len();
        s.listeners.retain(|(lid, _)| *lid != id);
        before != s.listeners.len()
    }

    /// Register a handler to run when cancellation is requested.
    /// Runs immediately if cancellation was already requested.
    pub fn add_cancel<F>(&self, f: F) -> CancelId
    where
        F: FnOnce() + 'static + Send,
    {
        let id = CancelId::next();
        let handler: CancelHandler = Box::new(f);
        {
            let mut c = self.inner.cancel.lock();
            if !c.requested {
                c.handlers.push((id, handler));
                return id;
            }
        }
        call_cancel(handler);
        id
    }

    /// Remove a cancel handler that has not run yet.
    pub fn remove_cancel(&self, id: CancelId) -> bool {
        let mut c = self.inner.cancel.lock();
        if c.requested {
            return false;
        }
        let before = c.handlers.len();
        c.handlers.retain(|(cid, _)| *cid != id);
        before != c.handlers.len()
    }

    /// Ask the underlying operation to abort.
    ///
    /// Idempotent: only the first call runs the cancel handlers. The cell
    /// stays pending until the operation itself completes it.
    /// Returns `true` for the first call.
    pub fn request_cancel(&self) -> bool {
        let handlers = {
            let mut c = self.inner.cancel.lock();
            if c.requested {
                return false;
            }
            c.requested = true;
            std::mem::take(&mut c.handlers)
        };
        tracing::debug!(handlers = handlers.len(), "cancel requested");
        for (_, handler) in handlers {
            call_cancel(handler);
        }
        true
    }

    /// Has cancellation been requested?
    pub fn is_cancel_requested(&self) -> bool {
        self.inner.cancel.lock().requested
    }

    /// Wake every interruptible wait on this cell with
    /// [`PromiseError::Interrupted`]. Uninterruptible waits keep waiting.
    pub fn interrupt_waiters(&self) {
        let mut s = self.inner.state.lock();
        s.interrupt_epoch += 1;
        self.inner.cond.notify_all();
    }

    /// Block until terminal.
    pub fn await_done(&self, guard: &dyn AwaitGuard) -> PromiseResult<()> {
        self.wait_for(guard, None, true, is_terminal).map(|_| ())
    }

    /// Block until terminal, ignoring interrupts.
    pub fn await_uninterruptibly(&self, guard: &dyn AwaitGuard) -> PromiseResult<()> {
        self.wait_for(guard, None, false, is_terminal).map(|_| ())
    }

    /// Block until terminal or until `timeout` elapses.
    /// Returns whether the cell is terminal. Never changes the cell.
    pub fn await_timeout(&self, guard: &dyn AwaitGuard, timeout: Duration) -> PromiseResult<bool> {
        self.wait_for(guard, Some(timeout), true, is_terminal)
    }

    /// Like [`Self::await_timeout`], ignoring interrupts.
    pub fn await_timeout_uninterruptibly(
        &self,
        guard: &dyn AwaitGuard,
        timeout: Duration,
    ) -> PromiseResult<bool> {
        self.wait_for(guard, Some(timeout), false, is_terminal)
    }

    /// Block until the cell is terminal and every listener registered
    /// before completion has returned.
    pub fn await_listeners(&self, guard: &dyn AwaitGuard) -> PromiseResult<()> {
        self.wait_for(guard, None, true, listeners_drained)
            .map(|_| ())
    }

    /// Like [`Self::await_listeners`], ignoring interrupts.
    pub fn await_listeners_uninterruptibly(&self, guard: &dyn AwaitGuard) -> PromiseResult<()> {
        self.wait_for(guard, None, false, listeners_drained)
            .map(|_| ())
    }

    fn wait_for(
        &self,
        guard: &dyn AwaitGuard,
        timeout: Option<Duration>,
        interruptible: bool,
        done: fn(&State<T, X>) -> bool,
    ) -> PromiseResult<bool> {
        guard.check()?;

        // an unrepresentable deadline waits forever
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut s = self.inner.state.lock();
        let mut epoch = s.interrupt_epoch;
        while !done(&s) {
            if s.interrupt_epoch != epoch {
                if interruptible {
                    return Err(PromiseError::Interrupted);
                }
                tracing::debug!("interrupted, but ignoring");
                epoch = s.interrupt_epoch;
            }
            match deadline {
                None => self.inner.cond.wait(&mut s),
                Some(deadline) => {
                    if wait_until(&self.inner.cond, &mut s, deadline) {
                        break;
                    }
                }
            }
        }
        Ok(done(&s))
    }

    /// Resolves with this cell once it is terminal,
    /// without blocking a thread.
    pub fn wait(&self) -> impl std::future::Future<Output = Self> + 'static + Send {
        let (s, r) = futures::channel::oneshot::channel();
        self.add_listener(move |_| {
            let _ = s.send(());
        });
        let this = self.clone();
        async move {
            // the listener can only be dropped unrun if the cell is,
            // and `this` keeps it alive
            let _ = r.await;
            this
        }
    }
}

fn is_terminal<T, X>(s: &State<T, X>) -> bool {
    s.state.is_terminal()
}

fn listeners_drained<T, X>(s: &State<T, X>) -> bool {
    s.listeners_drained
}

/// Returns true if the deadline passed.
fn wait_until<S>(cond: &Condvar, guard: &mut MutexGuard<'_, S>, deadline: Instant) -> bool {
    if Instant::now() >= deadline {
        return true;
    }
    cond.wait_until(guard, deadline).timed_out()
}

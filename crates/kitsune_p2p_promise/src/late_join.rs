//! Late join: sub-futures are registered over time, up to a maximum,
//! and the join succeeds once enough of them succeeded.

use crate::*;

/// Extension state of a [`FutureLateJoin`].
pub struct LateJoin<T, X> {
    max_count: usize,
    min_success: usize,
    submitted: Vec<CompletionCell<T, X>>,
    completed: Vec<CompletionCell<T, X>>,
    evaluated: usize,
    successes: usize,
    last_success: Option<CompletionCell<T, X>>,
    last_failure: Option<FailReason>,
}

impl<T: 'static + Send, X: Extension> Extension for LateJoin<T, X> {}

impl<T: 'static + Send, X: Extension> LateJoin<T, X> {
    fn check(&self) -> Option<Terminal<()>> {
        if self.successes >= self.min_success {
            return Some(Terminal::success(None));
        }
        if self.evaluated >= self.max_count {
            let reason = FailReason::new(format!(
                "late-join failed: {} of {} succeeded, {} required",
                self.successes, self.max_count, self.min_success,
            ));
            return Some(Terminal::failure(match &self.last_failure {
                Some(cause) => reason.caused_by(cause.clone()),
                None => reason,
            }));
        }
        None
    }
}

/// Joins up to `max_count` sub-futures registered after construction.
pub type FutureLateJoin<T, X = ()> = CompletionCell<(), LateJoin<T, X>>;

impl<T: 'static + Send, X: Extension> CompletionCell<(), LateJoin<T, X>> {
    /// Accept up to `max_count` registrations, succeed after `min_success`
    /// of them succeeded. `min_success == 0` succeeds right away.
    pub fn new(max_count: usize, min_success: usize) -> Self {
        let this = Self::with_extension(LateJoin {
            max_count,
            min_success,
            submitted: Vec::new(),
            completed: Vec::new(),
            evaluated: 0,
            successes: 0,
            last_success: None,
            last_failure: None,
        });
        this.update(|lj| ((), lj.check()));
        this
    }

    /// Register a sub-future. Returns `false` and leaves `sub` untracked
    /// if this is already terminal or `max_count` futures were registered.
    pub fn register(&self, sub: CompletionCell<T, X>) -> bool {
        let accepted = self
            .update(|lj| {
                if lj.submitted.len() >= lj.max_count {
                    return (false, None);
                }
                lj.submitted.push(sub.clone());
                (true, None)
            })
            .unwrap_or(false);
        if !accepted {
            tracing::trace!("late-join registration refused");
            return false;
        }
        let this = self.clone();
        sub.add_listener(move |sub| this.evaluate(sub));
        true
    }

    fn evaluate(&self, sub: &CompletionCell<T, X>) {
        let success = sub.is_success();
        let reason = sub.fail_reason();
        self.update(|lj| {
            lj.evaluated += 1;
            lj.completed.push(sub.clone());
            if success {
                lj.successes += 1;
                lj.last_success = Some(sub.clone());
            } else {
                lj.last_failure = Some(reason.unwrap_or_else(FailReason::unknown));
            }
            ((), lj.check())
        });
    }

    /// Registered sub-futures, in registration order.
    pub fn submitted(&self) -> Vec<CompletionCell<T, X>> {
        self.with_ext(|lj| lj.submitted.clone())
    }

    /// Evaluated sub-futures, in completion order.
    pub fn completed(&self) -> Vec<CompletionCell<T, X>> {
        self.with_ext(|lj| lj.completed.clone())
    }

    /// The most recent successful sub-future.
    pub fn last_success(&self) -> Option<CompletionCell<T, X>> {
        self.with_ext(|lj| lj.last_success.clone())
    }

    /// Number of successful sub-futures.
    pub fn success_count(&self) -> usize {
        self.with_ext(|lj| lj.successes)
    }

    /// Number of evaluated sub-futures.
    pub fn evaluated_count(&self) -> usize {
        self.with_ext(|lj| lj.evaluated)
    }

    /// Registration cap.
    pub fn max_count(&self) -> usize {
        self.with_ext(|lj| lj.max_count)
    }

    /// Successes needed.
    pub fn min_success(&self) -> usize {
        self.with_ext(|lj| lj.min_success)
    }
}

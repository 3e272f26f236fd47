//! Bounded fork-join: wait on a fixed set of sub-operations until enough
//! of them succeeded, or until every one of them is accounted for.
//!
//! Read fan-out over-provisions requests and sets `cancel_on_finish`, so
//! redundant in-flight requests are abandoned once the threshold is met.
//! Writes should leave it unset: an in-flight write must be allowed to
//! finish, or it may end up half-applied.

use crate::*;

/// Extension state of a [`FutureForkJoin`].
pub struct ForkJoin<T, X> {
    slots: Vec<Option<CompletionCell<T, X>>>,
    threshold: usize,
    cancel_on_finish: bool,
    evaluated: usize,
    successes: usize,
    completed: Vec<CompletionCell<T, X>>,
    last_failure: Option<FailReason>,
}

impl<T: 'static + Send, X: Extension> Extension for ForkJoin<T, X> {}

impl<T: 'static + Send, X: Extension> ForkJoin<T, X> {
    fn failure(&self) -> Terminal<()> {
        let reason = FailReason::new(format!(
            "fork-join failed: {} of {} succeeded, {} required",
            self.successes,
            self.slots.len(),
            self.threshold,
        ));
        Terminal::failure(match &self.last_failure {
            Some(cause) => reason.caused_by(cause.clone()),
            None => reason,
        })
    }

    /// The slots still populated, if they are to be cancelled.
    fn to_cancel(&self) -> Vec<CompletionCell<T, X>> {
        if !self.cancel_on_finish {
            return Vec::new();
        }
        self.slots.iter().flatten().cloned().collect()
    }
}

/// Waits on a fixed-size set of sub-futures.
/// Empty slots count as already failed.
pub type FutureForkJoin<T, X = ()> = CompletionCell<(), ForkJoin<T, X>>;

impl<T: 'static + Send, X: Extension> CompletionCell<(), ForkJoin<T, X>> {
    /// Succeed only if every slot succeeds.
    pub fn new(slots: Vec<Option<CompletionCell<T, X>>>) -> Self {
        let threshold = slots.len();
        Self::with_threshold(threshold, false, slots)
    }

    /// Succeed once `threshold` slots succeeded, fail once every slot is
    /// accounted for without reaching it. With `cancel_on_finish`, slots
    /// not yet evaluated get `request_cancel()` once this finishes.
    pub fn with_threshold(
        threshold: usize,
        cancel_on_finish: bool,
        slots: Vec<Option<CompletionCell<T, X>>>,
    ) -> Self {
        let this = Self::with_extension(ForkJoin {
            slots: slots.clone(),
            threshold,
            cancel_on_finish,
            evaluated: 0,
            successes: 0,
            completed: Vec::new(),
            last_failure: None,
        });

        if slots.is_empty() {
            this.complete_failure("no futures to join");
            return this;
        }

        if threshold == 0 {
            this.finish_if(|_| Some(Terminal::success(None)));
            return this;
        }

        for (index, slot) in slots.into_iter().enumerate() {
            if this.is_completed() {
                break;
            }
            match slot {
                Some(sub) => {
                    let this = this.clone();
                    sub.add_listener(move |sub| this.evaluate(sub, index));
                }
                None => {
                    this.finish_if(|fj| {
                        fj.evaluated += 1;
                        if fj.evaluated >= fj.slots.len() {
                            Some(fj.failure())
                        } else {
                            None
                        }
                    });
                }
            }
        }

        this
    }

    /// Apply `f` atomically with any resulting transition,
    /// then cancel the leftover slots if this finished.
    fn finish_if<F>(&self, f: F)
    where
        F: FnOnce(&mut ForkJoin<T, X>) -> Option<Terminal<()>>,
    {
        let to_cancel = self.update(|fj| {
            let t = f(fj);
            let to_cancel = if t.is_some() {
                fj.to_cancel()
            } else {
                Vec::new()
            };
            (to_cancel, t)
        });
        for sub in to_cancel.into_iter().flatten() {
            sub.request_cancel();
        }
    }

    fn evaluate(&self, sub: &CompletionCell<T, X>, index: usize) {
        // the sub is terminal, read it before taking our own lock
        let success = sub.is_success();
        let reason = sub.fail_reason();

        // a no-op once we are terminal: a slot's listener
        // may still fire after we have decided
        self.finish_if(|fj| {
            fj.completed.push(sub.clone());
            fj.slots[index] = None;
            if success {
                fj.successes += 1;
                if fj.successes >= fj.threshold {
                    return Some(Terminal::success(None));
                }
            } else {
                fj.last_failure = Some(reason.unwrap_or_else(FailReason::unknown));
            }
            fj.evaluated += 1;
            if fj.evaluated >= fj.slots.len() {
                Some(fj.failure())
            } else {
                None
            }
        });
    }

    /// Number of successful sub-futures evaluated.
    pub fn success_count(&self) -> usize {
        self.with_ext(|fj| fj.successes)
    }

    /// Number of slots accounted for without reaching the threshold.
    pub fn evaluated_count(&self) -> usize {
        self.with_ext(|fj| fj.evaluated)
    }

    /// Evaluated sub-futures, in arrival order.
    pub fn completed(&self) -> Vec<CompletionCell<T, X>> {
        self.with_ext(|fj| fj.completed.clone())
    }

    /// The last evaluated sub-future.
    pub fn last(&self) -> Option<CompletionCell<T, X>> {
        self.with_ext(|fj| fj.completed.last().cloned())
    }

    /// The success threshold.
    pub fn threshold(&self) -> usize {
        self.with_ext(|fj| fj.threshold)
    }
}

use crate::*;

/// Promise Timeout
#[derive(Debug, Clone, Copy)]
pub struct PromiseTimeout(std::time::Instant);

impl PromiseTimeout {
    /// Create a new timeout for duration in the future.
    pub fn new(duration: std::time::Duration) -> Self {
        let now = std::time::Instant::now();
        // saturate far-future durations rather than overflow
        Self(
            now.checked_add(duration)
                .unwrap_or_else(|| now + std::time::Duration::from_secs(60 * 60 * 24 * 365)),
        )
    }

    /// Convenience fn to create a new timeout for an amount of milliseconds.
    pub fn from_millis(millis: u64) -> Self {
        Self::new(std::time::Duration::from_millis(millis))
    }

    /// Get Duration until timeout expires.
    pub fn time_remaining(&self) -> std::time::Duration {
        self.0.saturating_duration_since(std::time::Instant::now())
    }

    /// Has this timeout expired?
    pub fn is_expired(&self) -> bool {
        self.0 <= std::time::Instant::now()
    }

    /// `Ok(())` if not expired, a timeout failure if expired.
    pub fn ok(&self) -> PromiseResult<()> {
        if self.is_expired() {
            Err(FailReason::timeout().into())
        } else {
            Ok(())
        }
    }

    /// Fail `cell` with [`FailReason::timeout`] when this expires,
    /// unless it completed first. See [`fail_on_timeout`].
    ///
    /// # Panics
    ///
    /// Panics if called outside the context of a tokio runtime.
    pub fn apply<T, X>(&self, cell: &CompletionCell<T, X>) -> tokio::task::JoinHandle<()>
    where
        T: 'static + Send,
        X: Extension,
    {
        fail_on_timeout(cell, self.time_remaining())
    }
}

/// Spawn a task completing `cell` as failed with [`FailReason::timeout`]
/// once `duration` elapsed. The task is aborted as soon as the cell
/// completes.
///
/// # Panics
///
/// Panics if called outside the context of a tokio runtime.
pub fn fail_on_timeout<T, X>(
    cell: &CompletionCell<T, X>,
    duration: std::time::Duration,
) -> tokio::task::JoinHandle<()>
where
    T: 'static + Send,
    X: Extension,
{
    let task_cell = cell.clone();
    let task = tokio::task::spawn(async move {
        tokio::time::sleep(duration).await;
        if task_cell.complete_failure(FailReason::timeout()) {
            tracing::debug!(?duration, "promise timed out");
        }
    });
    let abort = task.abort_handle();
    cell.add_listener(move |_| abort.abort());
    task
}

/// [`fail_on_timeout`] with the configured default rpc timeout.
///
/// # Panics
///
/// Panics if called outside the context of a tokio runtime.
pub fn fail_on_timeout_default<T, X>(
    cell: &CompletionCell<T, X>,
    tuning_params: &PromiseTuningParams,
) -> tokio::task::JoinHandle<()>
where
    T: 'static + Send,
    X: Extension,
{
    fail_on_timeout(cell, tuning_params.default_rpc_timeout())
}

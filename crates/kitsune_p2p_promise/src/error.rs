//! Failure reasons and api errors for kitsune promises.

/// Why an operation did not succeed.
///
/// In a p2p network peers disappear all the time, so a failure is a routine
/// outcome rather than an exceptional one. A reason can be attributed to an
/// upstream reason (`caused_by`), e.g. a fork-join failing because its last
/// member failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct FailReason {
    message: String,
    #[source]
    cause: Option<Box<FailReason>>,
}

impl FailReason {
    /// Construct a new reason with no upstream cause.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    /// Attribute this reason to an upstream reason.
    #[must_use]
    pub fn caused_by(mut self, cause: FailReason) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Capture an error, including its `source()` chain.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let cause = err.source().map(FailReason::from_error);
        Self {
            message: err.to_string(),
            cause: cause.map(Box::new),
        }
    }

    /// The operation did not complete in time.
    pub fn timeout() -> Self {
        Self::new("timeout")
    }

    /// A deferred response was finalized before any outcome was recorded.
    pub fn no_result_recorded() -> Self {
        Self::new("no result recorded")
    }

    /// Default reason of a cell that never recorded one.
    pub fn unknown() -> Self {
        Self::new("unknown")
    }

    /// The message of this reason, without its causes.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The upstream reason, if any.
    pub fn cause(&self) -> Option<&FailReason> {
        self.cause.as_deref()
    }

    /// Iterate this reason followed by every upstream cause.
    pub fn chain(&self) -> impl Iterator<Item = &FailReason> {
        std::iter::successors(Some(self), |r| r.cause())
    }

    /// Render the full cause chain for logs: `outer <-> inner <-> root`.
    pub fn to_display_string(&self) -> String {
        self.chain()
            .map(FailReason::message)
            .collect::<Vec<_>>()
            .join(" <-> ")
    }
}

impl From<String> for FailReason {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for FailReason {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Kitsune Promise Error Type.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PromiseError {
    /// Blocking here would stall the transport's io event loop.
    #[error(
        "await on io thread '{thread}' would deadlock, \
         add a listener instead or await from a different thread"
    )]
    DeadlockGuard {
        /// Name of the refused thread.
        thread: String,
    },

    /// An interruptible wait was woken by `interrupt_waiters()`.
    #[error("interrupted while waiting")]
    Interrupted,

    /// The operation failed.
    #[error("Failed: {}", .0.to_display_string())]
    Failed(#[from] FailReason),

    /// Other
    #[error("Other: {0}")]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// Kitsune promise result type.
pub type PromiseResult<T> = std::result::Result<T, PromiseError>;

impl PromiseError {
    /// promote a custom error type to a PromiseError
    pub fn other(e: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Other(e.into())
    }
}

impl From<String> for PromiseError {
    fn from(s: String) -> Self {
        #[derive(Debug, thiserror::Error)]
        struct OtherError(String);
        impl std::fmt::Display for OtherError {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        PromiseError::other(OtherError(s))
    }
}

impl From<&str> for PromiseError {
    fn from(s: &str) -> Self {
        s.to_string().into()
    }
}

#![deny(missing_docs)]
#![deny(unsafe_code)]

//! Kitsune P2p promise primitives.
//!
//! Every remote call, routing step and storage operation of kitsune hands
//! back a [`CompletionCell`]: a result that does not exist yet. Callers can
//! block on it (with an [`AwaitGuard`] refusing the transport io threads),
//! register listeners, or request cancellation. Combinators compose many
//! in-flight cells into one: [`FutureForkJoin`] for "K of these N peers",
//! [`FutureLateJoin`] for sets that grow over time, and the
//! [`when_all`] family.

/// Re-exported dependencies.
pub mod dependencies {
    pub use ::futures;
    pub use ::parking_lot;
    pub use ::thiserror;
    pub use ::tokio;
    pub use ::tracing;
}

mod aggregate;
mod cell;
mod config;
mod done;
mod error;
mod fork_join;
mod guard;
mod latch;
mod late_join;
mod listener;
mod response;
mod timeout;

pub use aggregate::*;
pub use cell::*;
pub use config::*;
pub use done::*;
pub use error::*;
pub use fork_join::*;
pub use guard::*;
pub use latch::*;
pub use late_join::*;
pub use listener::*;
pub use response::*;
pub use timeout::*;

pub(crate) use cell::Terminal;
pub(crate) use listener::{call_cancel, call_operation_complete, CancelHandler, FnListener};

//! Structured errors for the loop lifecycle.
//!
//! `LoopError` is what crosses the public API. Effect handlers and action
//! sources use `anyhow` internally; their failures are turned into actions by
//! the handler itself and never surface here.

use thiserror::Error;

/// Errors returned by [`Loop`](crate::Loop) lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoopError {
    /// `start` was called on a loop that is already draining.
    #[error("loop already started")]
    AlreadyStarted,

    /// The drain task ended before it signalled that it was running.
    #[error("loop stopped before it began draining")]
    Stopped,
}

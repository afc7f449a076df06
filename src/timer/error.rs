//! Timer and timer-registry errors.

use thiserror::Error;

/// Errors raised by timers and the timer registry.
///
/// All variants are precondition or registry conflicts surfaced to the
/// immediate caller. Callback failures are never raised: they drive the
/// timer into [`TimerState::Error`](crate::timer::TimerState::Error) with
/// the failure retained for diagnostics.
#[derive(Debug, Error)]
pub enum TimerError {
    /// Timer ids must be non-empty.
    #[error("timer id must not be empty")]
    EmptyId,

    /// `schedule_timeout` was called while a deadline was already armed.
    #[error("timer '{id}' is already running")]
    AlreadyScheduled { id: String },

    /// A timer with this id is already registered.
    #[error("timer '{id}' already exists")]
    DuplicateId { id: String },

    /// No timer with this id is registered.
    #[error("timer '{id}' not found")]
    NotFound { id: String },

    /// The timer is running and cannot be removed.
    #[error("timer '{id}' is running and cannot be removed")]
    InUse { id: String },
}

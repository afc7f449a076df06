//! Error types for the state machine core.

use crate::core::state::StateData;
use thiserror::Error;

/// Boxed error type for user-supplied fallible logic (conditions, actions,
/// state behaviors, timer callbacks).
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// Which lifecycle behavior of a state failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookPhase {
    Enter,
    Exit,
}

impl std::fmt::Display for HookPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Enter => write!(f, "enter"),
            Self::Exit => write!(f, "exit"),
        }
    }
}

/// Classified guard-evaluation failure.
///
/// A guard that merely does not pass returns `Ok(false)`; this error is
/// reserved for genuine evaluation failures (a user condition failed, a
/// required key was missing, an async guard was reached from the blocking
/// machine). It carries the guard's name, the event id, and a snapshot of the
/// state data at evaluation time, with the original cause preserved.
#[derive(Debug, Error)]
#[error("guard '{guard}' failed evaluating event '{event_id}': {message}")]
pub struct GuardError {
    /// Name of the guard that failed.
    pub guard: String,
    /// Id of the event being evaluated.
    pub event_id: String,
    /// State data at the time of evaluation.
    pub state_data: StateData,
    /// Human-readable failure description.
    pub message: String,
    /// The underlying cause, when the failure originated in user code.
    #[source]
    pub source: Option<DynError>,
}

impl GuardError {
    pub fn new(
        guard: impl Into<String>,
        event_id: impl Into<String>,
        state_data: StateData,
        message: impl Into<String>,
    ) -> Self {
        Self {
            guard: guard.into(),
            event_id: event_id.into(),
            state_data,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the original cause for diagnostics.
    pub fn with_source(mut self, source: DynError) -> Self {
        self.source = Some(source);
        self
    }
}

/// Errors surfaced by the state machine, either returned from `start` or
/// routed to `on_error` observers during event processing.
#[derive(Debug, Error)]
pub enum HsmError {
    /// A guard's underlying condition failed or blew up.
    #[error(transparent)]
    Guard(#[from] GuardError),

    /// A state's enter/exit behavior failed.
    #[error("state '{state}' {phase} behavior failed: {source}")]
    StateBehavior {
        state: String,
        phase: HookPhase,
        source: DynError,
    },

    /// A transition action failed while processing an event.
    #[error("transition action failed for event '{event_id}': {source}")]
    Action { event_id: String, source: DynError },

    /// The machine failed well-formedness validation at start.
    #[error(transparent)]
    Validation(#[from] crate::validation::ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn guard_error_displays_guard_and_event() {
        let err = GuardError::new("my_guard", "ev1", HashMap::new(), "condition failed");
        let text = err.to_string();
        assert!(text.contains("my_guard"));
        assert!(text.contains("ev1"));
        assert!(text.contains("condition failed"));
    }

    #[test]
    fn guard_error_preserves_cause() {
        let cause: DynError = "boom".into();
        let err = GuardError::new("g", "e", HashMap::new(), "failed").with_source(cause);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn state_behavior_error_names_phase() {
        let err = HsmError::StateBehavior {
            state: "A".to_string(),
            phase: HookPhase::Exit,
            source: "broken".into(),
        };
        assert!(err.to_string().contains("exit"));
    }
}

//! States and the mutable data they share.
//!
//! A state is an identity plus optional enter/exit behaviors. Behaviors run
//! inside the machine's critical section and may fail; failures are routed to
//! `on_error` observers without tearing the machine's current state.

use crate::core::error::DynError;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Mutable key/value data shared between guards and actions of one machine.
pub type StateData = HashMap<String, Value>;

/// Fallible behavior invoked when a state is entered or exited.
pub type StateBehavior = Arc<dyn Fn(&mut StateData) -> Result<(), DynError> + Send + Sync>;

/// A state: an identity plus optional enter/exit behaviors.
///
/// States compare by id. Behaviors are optional; a plain `State::new("idle")`
/// is inert on entry and exit.
///
/// # Example
///
/// ```rust
/// use hsm::core::State;
///
/// let state = State::new("active").on_enter(|data| {
///     data.insert("entered".to_string(), true.into());
///     Ok(())
/// });
///
/// assert_eq!(state.id(), "active");
/// ```
#[derive(Clone)]
pub struct State {
    id: String,
    enter: Option<StateBehavior>,
    exit: Option<StateBehavior>,
}

impl State {
    /// Create a state with no enter/exit behaviors.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            enter: None,
            exit: None,
        }
    }

    /// Attach a behavior to run when the state is entered.
    pub fn on_enter<F>(mut self, behavior: F) -> Self
    where
        F: Fn(&mut StateData) -> Result<(), DynError> + Send + Sync + 'static,
    {
        self.enter = Some(Arc::new(behavior));
        self
    }

    /// Attach a behavior to run when the state is exited.
    pub fn on_exit<F>(mut self, behavior: F) -> Self
    where
        F: Fn(&mut StateData) -> Result<(), DynError> + Send + Sync + 'static,
    {
        self.exit = Some(Arc::new(behavior));
        self
    }

    /// The state's identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn run_enter(&self, data: &mut StateData) -> Result<(), DynError> {
        match &self.enter {
            Some(behavior) => behavior(data),
            None => Ok(()),
        }
    }

    pub(crate) fn run_exit(&self, data: &mut StateData) -> Result<(), DynError> {
        match &self.exit {
            Some(behavior) => behavior(data),
            None => Ok(()),
        }
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for State {}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("id", &self.id)
            .field("has_enter", &self.enter.is_some())
            .field("has_exit", &self.exit.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_state_behaviors_are_noops() {
        let state = State::new("idle");
        let mut data = StateData::new();
        state.run_enter(&mut data).unwrap();
        state.run_exit(&mut data).unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn enter_behavior_mutates_state_data() {
        let state = State::new("active").on_enter(|data| {
            data.insert("count".to_string(), 1.into());
            Ok(())
        });

        let mut data = StateData::new();
        state.run_enter(&mut data).unwrap();
        assert_eq!(data["count"], 1);
    }

    #[test]
    fn exit_behavior_failure_is_surfaced() {
        let state = State::new("broken").on_exit(|_| Err("exit failed".into()));
        let mut data = StateData::new();
        assert!(state.run_exit(&mut data).is_err());
    }

    #[test]
    fn states_compare_by_id() {
        let a = State::new("same").on_enter(|_| Ok(()));
        let b = State::new("same");
        let c = State::new("other");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}

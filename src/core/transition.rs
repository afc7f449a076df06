//! Transitions between states.
//!
//! A transition names a source and target state, an ordered guard sequence
//! that must all pass, an ordered action sequence run when the transition
//! fires, and an integer priority used for selection.

use crate::core::error::DynError;
use crate::core::event::Event;
use crate::core::guard::{AsyncGuard, Guard};
use crate::core::state::StateData;
use std::fmt;
use std::sync::Arc;

/// Fallible action executed when a transition fires.
pub type TransitionAction = Arc<dyn Fn(&Event, &mut StateData) -> Result<(), DynError> + Send + Sync>;

/// A guard attached to a transition, either blocking or cooperative.
///
/// The blocking machine evaluates `Sync` guards directly and reports `Async`
/// guards as evaluation failures; the async machine evaluates both.
#[derive(Clone)]
pub enum TransitionGuard {
    Sync(Arc<dyn Guard>),
    Async(Arc<dyn AsyncGuard>),
}

impl TransitionGuard {
    /// Name of the underlying guard, for diagnostics.
    pub fn name(&self) -> &str {
        match self {
            Self::Sync(g) => g.name(),
            Self::Async(g) => g.name(),
        }
    }
}

/// A transition from one state to another.
///
/// Immutable after registration with a machine. Guards and actions run in
/// the order they were attached.
///
/// # Example
///
/// ```rust
/// use hsm::core::{NoOpGuard, Transition};
///
/// let transition = Transition::new("idle", "active")
///     .guard(NoOpGuard)
///     .action(|_event, data| {
///         data.insert("activated".to_string(), true.into());
///         Ok(())
///     })
///     .with_priority(10);
///
/// assert_eq!(transition.source(), "idle");
/// assert_eq!(transition.target(), "active");
/// assert_eq!(transition.priority(), 10);
/// ```
#[derive(Clone)]
pub struct Transition {
    source: String,
    target: String,
    guards: Vec<TransitionGuard>,
    actions: Vec<TransitionAction>,
    priority: i32,
}

impl Transition {
    /// Create a transition with no guards, no actions, and priority 0.
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            guards: Vec::new(),
            actions: Vec::new(),
            priority: 0,
        }
    }

    /// Append a blocking guard.
    pub fn guard(mut self, guard: impl Guard + 'static) -> Self {
        self.guards.push(TransitionGuard::Sync(Arc::new(guard)));
        self
    }

    /// Append a cooperative guard.
    pub fn async_guard(mut self, guard: impl AsyncGuard + 'static) -> Self {
        self.guards.push(TransitionGuard::Async(Arc::new(guard)));
        self
    }

    /// Append an action.
    pub fn action<F>(mut self, action: F) -> Self
    where
        F: Fn(&Event, &mut StateData) -> Result<(), DynError> + Send + Sync + 'static,
    {
        self.actions.push(Arc::new(action));
        self
    }

    /// Set the selection priority. Higher wins; ties resolve by
    /// registration order.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn guards(&self) -> &[TransitionGuard] {
        &self.guards
    }

    pub(crate) fn actions(&self) -> &[TransitionAction] {
        &self.actions
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("source", &self.source)
            .field("target", &self.target)
            .field("guards", &self.guards.len())
            .field("actions", &self.actions.len())
            .field("priority", &self.priority)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::guard::{ConditionGuard, NoOpGuard};

    #[test]
    fn transition_records_endpoints_and_priority() {
        let t = Transition::new("a", "b").with_priority(3);
        assert_eq!(t.source(), "a");
        assert_eq!(t.target(), "b");
        assert_eq!(t.priority(), 3);
    }

    #[test]
    fn guards_keep_attachment_order() {
        let t = Transition::new("a", "b")
            .guard(NoOpGuard)
            .guard(ConditionGuard::new("second", |_, _| Ok(true)));

        let names: Vec<&str> = t.guards().iter().map(|g| g.name()).collect();
        assert_eq!(names, vec!["NoOpGuard", "second"]);
    }

    #[test]
    fn actions_run_against_event_and_data() {
        let t = Transition::new("a", "b").action(|event, data| {
            data.insert("last_event".to_string(), event.id().into());
            Ok(())
        });

        let mut data = StateData::new();
        for action in t.actions() {
            action(&Event::new("go"), &mut data).unwrap();
        }
        assert_eq!(data["last_event"], "go");
    }
}

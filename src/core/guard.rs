//! Guard predicates gating state transitions.
//!
//! A guard is a capability, not a concrete type: anything exposing
//! `evaluate(event, state_data) -> bool` qualifies. A guard that does not
//! pass returns `Ok(false)`; only a genuine evaluation failure (the
//! underlying condition blew up, required data was missing) is an error, and
//! that error is reported through the machine's error channel while still
//! counting as "did not pass" for selection purposes.

use crate::core::error::{DynError, GuardError};
use crate::core::event::Event;
use crate::core::state::StateData;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Future returned by [`AsyncGuard::evaluate`].
pub type GuardFuture<'a> = Pin<Box<dyn Future<Output = Result<bool, GuardError>> + Send + 'a>>;

/// Blocking guard capability.
///
/// # Example
///
/// ```rust
/// use hsm::core::{ConditionGuard, Event, Guard, StateData};
///
/// let guard = ConditionGuard::new("has_budget", |_event, data: &StateData| {
///     Ok(data.get("budget").and_then(|v| v.as_i64()).unwrap_or(0) > 0)
/// });
///
/// let mut data = StateData::new();
/// data.insert("budget".to_string(), 10.into());
/// assert!(guard.evaluate(&Event::new("spend"), &data).unwrap());
/// ```
pub trait Guard: Send + Sync {
    /// Name used in diagnostics when evaluation fails.
    fn name(&self) -> &str;

    /// Evaluate the guard against an event and the machine's state data.
    fn evaluate(&self, event: &Event, state_data: &StateData) -> Result<bool, GuardError>;
}

/// Cooperative guard capability, evaluated by the async state machine.
pub trait AsyncGuard: Send + Sync {
    fn name(&self) -> &str;

    fn evaluate<'a>(&'a self, event: &'a Event, state_data: &'a StateData) -> GuardFuture<'a>;
}

/// A guard that always passes. Useful as a placeholder when a transition
/// needs no condition.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpGuard;

impl Guard for NoOpGuard {
    fn name(&self) -> &str {
        "NoOpGuard"
    }

    fn evaluate(&self, _event: &Event, _state_data: &StateData) -> Result<bool, GuardError> {
        Ok(true)
    }
}

/// A guard requiring certain keys to exist in the state data.
///
/// A missing key is an evaluation failure, not a mismatch: the machine
/// reports it through the error channel.
#[derive(Clone, Debug)]
pub struct KeyExistsGuard {
    required_keys: Vec<String>,
}

impl KeyExistsGuard {
    pub fn new<I, K>(required_keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            required_keys: required_keys.into_iter().map(Into::into).collect(),
        }
    }
}

impl Guard for KeyExistsGuard {
    fn name(&self) -> &str {
        "KeyExistsGuard"
    }

    fn evaluate(&self, event: &Event, state_data: &StateData) -> Result<bool, GuardError> {
        for key in &self.required_keys {
            if !state_data.contains_key(key) {
                return Err(GuardError::new(
                    self.name(),
                    event.id(),
                    state_data.clone(),
                    format!("missing required key: {key}"),
                ));
            }
        }
        Ok(true)
    }
}

/// Blocking condition function wrapped by [`ConditionGuard`].
pub type Condition = Box<dyn Fn(&Event, &StateData) -> Result<bool, DynError> + Send + Sync>;

/// A guard wrapping a user-supplied condition.
///
/// The condition decides the boolean outcome; if it fails, the failure is
/// re-surfaced as a [`GuardError`] carrying this guard's name and the
/// original cause.
pub struct ConditionGuard {
    name: String,
    condition: Condition,
}

impl ConditionGuard {
    pub fn new<F>(name: impl Into<String>, condition: F) -> Self
    where
        F: Fn(&Event, &StateData) -> Result<bool, DynError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            condition: Box::new(condition),
        }
    }
}

impl Guard for ConditionGuard {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, event: &Event, state_data: &StateData) -> Result<bool, GuardError> {
        (self.condition)(event, state_data).map_err(|cause| {
            GuardError::new(
                self.name(),
                event.id(),
                state_data.clone(),
                format!("condition evaluation failed: {cause}"),
            )
            .with_source(cause)
        })
    }
}

/// Async condition function wrapped by [`AsyncConditionGuard`].
///
/// Takes owned copies of the event and state data so the returned future is
/// free of borrows.
pub type AsyncCondition = Arc<
    dyn Fn(Event, StateData) -> Pin<Box<dyn Future<Output = Result<bool, DynError>> + Send>>
        + Send
        + Sync,
>;

/// A guard wrapping a user-supplied async condition, for conditions that
/// need I/O or other awaits. Evaluated by the async state machine; the
/// blocking machine reports it as an evaluation failure.
pub struct AsyncConditionGuard {
    name: String,
    condition: AsyncCondition,
}

impl AsyncConditionGuard {
    pub fn new<F, Fut>(name: impl Into<String>, condition: F) -> Self
    where
        F: Fn(Event, StateData) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, DynError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            condition: Arc::new(move |event, data| Box::pin(condition(event, data))),
        }
    }
}

impl AsyncGuard for AsyncConditionGuard {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate<'a>(&'a self, event: &'a Event, state_data: &'a StateData) -> GuardFuture<'a> {
        Box::pin(async move {
            (self.condition)(event.clone(), state_data.clone())
                .await
                .map_err(|cause| {
                    GuardError::new(
                        self.name(),
                        event.id(),
                        state_data.clone(),
                        format!("async condition evaluation failed: {cause}"),
                    )
                    .with_source(cause)
                })
        })
    }
}

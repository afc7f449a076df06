//! Events driving state machine transitions.
//!
//! An event is an immutable value: an identifier used for matching and
//! cancellation, an arbitrary JSON payload, and a priority.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Immutable event delivered to a state machine or armed on a timer.
///
/// The id is stable and used for identity comparisons (timer cancellation
/// matches on it); the payload is opaque to the engine.
///
/// # Example
///
/// ```rust
/// use hsm::core::Event;
/// use serde_json::json;
///
/// let event = Event::new("order_placed")
///     .with_payload(json!({"order_id": 42}))
///     .with_priority(1);
///
/// assert_eq!(event.id(), "order_placed");
/// assert_eq!(event.priority(), 1);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    id: String,
    payload: Value,
    priority: i32,
}

impl Event {
    /// Create an event with an empty payload and priority 0.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            payload: Value::Null,
            priority: 0,
        }
    }

    /// Attach a payload.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// The event's identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The event's payload.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// The event's priority.
    pub fn priority(&self) -> i32 {
        self.priority
    }
}

//! Transition history tracking.
//!
//! Keeps an immutable audit trail of applied transitions. `record` returns a
//! new history rather than mutating in place, so snapshots handed to callers
//! never change underneath them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Record of a single applied transition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// Id of the state transitioned from.
    pub from: String,
    /// Id of the state transitioned to.
    pub to: String,
    /// Id of the event that fired the transition.
    pub event_id: String,
    /// When the transition was applied.
    pub timestamp: DateTime<Utc>,
}

impl TransitionRecord {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        event_id: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            event_id: event_id.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Ordered, immutable history of applied transitions.
///
/// # Example
///
/// ```rust
/// use hsm::core::{TransitionHistory, TransitionRecord};
///
/// let history = TransitionHistory::new()
///     .record(TransitionRecord::new("a", "b", "go"))
///     .record(TransitionRecord::new("b", "c", "go"));
///
/// assert_eq!(history.get_path(), vec!["a", "b", "c"]);
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TransitionHistory {
    records: Vec<TransitionRecord>,
}

impl TransitionHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Record a transition, returning a new history. The original is
    /// unchanged.
    pub fn record(&self, record: TransitionRecord) -> Self {
        let mut records = self.records.clone();
        records.push(record);
        Self { records }
    }

    /// The path of state ids traversed: the first record's source followed
    /// by each record's target.
    pub fn get_path(&self) -> Vec<&str> {
        let mut path = Vec::new();
        if let Some(first) = self.records.first() {
            path.push(first.from.as_str());
        }
        for record in &self.records {
            path.push(record.to.as_str());
        }
        path
    }

    /// Elapsed time between the first and last recorded transition, or
    /// `None` when the history is empty.
    pub fn duration(&self) -> Option<Duration> {
        match (self.records.first(), self.records.last()) {
            (Some(first), Some(last)) => last
                .timestamp
                .signed_duration_since(first.timestamp)
                .to_std()
                .ok(),
            _ => None,
        }
    }

    /// All recorded transitions in order.
    pub fn records(&self) -> &[TransitionRecord] {
        &self.records
    }
}

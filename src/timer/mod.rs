//! Timer subsystem: deadline-armed callbacks in two execution models.
//!
//! A timer is a small state machine ([`TimerState`]) around one optional
//! pending deadline. [`Timer`] backs the deadline with a waiting thread;
//! [`AsyncTimer`] backs it with a tokio task. [`TimerManager`] is the
//! thread-safe registry owning named timers of either kind.

mod blocking;
mod cooperative;
mod error;
mod manager;

pub use blocking::Timer;
pub use cooperative::AsyncTimer;
pub use error::TimerError;
pub use manager::{ManagedTimer, TimerManager};

use crate::core::{DynError, Event};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Callback fired when a timer's deadline expires, with the timer id and the
/// armed event. A returned error drives the timer to [`TimerState::Error`].
///
/// Callbacks run inside the timer's critical section: implementations must
/// not block indefinitely or call back into the same timer (`get_info`,
/// `schedule_timeout`, and the rest would deadlock).
pub type TimerCallback = Arc<dyn Fn(&str, &Event) -> Result<(), DynError> + Send + Sync>;

/// Lifecycle state of a single timer.
///
/// None of the states are terminal: `Cancelled`, `Completed`, and `Error`
/// all permit rescheduling, and `shutdown` forces `Idle` from anywhere.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerState {
    /// No deadline armed.
    Idle,
    /// Deadline armed, callback pending.
    Running,
    /// Pending deadline cleared by request.
    Cancelled,
    /// Callback executed successfully.
    Completed,
    /// Callback failed during execution.
    Error,
}

/// Independent point-in-time snapshot of a timer.
///
/// Once returned, a snapshot never changes: later mutation of the live timer
/// is invisible to it. `remaining` is derived and present only while the
/// timer is `Running`.
#[derive(Clone, Debug, PartialEq)]
pub struct TimerInfo {
    pub id: String,
    pub state: TimerState,
    pub duration: Option<Duration>,
    pub start_time: Option<Instant>,
    pub remaining: Option<Duration>,
    /// Description of the most recent callback failure, retained for
    /// diagnostics while the timer is in `Error`.
    pub last_error: Option<String>,
}

/// Shared mutable fields guarded by each timer's own exclusive section.
#[derive(Debug)]
pub(crate) struct TimerInner {
    pub state: TimerState,
    pub duration: Option<Duration>,
    pub start_time: Option<Instant>,
    pub event: Option<Event>,
    /// Bumped on every schedule, cancel, and shutdown; a pending expiry
    /// whose generation no longer matches is stale and must not fire.
    pub generation: u64,
    pub last_error: Option<String>,
}

impl TimerInner {
    pub(crate) fn new() -> Self {
        Self {
            state: TimerState::Idle,
            duration: None,
            start_time: None,
            event: None,
            generation: 0,
            last_error: None,
        }
    }

    /// Clear all scheduling fields.
    pub(crate) fn clear_schedule(&mut self) {
        self.duration = None;
        self.start_time = None;
        self.event = None;
    }

    pub(crate) fn snapshot(&self, id: &str) -> TimerInfo {
        let remaining = match (self.state, self.duration, self.start_time) {
            (TimerState::Running, Some(duration), Some(start)) => {
                Some(duration.saturating_sub(start.elapsed()))
            }
            _ => None,
        };
        TimerInfo {
            id: id.to_string(),
            state: self.state,
            duration: self.duration,
            start_time: self.start_time,
            remaining,
            last_error: self.last_error.clone(),
        }
    }
}

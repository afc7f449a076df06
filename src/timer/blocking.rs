//! Thread-backed timer.

use crate::core::{DynError, Event};
use crate::timer::{TimerCallback, TimerError, TimerInfo, TimerInner, TimerState};
use parking_lot::{Condvar, Mutex};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// State shared between a timer handle and its expiry threads.
struct Shared {
    inner: Mutex<TimerInner>,
    /// Woken on cancel/shutdown so a waiting expiry thread exits promptly
    /// instead of sleeping out its full duration.
    wake: Condvar,
}

/// Single timer backed by a waiting thread.
///
/// At most one deadline is armed at a time. The expiry thread synchronizes
/// on the timer's own exclusive section before reading or firing, which is
/// what makes cancellation-vs-expiry races deterministic: whichever side
/// acquires the section first wins, and the loser observes a state that
/// makes its own action a no-op.
///
/// # Example
///
/// ```rust,no_run
/// use hsm::core::Event;
/// use hsm::timer::{Timer, TimerState};
/// use std::time::Duration;
///
/// let timer = Timer::new("t1", |timer_id, event| {
///     println!("{timer_id} fired for {}", event.id());
///     Ok(())
/// })
/// .unwrap();
///
/// timer.schedule_timeout(Duration::from_millis(100), Event::new("tick")).unwrap();
/// std::thread::sleep(Duration::from_millis(150));
/// assert_eq!(timer.get_info().state, TimerState::Completed);
/// ```
pub struct Timer {
    id: String,
    callback: TimerCallback,
    shared: Arc<Shared>,
}

impl Timer {
    /// Create an idle timer. Fails if `id` is empty.
    pub fn new<F>(id: impl Into<String>, callback: F) -> Result<Self, TimerError>
    where
        F: Fn(&str, &Event) -> Result<(), DynError> + Send + Sync + 'static,
    {
        let id = id.into();
        if id.is_empty() {
            return Err(TimerError::EmptyId);
        }
        Ok(Self {
            id,
            callback: Arc::new(callback),
            shared: Arc::new(Shared {
                inner: Mutex::new(TimerInner::new()),
                wake: Condvar::new(),
            }),
        })
    }

    /// The timer's identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Arm a deadline: after `duration`, the callback fires with
    /// `(timer_id, event)` unless cancelled first.
    ///
    /// Valid from every state except `Running`; only one deadline may be
    /// armed at a time.
    pub fn schedule_timeout(&self, duration: Duration, event: Event) -> Result<(), TimerError> {
        let mut inner = self.shared.inner.lock();
        if inner.state == TimerState::Running {
            return Err(TimerError::AlreadyScheduled {
                id: self.id.clone(),
            });
        }
        inner.generation += 1;
        let generation = inner.generation;
        inner.state = TimerState::Running;
        inner.duration = Some(duration);
        inner.start_time = Some(Instant::now());
        inner.event = Some(event.clone());
        inner.last_error = None;
        drop(inner);

        tracing::debug!(id = %self.id, ?duration, event = event.id(), "timer armed");

        let shared = Arc::clone(&self.shared);
        let callback = Arc::clone(&self.callback);
        let id = self.id.clone();
        std::thread::spawn(move || {
            run_expiry(&shared, &id, &callback, generation, duration, &event);
        });
        Ok(())
    }

    /// Clear the pending deadline if the timer is running and the armed
    /// event's id matches. Advisory and idempotent: any mismatch is a no-op.
    pub fn cancel_timeout(&self, event_id: &str) {
        let mut inner = self.shared.inner.lock();
        let matches = inner.state == TimerState::Running
            && inner.event.as_ref().is_some_and(|e| e.id() == event_id);
        if !matches {
            return;
        }
        inner.state = TimerState::Cancelled;
        inner.clear_schedule();
        inner.generation += 1;
        self.shared.wake.notify_all();
        tracing::debug!(id = %self.id, event = event_id, "timer cancelled");
    }

    /// Cancel any pending deadline and force the timer to `Idle`,
    /// regardless of prior state. Safe to call concurrently with an
    /// in-flight cancel or expiry.
    pub fn shutdown(&self) {
        let mut inner = self.shared.inner.lock();
        inner.state = TimerState::Idle;
        inner.clear_schedule();
        inner.last_error = None;
        inner.generation += 1;
        self.shared.wake.notify_all();
        tracing::debug!(id = %self.id, "timer shut down");
    }

    /// Independent snapshot of the timer's current state.
    pub fn get_info(&self) -> TimerInfo {
        self.shared.inner.lock().snapshot(&self.id)
    }
}

/// Wait out the deadline, then fire the callback if this arming is still
/// current. Runs on its own thread; all checks and mutations happen under
/// the timer's exclusive section.
fn run_expiry(
    shared: &Shared,
    id: &str,
    callback: &TimerCallback,
    generation: u64,
    duration: Duration,
    event: &Event,
) {
    let deadline = Instant::now() + duration;
    let mut inner = shared.inner.lock();
    loop {
        if inner.generation != generation || inner.state != TimerState::Running {
            // Cancelled, shut down, or re-armed while we waited.
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        shared.wake.wait_for(&mut inner, deadline - now);
    }

    let result = catch_unwind(AssertUnwindSafe(|| callback(id, event)));
    match result {
        Ok(Ok(())) => {
            inner.state = TimerState::Completed;
            tracing::debug!(id, event = event.id(), "timer fired");
        }
        Ok(Err(error)) => {
            inner.state = TimerState::Error;
            inner.last_error = Some(error.to_string());
            tracing::warn!(id, %error, "timer callback failed");
        }
        Err(_) => {
            inner.state = TimerState::Error;
            inner.last_error = Some("timer callback panicked".to_string());
            tracing::warn!(id, "timer callback panicked");
        }
    }
    inner.clear_schedule();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_timer(id: &str) -> (Timer, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let timer = Timer::new(id, move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
        (timer, calls)
    }

    #[test]
    fn empty_id_is_rejected() {
        assert!(matches!(
            Timer::new("", |_, _| Ok(())),
            Err(TimerError::EmptyId)
        ));
    }

    #[test]
    fn new_timer_is_idle() {
        let (timer, _) = counting_timer("t1");
        let info = timer.get_info();
        assert_eq!(info.id, "t1");
        assert_eq!(info.state, TimerState::Idle);
        assert!(info.remaining.is_none());
    }

    #[test]
    fn schedule_arms_a_running_deadline() {
        let (timer, _) = counting_timer("t1");
        timer
            .schedule_timeout(Duration::from_secs(1), Event::new("e"))
            .unwrap();

        let info = timer.get_info();
        assert_eq!(info.state, TimerState::Running);
        assert_eq!(info.duration, Some(Duration::from_secs(1)));
        assert!(info.start_time.is_some());
        assert!(info.remaining.is_some());
        timer.shutdown();
    }

    #[test]
    fn double_schedule_is_a_conflict() {
        let (timer, _) = counting_timer("t1");
        timer
            .schedule_timeout(Duration::from_secs(1), Event::new("e"))
            .unwrap();
        assert!(matches!(
            timer.schedule_timeout(Duration::from_secs(1), Event::new("e")),
            Err(TimerError::AlreadyScheduled { .. })
        ));
        timer.shutdown();
    }

    #[test]
    fn expiry_fires_callback_exactly_once() {
        let (timer, calls) = counting_timer("t1");
        timer
            .schedule_timeout(Duration::from_millis(50), Event::new("e"))
            .unwrap();
        std::thread::sleep(Duration::from_millis(150));

        assert_eq!(timer.get_info().state, TimerState::Completed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancel_clears_schedule_and_prevents_firing() {
        let (timer, calls) = counting_timer("t1");
        timer
            .schedule_timeout(Duration::from_millis(50), Event::new("e"))
            .unwrap();
        timer.cancel_timeout("e");

        let info = timer.get_info();
        assert_eq!(info.state, TimerState::Cancelled);
        assert!(info.duration.is_none());
        assert!(info.start_time.is_none());
        assert!(info.remaining.is_none());

        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancel_with_wrong_event_id_is_a_noop() {
        let (timer, _) = counting_timer("t1");
        timer
            .schedule_timeout(Duration::from_secs(1), Event::new("e"))
            .unwrap();
        timer.cancel_timeout("other");
        assert_eq!(timer.get_info().state, TimerState::Running);
        timer.shutdown();
    }

    #[test]
    fn cancel_when_idle_is_a_noop() {
        let (timer, _) = counting_timer("t1");
        timer.cancel_timeout("anything");
        assert_eq!(timer.get_info().state, TimerState::Idle);
    }

    #[test]
    fn shutdown_forces_idle_from_any_state() {
        let (timer, _) = counting_timer("t1");
        timer
            .schedule_timeout(Duration::from_secs(1), Event::new("e"))
            .unwrap();
        timer.shutdown();

        let info = timer.get_info();
        assert_eq!(info.state, TimerState::Idle);
        assert!(info.duration.is_none());
        assert!(info.start_time.is_none());
    }

    #[test]
    fn failing_callback_drives_error_state() {
        let timer = Timer::new("t1", |_, _| Err("callback blew up".into())).unwrap();
        timer
            .schedule_timeout(Duration::from_millis(30), Event::new("e"))
            .unwrap();
        std::thread::sleep(Duration::from_millis(120));

        let info = timer.get_info();
        assert_eq!(info.state, TimerState::Error);
        assert!(info.last_error.unwrap().contains("callback blew up"));
        assert!(info.duration.is_none());

        // Error is recoverable: shutdown forces Idle...
        timer.shutdown();
        assert_eq!(timer.get_info().state, TimerState::Idle);
    }

    #[test]
    fn error_state_permits_rescheduling() {
        let timer = Timer::new("t1", |_, _| Err("boom".into())).unwrap();
        timer
            .schedule_timeout(Duration::from_millis(20), Event::new("e"))
            .unwrap();
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(timer.get_info().state, TimerState::Error);

        timer
            .schedule_timeout(Duration::from_secs(1), Event::new("e"))
            .unwrap();
        assert_eq!(timer.get_info().state, TimerState::Running);
        timer.shutdown();
    }

    #[test]
    fn panicking_callback_is_contained() {
        let timer = Timer::new("t1", |_, _| panic!("unexpected")).unwrap();
        timer
            .schedule_timeout(Duration::from_millis(20), Event::new("e"))
            .unwrap();
        std::thread::sleep(Duration::from_millis(100));

        let info = timer.get_info();
        assert_eq!(info.state, TimerState::Error);
        assert!(info.last_error.unwrap().contains("panicked"));
    }

    #[test]
    fn rescheduling_after_cancel_works() {
        let (timer, calls) = counting_timer("t1");
        timer
            .schedule_timeout(Duration::from_secs(1), Event::new("e"))
            .unwrap();
        timer.cancel_timeout("e");
        timer
            .schedule_timeout(Duration::from_millis(30), Event::new("e"))
            .unwrap();
        std::thread::sleep(Duration::from_millis(120));

        assert_eq!(timer.get_info().state, TimerState::Completed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remaining_stays_within_duration() {
        let (timer, _) = counting_timer("t1");
        let duration = Duration::from_millis(500);
        timer.schedule_timeout(duration, Event::new("e")).unwrap();
        std::thread::sleep(Duration::from_millis(50));

        let remaining = timer.get_info().remaining.unwrap();
        assert!(remaining <= duration);
        timer.shutdown();
    }
}

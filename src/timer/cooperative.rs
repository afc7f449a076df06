//! Tokio-backed timer.

use crate::core::{DynError, Event};
use crate::timer::{TimerCallback, TimerError, TimerInfo, TimerInner, TimerState};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// State shared between an [`AsyncTimer`] handle and its expiry tasks.
///
/// Mutations are short and never await, so a synchronous lock is fine even
/// on the runtime; the expiry task only takes it after its sleep finishes.
struct Shared {
    inner: Mutex<TimerInner>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

/// Single timer backed by a tokio task.
///
/// Semantically identical to [`Timer`](crate::timer::Timer): one deadline at
/// a time, advisory cancellation, and a generation check so a task that
/// outlives its arming never fires. Cancellation also aborts the pending
/// task so it does not linger until its sleep elapses.
///
/// # Example
///
/// ```rust,no_run
/// use hsm::core::Event;
/// use hsm::timer::{AsyncTimer, TimerState};
/// use std::time::Duration;
///
/// # async fn demo() {
/// let timer = AsyncTimer::new("t1", |timer_id, event| {
///     println!("{timer_id} fired for {}", event.id());
///     Ok(())
/// })
/// .unwrap();
///
/// timer
///     .schedule_timeout(Duration::from_millis(100), Event::new("tick"))
///     .await
///     .unwrap();
/// tokio::time::sleep(Duration::from_millis(150)).await;
/// assert_eq!(timer.get_info().state, TimerState::Completed);
/// # }
/// ```
pub struct AsyncTimer {
    id: String,
    callback: TimerCallback,
    shared: Arc<Shared>,
}

impl AsyncTimer {
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
                handle: Mutex::new(None),
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
    pub async fn schedule_timeout(
        &self,
        duration: Duration,
        event: Event,
    ) -> Result<(), TimerError> {
        let generation = {
            let mut inner = self.shared.inner.lock();
            if inner.state == TimerState::Running {
                return Err(TimerError::AlreadyScheduled {
                    id: self.id.clone(),
                });
            }
            inner.generation += 1;
            inner.state = TimerState::Running;
            inner.duration = Some(duration);
            inner.start_time = Some(Instant::now());
            inner.event = Some(event.clone());
            inner.last_error = None;
            inner.generation
        };

        tracing::debug!(id = %self.id, ?duration, event = event.id(), "timer armed");

        let shared = Arc::clone(&self.shared);
        let callback = Arc::clone(&self.callback);
        let id = self.id.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            fire_if_current(&shared, &id, &callback, generation, &event);
        });
        *self.shared.handle.lock() = Some(task);
        Ok(())
    }

    /// Clear the pending deadline if the timer is running and the armed
    /// event's id matches. Advisory and idempotent: any mismatch is a no-op.
    pub async fn cancel_timeout(&self, event_id: &str) {
        {
            let mut inner = self.shared.inner.lock();
            let matches = inner.state == TimerState::Running
                && inner.event.as_ref().is_some_and(|e| e.id() == event_id);
            if !matches {
                return;
            }
            inner.state = TimerState::Cancelled;
            inner.clear_schedule();
            inner.generation += 1;
        }
        self.abort_pending();
        tracing::debug!(id = %self.id, event = event_id, "timer cancelled");
    }

    /// Cancel any pending deadline and force the timer to `Idle`,
    /// regardless of prior state. Safe to call concurrently with an
    /// in-flight cancel or expiry.
    pub async fn shutdown(&self) {
        {
            let mut inner = self.shared.inner.lock();
            inner.state = TimerState::Idle;
            inner.clear_schedule();
            inner.last_error = None;
            inner.generation += 1;
        }
        self.abort_pending();
        tracing::debug!(id = %self.id, "timer shut down");
    }

    /// Independent snapshot of the timer's current state.
    pub fn get_info(&self) -> TimerInfo {
        self.shared.inner.lock().snapshot(&self.id)
    }

    fn abort_pending(&self) {
        if let Some(task) = self.shared.handle.lock().take() {
            task.abort();
        }
    }
}

/// Fire the callback if this arming is still current. The generation check
/// and the callback run under the timer's exclusive section, so a racing
/// cancel either wins outright or observes the completed state.
fn fire_if_current(
    shared: &Shared,
    id: &str,
    callback: &TimerCallback,
    generation: u64,
    event: &Event,
) {
    let mut inner = shared.inner.lock();
    if inner.generation != generation || inner.state != TimerState::Running {
        return;
    }
    match callback(id, event) {
        Ok(()) => {
            inner.state = TimerState::Completed;
            tracing::debug!(id, event = event.id(), "timer fired");
        }
        Err(error) => {
            inner.state = TimerState::Error;
            inner.last_error = Some(error.to_string());
            tracing::warn!(id, %error, "timer callback failed");
        }
    }
    inner.clear_schedule();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_timer(id: &str) -> (AsyncTimer, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let timer = AsyncTimer::new(id, move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
        (timer, calls)
    }

    #[test]
    fn empty_id_is_rejected() {
        assert!(matches!(
            AsyncTimer::new("", |_, _| Ok(())),
            Err(TimerError::EmptyId)
        ));
    }

    #[tokio::test]
    async fn expiry_fires_callback_exactly_once() {
        let (timer, calls) = counting_timer("t1");
        timer
            .schedule_timeout(Duration::from_millis(30), Event::new("e"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(timer.get_info().state, TimerState::Completed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn double_schedule_is_a_conflict() {
        let (timer, _) = counting_timer("t1");
        timer
            .schedule_timeout(Duration::from_secs(1), Event::new("e"))
            .await
            .unwrap();
        assert!(matches!(
            timer
                .schedule_timeout(Duration::from_secs(1), Event::new("e"))
                .await,
            Err(TimerError::AlreadyScheduled { .. })
        ));
        timer.shutdown().await;
    }

    #[tokio::test]
    async fn cancel_prevents_firing() {
        let (timer, calls) = counting_timer("t1");
        timer
            .schedule_timeout(Duration::from_millis(30), Event::new("e"))
            .await
            .unwrap();
        timer.cancel_timeout("e").await;

        assert_eq!(timer.get_info().state, TimerState::Cancelled);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancel_with_wrong_event_id_is_a_noop() {
        let (timer, _) = counting_timer("t1");
        timer
            .schedule_timeout(Duration::from_secs(1), Event::new("e"))
            .await
            .unwrap();
        timer.cancel_timeout("other").await;
        assert_eq!(timer.get_info().state, TimerState::Running);
        timer.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_forces_idle_and_permits_rescheduling() {
        let (timer, _) = counting_timer("t1");
        timer
            .schedule_timeout(Duration::from_secs(1), Event::new("e"))
            .await
            .unwrap();
        timer.shutdown().await;
        assert_eq!(timer.get_info().state, TimerState::Idle);

        timer
            .schedule_timeout(Duration::from_secs(1), Event::new("e"))
            .await
            .unwrap();
        assert_eq!(timer.get_info().state, TimerState::Running);
        timer.shutdown().await;
    }

    #[tokio::test]
    async fn failing_callback_drives_error_state() {
        let timer = AsyncTimer::new("t1", |_, _| Err("callback blew up".into())).unwrap();
        timer
            .schedule_timeout(Duration::from_millis(20), Event::new("e"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let info = timer.get_info();
        assert_eq!(info.state, TimerState::Error);
        assert!(info.last_error.unwrap().contains("callback blew up"));
    }

    #[tokio::test]
    async fn concurrent_shutdown_and_cancel_converge_on_idle() {
        let timer = Arc::new(counting_timer("t1").0);
        timer
            .schedule_timeout(Duration::from_secs(5), Event::new("e"))
            .await
            .unwrap();

        let a = Arc::clone(&timer);
        let b = Arc::clone(&timer);
        tokio::join!(
            async move { a.shutdown().await },
            async move { b.cancel_timeout("e").await },
        );

        // Shutdown either ran last or the cancel lost the race entirely;
        // either way no deadline survives.
        let state = timer.get_info().state;
        assert!(state == TimerState::Idle || state == TimerState::Cancelled);
        assert!(timer.get_info().remaining.is_none());
    }
}

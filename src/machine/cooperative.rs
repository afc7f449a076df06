//! Cooperative (tokio-based) state machine, event queue, and processing
//! loop.
//!
//! Mirrors the blocking variants with suspension points at lock acquisition,
//! timed waits, and queue draining. Interleavings at those points resolve to
//! the same observable outcomes as the threaded variants.

use crate::core::{Event, HsmError, Hook, State, StateData, Transition, TransitionHistory};
use crate::machine::core::MachineCore;
use crate::validation::{StructuralValidator, Validator};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// How long the processing loop waits on an empty queue before re-checking
/// its stop signal.
const DEQUEUE_WAIT: Duration = Duration::from_millis(100);

/// Cooperative state machine with the same semantics as
/// [`StateMachine`](crate::machine::StateMachine).
///
/// Event processing acquires an async exclusive section, so at most one
/// event is in flight at a time even across interleaved tasks. Async guards
/// are awaited during selection.
pub struct AsyncStateMachine {
    core: Mutex<MachineCore>,
    validator: Box<dyn Validator>,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl AsyncStateMachine {
    /// Create a machine whose cursor starts at `initial`, with the default
    /// structural validator.
    pub fn new(initial: State) -> Self {
        Self {
            core: Mutex::new(MachineCore::new(initial)),
            validator: Box::new(StructuralValidator),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }

    /// Replace the validator consulted at `start`.
    pub fn with_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    /// Register a state.
    pub async fn add_state(&self, state: State) {
        self.core.lock().await.add_state(state);
    }

    /// Register a transition. Immutable after registration.
    pub async fn add_transition(&self, transition: Transition) {
        self.core.lock().await.add_transition(transition);
    }

    /// Register an observer hook.
    pub async fn add_hook(&self, hook: Arc<dyn Hook>) {
        self.core.lock().await.hooks_mut().register(hook);
    }

    /// Validate the machine and enter the initial state.
    pub async fn start(&self) -> Result<(), HsmError> {
        let core = self.core.lock().await;
        if self.started.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.validator.validate(&core)?;
        core.hooks().execute_on_enter(core.current_state_id());
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Process one event under the machine's exclusive section, awaiting
    /// async guards during selection.
    ///
    /// A no-op before `start` or after `stop`; failures are dispatched to
    /// `on_error` observers.
    pub async fn process_event(&self, event: &Event) {
        if !self.started.load(Ordering::SeqCst) || self.stopped.load(Ordering::SeqCst) {
            tracing::trace!(event = event.id(), "event ignored: machine not running");
            return;
        }
        let mut core = self.core.lock().await;
        let selection = core.select_async(event).await;
        for guard_error in selection.guard_errors {
            core.hooks().execute_on_error(&HsmError::Guard(guard_error));
        }
        if let Some(idx) = selection.chosen {
            if let Err(error) = core.apply(idx, event) {
                core.hooks().execute_on_error(&error);
            }
        }
    }

    /// Exit the current state and stop accepting events. Idempotent.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let core = self.core.lock().await;
        core.hooks().execute_on_exit(core.current_state_id());
    }

    /// Id of the current state.
    pub async fn current_state(&self) -> String {
        self.core.lock().await.current_state_id().to_string()
    }

    /// Snapshot of the transition audit history.
    pub async fn history(&self) -> TransitionHistory {
        self.core.lock().await.history().clone()
    }

    /// Read the machine's state data under its exclusive section.
    pub async fn read_data<R>(&self, f: impl FnOnce(&StateData) -> R) -> R {
        f(self.core.lock().await.data())
    }

    /// Mutate the machine's state data under its exclusive section.
    pub async fn update_data(&self, f: impl FnOnce(&mut StateData)) {
        f(self.core.lock().await.data_mut());
    }
}

/// Cooperative FIFO buffer between event producers and a machine.
#[derive(Default)]
pub struct AsyncEventQueue {
    inner: Mutex<VecDeque<Event>>,
    available: Notify,
}

impl AsyncEventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an event at the back of the queue.
    pub async fn enqueue(&self, event: Event) {
        self.inner.lock().await.push_back(event);
        self.available.notify_one();
    }

    /// Remove and return the next event, waiting up to `wait` for one to
    /// arrive. Returns `None` if the queue stayed empty.
    pub async fn dequeue(&self, wait: Duration) -> Option<Event> {
        if let Some(event) = self.inner.lock().await.pop_front() {
            return Some(event);
        }
        match timeout(wait, self.available.notified()).await {
            Ok(()) => self.inner.lock().await.pop_front(),
            Err(_) => None,
        }
    }

    /// Drop all queued events.
    pub async fn clear(&self) {
        self.inner.lock().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

/// Cooperative task that drains an [`AsyncEventQueue`] into an
/// [`AsyncStateMachine`].
pub struct AsyncEventProcessingLoop {
    machine: Arc<AsyncStateMachine>,
    queue: Arc<AsyncEventQueue>,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl AsyncEventProcessingLoop {
    pub fn new(machine: Arc<AsyncStateMachine>, queue: Arc<AsyncEventQueue>) -> Self {
        Self {
            machine,
            queue,
            running: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    /// Start the machine and begin draining the queue as a background task.
    pub async fn start(&self) -> Result<(), HsmError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Err(error) = self.machine.start().await {
            // Release the flag so a repaired machine can be started later.
            self.running.store(false, Ordering::SeqCst);
            return Err(error);
        }

        let machine = Arc::clone(&self.machine);
        let queue = Arc::clone(&self.queue);
        let running = Arc::clone(&self.running);
        let handle = tokio::spawn(async move {
            while running.load(Ordering::SeqCst) {
                if let Some(event) = queue.dequeue(DEQUEUE_WAIT).await {
                    machine.process_event(&event).await;
                }
            }
        });
        *self.handle.lock().await = Some(handle);
        Ok(())
    }

    /// Signal the loop to stop, wait for the task to finish, and stop the
    /// machine.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().await.take() {
            let _ = handle.await;
        }
        self.machine.stop().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AsyncConditionGuard;

    #[tokio::test]
    async fn async_queue_preserves_fifo_order() {
        let queue = AsyncEventQueue::new();
        queue.enqueue(Event::new("first")).await;
        queue.enqueue(Event::new("second")).await;

        let first = queue.dequeue(Duration::from_millis(10)).await.unwrap();
        let second = queue.dequeue(Duration::from_millis(10)).await.unwrap();
        assert_eq!(first.id(), "first");
        assert_eq!(second.id(), "second");
    }

    #[tokio::test]
    async fn async_dequeue_returns_none_after_bounded_wait() {
        let queue = AsyncEventQueue::new();
        assert!(queue.dequeue(Duration::from_millis(20)).await.is_none());
    }

    #[tokio::test]
    async fn async_machine_processes_events() {
        let machine = AsyncStateMachine::new(State::new("a"));
        machine.add_state(State::new("b")).await;
        machine.add_transition(Transition::new("a", "b")).await;
        machine.start().await.unwrap();

        machine.process_event(&Event::new("go")).await;
        assert_eq!(machine.current_state().await, "b");
    }

    #[tokio::test]
    async fn async_guards_gate_transitions() {
        let machine = AsyncStateMachine::new(State::new("a"));
        machine.add_state(State::new("b")).await;
        machine
            .add_transition(Transition::new("a", "b").async_guard(AsyncConditionGuard::new(
                "ready",
                |_event, data: StateData| async move { Ok(data.contains_key("ready")) },
            )))
            .await;
        machine.start().await.unwrap();

        machine.process_event(&Event::new("go")).await;
        assert_eq!(machine.current_state().await, "a");

        machine
            .update_data(|data| {
                data.insert("ready".to_string(), true.into());
            })
            .await;
        machine.process_event(&Event::new("go")).await;
        assert_eq!(machine.current_state().await, "b");
    }

    #[tokio::test]
    async fn stopped_async_machine_ignores_events() {
        let machine = AsyncStateMachine::new(State::new("a"));
        machine.add_state(State::new("b")).await;
        machine.add_transition(Transition::new("a", "b")).await;
        machine.start().await.unwrap();
        machine.stop().await;

        machine.process_event(&Event::new("go")).await;
        assert_eq!(machine.current_state().await, "a");
    }

    #[tokio::test]
    async fn processing_loop_can_start_after_machine_is_repaired() {
        let machine = Arc::new(AsyncStateMachine::new(State::new("a")));
        machine.add_transition(Transition::new("a", "b")).await;

        let queue = Arc::new(AsyncEventQueue::new());
        let event_loop = AsyncEventProcessingLoop::new(Arc::clone(&machine), Arc::clone(&queue));

        assert!(event_loop.start().await.is_err());

        machine.add_state(State::new("b")).await;
        event_loop.start().await.unwrap();

        queue.enqueue(Event::new("go")).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        event_loop.stop().await;
        assert_eq!(machine.current_state().await, "b");
    }

    #[tokio::test]
    async fn processing_loop_drains_queue() {
        let machine = Arc::new(AsyncStateMachine::new(State::new("a")));
        machine.add_state(State::new("b")).await;
        machine.add_transition(Transition::new("a", "b")).await;

        let queue = Arc::new(AsyncEventQueue::new());
        let event_loop = AsyncEventProcessingLoop::new(Arc::clone(&machine), Arc::clone(&queue));

        event_loop.start().await.unwrap();
        queue.enqueue(Event::new("go")).await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        event_loop.stop().await;
        assert_eq!(machine.current_state().await, "b");
    }
}

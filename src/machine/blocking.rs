//! Thread-based state machine, event queue, and processing loop.

use crate::core::{Event, HsmError, Hook, State, StateData, Transition, TransitionHistory};
use crate::machine::core::MachineCore;
use crate::validation::{StructuralValidator, Validator};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// How long the processing loop waits on an empty queue before re-checking
/// its stop signal.
const DEQUEUE_WAIT: Duration = Duration::from_millis(100);

/// Blocking state machine.
///
/// Multiple threads may call into the same machine; event processing happens
/// under an exclusive section, so at most one event is in flight at a time.
/// Mid-transition failures are routed to `on_error` observers and never
/// returned to the caller.
///
/// # Example
///
/// ```rust
/// use hsm::core::{Event, State, Transition};
/// use hsm::machine::StateMachine;
///
/// let machine = StateMachine::new(State::new("idle"));
/// machine.add_state(State::new("active"));
/// machine.add_transition(Transition::new("idle", "active"));
///
/// machine.start().unwrap();
/// machine.process_event(&Event::new("activate"));
/// assert_eq!(machine.current_state(), "active");
/// ```
pub struct StateMachine {
    core: Mutex<MachineCore>,
    validator: Box<dyn Validator>,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl StateMachine {
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
    pub fn add_state(&self, state: State) {
        self.core.lock().add_state(state);
    }

    /// Register a transition. Immutable after registration.
    pub fn add_transition(&self, transition: Transition) {
        self.core.lock().add_transition(transition);
    }

    /// Register an observer hook.
    pub fn add_hook(&self, hook: Arc<dyn Hook>) {
        self.core.lock().hooks_mut().register(hook);
    }

    /// Validate the machine and enter the initial state.
    ///
    /// Runs the validator once; a validation failure prevents start. On
    /// success the initial state's `on_enter` hook is dispatched. Calling
    /// `start` on an already-started machine is a no-op.
    pub fn start(&self) -> Result<(), HsmError> {
        let core = self.core.lock();
        if self.started.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.validator.validate(&core)?;
        core.hooks().execute_on_enter(core.current_state_id());
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Process one event under the machine's exclusive section.
    ///
    /// A no-op before `start` or after `stop`. Guard evaluation failures and
    /// mid-transition errors are dispatched to `on_error` observers; an event
    /// matching no transition is silently ignored.
    pub fn process_event(&self, event: &Event) {
        if !self.started.load(Ordering::SeqCst) || self.stopped.load(Ordering::SeqCst) {
            tracing::trace!(event = event.id(), "event ignored: machine not running");
            return;
        }
        let mut core = self.core.lock();
        let selection = core.select(event);
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
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let core = self.core.lock();
        core.hooks().execute_on_exit(core.current_state_id());
    }

    /// Id of the current state.
    pub fn current_state(&self) -> String {
        self.core.lock().current_state_id().to_string()
    }

    /// Snapshot of the transition audit history.
    pub fn history(&self) -> TransitionHistory {
        self.core.lock().history().clone()
    }

    /// Read the machine's state data under its exclusive section.
    pub fn read_data<R>(&self, f: impl FnOnce(&StateData) -> R) -> R {
        f(self.core.lock().data())
    }

    /// Mutate the machine's state data under its exclusive section.
    pub fn update_data(&self, f: impl FnOnce(&mut StateData)) {
        f(self.core.lock().data_mut());
    }
}

/// FIFO buffer between event producers and a machine.
///
/// `dequeue` waits a bounded time for an event rather than blocking
/// indefinitely, so a draining loop stays responsive to its stop signal.
#[derive(Default)]
pub struct EventQueue {
    inner: Mutex<VecDeque<Event>>,
    available: Condvar,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an event at the back of the queue.
    pub fn enqueue(&self, event: Event) {
        self.inner.lock().push_back(event);
        self.available.notify_one();
    }

    /// Remove and return the next event, waiting up to `wait` for one to
    /// arrive. Returns `None` if the queue stayed empty.
    pub fn dequeue(&self, wait: Duration) -> Option<Event> {
        let deadline = Instant::now() + wait;
        let mut queue = self.inner.lock();
        loop {
            if let Some(event) = queue.pop_front() {
                return Some(event);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            if self.available.wait_for(&mut queue, deadline - now).timed_out() {
                return queue.pop_front();
            }
        }
    }

    /// Drop all queued events.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

/// Background thread that drains an [`EventQueue`] into a [`StateMachine`].
pub struct EventProcessingLoop {
    machine: Arc<StateMachine>,
    queue: Arc<EventQueue>,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl EventProcessingLoop {
    pub fn new(machine: Arc<StateMachine>, queue: Arc<EventQueue>) -> Self {
        Self {
            machine,
            queue,
            running: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    /// Start the machine and begin draining the queue on a background
    /// thread.
    pub fn start(&self) -> Result<(), HsmError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Err(error) = self.machine.start() {
            // Release the flag so a repaired machine can be started later.
            self.running.store(false, Ordering::SeqCst);
            return Err(error);
        }

        let machine = Arc::clone(&self.machine);
        let queue = Arc::clone(&self.queue);
        let running = Arc::clone(&self.running);
        let handle = std::thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                if let Some(event) = queue.dequeue(DEQUEUE_WAIT) {
                    machine.process_event(&event);
                }
            }
        });
        *self.handle.lock() = Some(handle);
        Ok(())
    }

    /// Signal the loop to stop, wait for the thread to finish, and stop the
    /// machine.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
        self.machine.stop();
    }
}

//! Thread-safe registry of named timers.

use crate::core::{DynError, Event};
use crate::timer::{AsyncTimer, Timer, TimerError, TimerInfo, TimerState};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// A registered timer of either execution model.
#[derive(Clone)]
pub enum ManagedTimer {
    Blocking(Arc<Timer>),
    Cooperative(Arc<AsyncTimer>),
}

impl ManagedTimer {
    /// The timer's identifier.
    pub fn id(&self) -> &str {
        match self {
            ManagedTimer::Blocking(t) => t.id(),
            ManagedTimer::Cooperative(t) => t.id(),
        }
    }

    /// Independent snapshot of the timer's current state.
    pub fn info(&self) -> TimerInfo {
        match self {
            ManagedTimer::Blocking(t) => t.get_info(),
            ManagedTimer::Cooperative(t) => t.get_info(),
        }
    }

    /// The thread-backed timer, if that is what was registered.
    pub fn as_blocking(&self) -> Option<&Arc<Timer>> {
        match self {
            ManagedTimer::Blocking(t) => Some(t),
            ManagedTimer::Cooperative(_) => None,
        }
    }

    /// The tokio-backed timer, if that is what was registered.
    pub fn as_cooperative(&self) -> Option<&Arc<AsyncTimer>> {
        match self {
            ManagedTimer::Blocking(_) => None,
            ManagedTimer::Cooperative(t) => Some(t),
        }
    }
}

/// Registry owning named timers.
///
/// The registry lock is distinct from each timer's own exclusive section
/// and is held only for map operations, so registry calls never contend
/// with in-flight timer expiries. Where both are needed the registry lock
/// is taken first.
///
/// # Example
///
/// ```rust
/// use hsm::timer::TimerManager;
///
/// let manager = TimerManager::new();
/// let timer = manager.create_timer("session", |_, _| Ok(())).unwrap();
/// assert!(manager.get_timer("session").is_some());
/// assert_eq!(timer.id(), "session");
/// ```
#[derive(Default)]
pub struct TimerManager {
    timers: Mutex<HashMap<String, ManagedTimer>>,
}

impl TimerManager {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a thread-backed timer under a unique id.
    pub fn create_timer<F>(
        &self,
        id: impl Into<String>,
        callback: F,
    ) -> Result<Arc<Timer>, TimerError>
    where
        F: Fn(&str, &Event) -> Result<(), DynError> + Send + Sync + 'static,
    {
        let id = id.into();
        let mut timers = self.timers.lock();
        if timers.contains_key(&id) {
            return Err(TimerError::DuplicateId { id });
        }
        let timer = Arc::new(Timer::new(id.clone(), callback)?);
        timers.insert(id, ManagedTimer::Blocking(Arc::clone(&timer)));
        Ok(timer)
    }

    /// Create and register a tokio-backed timer under a unique id.
    pub fn create_async_timer<F>(
        &self,
        id: impl Into<String>,
        callback: F,
    ) -> Result<Arc<AsyncTimer>, TimerError>
    where
        F: Fn(&str, &Event) -> Result<(), DynError> + Send + Sync + 'static,
    {
        let id = id.into();
        let mut timers = self.timers.lock();
        if timers.contains_key(&id) {
            return Err(TimerError::DuplicateId { id });
        }
        let timer = Arc::new(AsyncTimer::new(id.clone(), callback)?);
        timers.insert(id, ManagedTimer::Cooperative(Arc::clone(&timer)));
        Ok(timer)
    }

    /// Look up a registered timer.
    pub fn get_timer(&self, id: &str) -> Option<ManagedTimer> {
        self.timers.lock().get(id).cloned()
    }

    /// Remove a timer from the registry. Fails if the timer is unknown or
    /// currently running; cancel or shut it down first.
    pub fn remove_timer(&self, id: &str) -> Result<(), TimerError> {
        let mut timers = self.timers.lock();
        let timer = timers.get(id).ok_or_else(|| TimerError::NotFound {
            id: id.to_string(),
        })?;
        if timer.info().state == TimerState::Running {
            return Err(TimerError::InUse { id: id.to_string() });
        }
        timers.remove(id);
        tracing::debug!(id, "timer removed from registry");
        Ok(())
    }

    /// Snapshot every registered timer. The returned map is independent of
    /// the registry and of the live timers.
    pub fn get_all_timers(&self) -> HashMap<String, TimerInfo> {
        self.timers
            .lock()
            .iter()
            .map(|(id, timer)| (id.clone(), timer.info()))
            .collect()
    }
}

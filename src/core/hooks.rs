//! Observer hooks for machine lifecycle events.
//!
//! Hooks are invoked synchronously from within the machine's critical
//! section: implementations must not block indefinitely or call back into
//! the same machine.

use crate::core::error::HsmError;
use std::sync::Arc;

/// Observer callbacks for state entry, exit, and machine errors.
///
/// All methods have default no-op bodies, so observers only implement what
/// they care about.
pub trait Hook: Send + Sync {
    /// Invoked after a state is entered (including the initial state at
    /// `start`).
    fn on_enter(&self, _state_id: &str) {}

    /// Invoked before a state is exited (including the current state at
    /// `stop`).
    fn on_exit(&self, _state_id: &str) {}

    /// Invoked when event processing fails mid-transition or a guard
    /// evaluation blows up.
    fn on_error(&self, _error: &HsmError) {}
}

/// Fan-out dispatcher over registered hooks.
#[derive(Clone, Default)]
pub struct HookManager {
    hooks: Vec<Arc<dyn Hook>>,
}

impl HookManager {
    pub fn new(hooks: Vec<Arc<dyn Hook>>) -> Self {
        Self { hooks }
    }

    /// Register another observer.
    pub fn register(&mut self, hook: Arc<dyn Hook>) {
        self.hooks.push(hook);
    }

    pub fn execute_on_enter(&self, state_id: &str) {
        for hook in &self.hooks {
            hook.on_enter(state_id);
        }
    }

    pub fn execute_on_exit(&self, state_id: &str) {
        for hook in &self.hooks {
            hook.on_exit(state_id);
        }
    }

    pub fn execute_on_error(&self, error: &HsmError) {
        for hook in &self.hooks {
            hook.on_error(error);
        }
    }
}

/// Observer that logs lifecycle events through `tracing`.
///
/// The core never installs a global subscriber; attach this hook explicitly
/// where log output is wanted.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingHook;

impl Hook for TracingHook {
    fn on_enter(&self, state_id: &str) {
        tracing::debug!(state = state_id, "state entered");
    }

    fn on_exit(&self, state_id: &str) {
        tracing::debug!(state = state_id, "state exited");
    }

    fn on_error(&self, error: &HsmError) {
        tracing::warn!(%error, "machine error");
    }
}

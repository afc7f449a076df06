//! Core state machine types.
//!
//! This module contains the building blocks shared by both execution models:
//! events, states and their data, guard capabilities, transitions, observer
//! hooks, the transition audit history, and the error taxonomy.

mod error;
mod event;
mod guard;
mod history;
mod hooks;
mod state;
mod transition;

pub use error::{DynError, GuardError, HookPhase, HsmError};
pub use event::Event;
pub use guard::{
    AsyncCondition, AsyncConditionGuard, AsyncGuard, Condition, ConditionGuard, Guard,
    GuardFuture, KeyExistsGuard, NoOpGuard,
};
pub use history::{TransitionHistory, TransitionRecord};
pub use hooks::{Hook, HookManager, TracingHook};
pub use state::{State, StateBehavior, StateData};
pub use transition::{Transition, TransitionAction, TransitionGuard};

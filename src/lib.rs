//! Hsm: a hierarchical state machine runtime
//!
//! Machines are assembled from named states, prioritized guarded transitions,
//! and lifecycle hooks, then driven by events in one of two execution models:
//! a thread-based engine and a tokio-based engine with identical observable
//! semantics. A timer subsystem provides deadline-armed callbacks in the same
//! two models, plus a thread-safe registry of named timers.
//!
//! # Core Concepts
//!
//! - **Event**: immutable trigger with an id, payload, and priority
//! - **State**: named node with optional enter/exit behaviors
//! - **Guard**: predicate capability controlling whether a transition fires
//! - **Transition**: source/target pair with guards, actions, and priority
//! - **Hooks**: observers notified on entry, exit, and error
//!
//! # Example
//!
//! ```rust
//! use hsm::core::{Event, State, Transition};
//! use hsm::machine::StateMachine;
//!
//! let machine = StateMachine::new(State::new("idle"));
//! machine.add_state(State::new("active"));
//! machine.add_transition(Transition::new("idle", "active"));
//!
//! machine.start().unwrap();
//! machine.process_event(&Event::new("activate"));
//! assert_eq!(machine.current_state(), "active");
//! ```

pub mod core;
pub mod machine;
pub mod timer;
pub mod validation;

// Re-export commonly used types
pub use crate::core::{Event, Guard, HsmError, State, Transition};
pub use machine::{AsyncStateMachine, StateMachine};
pub use timer::{Timer, TimerManager};

//! State machine execution engines.
//!
//! Two variants share one transition-selection core: the thread-based
//! [`StateMachine`] and the tokio-based [`AsyncStateMachine`]. Their
//! observable semantics are identical; they differ only in how exclusive
//! access and deferred work are expressed.

mod blocking;
mod cooperative;
mod core;

pub use blocking::{EventProcessingLoop, EventQueue, StateMachine};
pub use cooperative::{AsyncEventProcessingLoop, AsyncEventQueue, AsyncStateMachine};
pub use self::core::MachineCore;

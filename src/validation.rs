//! Machine well-formedness validation.
//!
//! A validator is consulted exactly once, at `start()`; a failure prevents
//! the machine from starting. Violations are accumulated rather than
//! reported one at a time, so a misconfigured machine surfaces every problem
//! in a single pass.

use crate::machine::MachineCore;
use thiserror::Error;

/// A single well-formedness violation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("current state '{0}' is not registered")]
    UnknownCurrent(String),

    #[error("transition references unknown source state '{0}'")]
    UnknownSource(String),

    #[error("transition references unknown target state '{0}'")]
    UnknownTarget(String),
}

/// Validation failure carrying every accumulated violation.
#[derive(Debug, Error)]
#[error("machine validation failed with {} violation(s)", violations.len())]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

/// Capability consulted at machine start.
pub trait Validator: Send + Sync {
    fn validate(&self, machine: &MachineCore) -> Result<(), ValidationError>;
}

/// Default validator: every transition endpoint and the current state must
/// reference a registered state.
#[derive(Clone, Copy, Debug, Default)]
pub struct StructuralValidator;

impl Validator for StructuralValidator {
    fn validate(&self, machine: &MachineCore) -> Result<(), ValidationError> {
        let mut violations = Vec::new();

        let current = machine.current_state_id();
        if !machine.states().contains_key(current) {
            violations.push(Violation::UnknownCurrent(current.to_string()));
        }
        for transition in machine.transitions() {
            if !machine.states().contains_key(transition.source()) {
                violations.push(Violation::UnknownSource(transition.source().to_string()));
            }
            if !machine.states().contains_key(transition.target()) {
                violations.push(Violation::UnknownTarget(transition.target().to_string()));
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { violations })
        }
    }
}

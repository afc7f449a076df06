//! Execution-model-agnostic machine state.
//!
//! `MachineCore` holds everything both state machine variants share: the
//! registered states, the transition table, the current-state cursor, the
//! mutable state data, the observer hooks, and the audit history. The
//! blocking and cooperative machines differ only in how they serialize access
//! to it.

use crate::core::{
    Event, GuardError, HookManager, HookPhase, HsmError, State, StateData, Transition,
    TransitionGuard, TransitionHistory, TransitionRecord,
};
use std::collections::HashMap;

/// Outcome of transition selection for one event.
#[derive(Default)]
pub(crate) struct Selection {
    /// Index of the chosen transition, if any matched.
    pub chosen: Option<usize>,
    /// Guard evaluation failures encountered along the way. These count as
    /// "did not pass" but are additionally reported through the error
    /// channel.
    pub guard_errors: Vec<GuardError>,
}

/// Shared state of a machine instance.
///
/// Mutated only while the owning machine holds its exclusive section.
pub struct MachineCore {
    states: HashMap<String, State>,
    transitions: Vec<Transition>,
    current: String,
    data: StateData,
    hooks: HookManager,
    history: TransitionHistory,
}

impl MachineCore {
    pub(crate) fn new(initial: State) -> Self {
        let current = initial.id().to_string();
        let mut states = HashMap::new();
        states.insert(current.clone(), initial);
        Self {
            states,
            transitions: Vec::new(),
            current,
            data: StateData::new(),
            hooks: HookManager::default(),
            history: TransitionHistory::new(),
        }
    }

    pub(crate) fn add_state(&mut self, state: State) {
        self.states.insert(state.id().to_string(), state);
    }

    pub(crate) fn add_transition(&mut self, transition: Transition) {
        self.transitions.push(transition);
    }

    pub(crate) fn hooks(&self) -> &HookManager {
        &self.hooks
    }

    pub(crate) fn hooks_mut(&mut self) -> &mut HookManager {
        &mut self.hooks
    }

    pub(crate) fn data(&self) -> &StateData {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut StateData {
        &mut self.data
    }

    pub(crate) fn history(&self) -> &TransitionHistory {
        &self.history
    }

    /// The registered states, keyed by id.
    pub fn states(&self) -> &HashMap<String, State> {
        &self.states
    }

    /// The transition table, in registration order.
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Id of the current state.
    pub fn current_state_id(&self) -> &str {
        &self.current
    }

    fn consider(chosen: &mut Option<(usize, i32)>, idx: usize, priority: i32) {
        let better = match chosen {
            None => true,
            // Strictly greater wins, so ties keep the earliest registration.
            Some((_, best)) => priority > *best,
        };
        if better {
            *chosen = Some((idx, priority));
        }
    }

    /// Select at most one transition for `event` using blocking guard
    /// evaluation. An async guard reached here is a classified evaluation
    /// failure.
    pub(crate) fn select(&self, event: &Event) -> Selection {
        let mut chosen = None;
        let mut guard_errors = Vec::new();

        for (idx, transition) in self.transitions.iter().enumerate() {
            if transition.source() != self.current {
                continue;
            }
            let mut passed = true;
            for guard in transition.guards() {
                match guard {
                    TransitionGuard::Sync(g) => match g.evaluate(event, &self.data) {
                        Ok(true) => {}
                        Ok(false) => {
                            passed = false;
                            break;
                        }
                        Err(e) => {
                            guard_errors.push(e);
                            passed = false;
                            break;
                        }
                    },
                    TransitionGuard::Async(g) => {
                        guard_errors.push(GuardError::new(
                            g.name(),
                            event.id(),
                            self.data.clone(),
                            "async guard cannot be evaluated by the blocking state machine",
                        ));
                        passed = false;
                        break;
                    }
                }
            }
            if passed {
                Self::consider(&mut chosen, idx, transition.priority());
            }
        }

        Selection {
            chosen: chosen.map(|(idx, _)| idx),
            guard_errors,
        }
    }

    /// Select at most one transition for `event`, awaiting async guards.
    pub(crate) async fn select_async(&self, event: &Event) -> Selection {
        let mut chosen = None;
        let mut guard_errors = Vec::new();

        for (idx, transition) in self.transitions.iter().enumerate() {
            if transition.source() != self.current {
                continue;
            }
            let mut passed = true;
            for guard in transition.guards() {
                let result = match guard {
                    TransitionGuard::Sync(g) => g.evaluate(event, &self.data),
                    TransitionGuard::Async(g) => g.evaluate(event, &self.data).await,
                };
                match result {
                    Ok(true) => {}
                    Ok(false) => {
                        passed = false;
                        break;
                    }
                    Err(e) => {
                        guard_errors.push(e);
                        passed = false;
                        break;
                    }
                }
            }
            if passed {
                Self::consider(&mut chosen, idx, transition.priority());
            }
        }

        Selection {
            chosen: chosen.map(|(idx, _)| idx),
            guard_errors,
        }
    }

    /// Apply the chosen transition. The current-state cursor moves only
    /// after exit behavior and actions have succeeded; a failure before that
    /// point leaves the cursor where it was.
    pub(crate) fn apply(&mut self, idx: usize, event: &Event) -> Result<(), HsmError> {
        let transition = self.transitions[idx].clone();
        let from = self.current.clone();

        self.hooks.execute_on_exit(&from);
        if let Some(state) = self.states.get(&from).cloned() {
            state
                .run_exit(&mut self.data)
                .map_err(|source| HsmError::StateBehavior {
                    state: from.clone(),
                    phase: HookPhase::Exit,
                    source,
                })?;
        }

        for action in transition.actions() {
            action(event, &mut self.data).map_err(|source| HsmError::Action {
                event_id: event.id().to_string(),
                source,
            })?;
        }

        self.current = transition.target().to_string();
        self.history = self
            .history
            .record(TransitionRecord::new(&from, &self.current, event.id()));
        tracing::debug!(
            from = %from,
            to = %self.current,
            event = event.id(),
            "transition applied"
        );

        if let Some(state) = self.states.get(&self.current).cloned() {
            state
                .run_enter(&mut self.data)
                .map_err(|source| HsmError::StateBehavior {
                    state: self.current.clone(),
                    phase: HookPhase::Enter,
                    source,
                })?;
        }
        let entered = self.current.clone();
        self.hooks.execute_on_enter(&entered);
        Ok(())
    }
}

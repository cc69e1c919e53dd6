use tracing::debug;

use super::{
    errors::{StateMachineError, StateMachineResult},
    events::RunEvent,
    states::RunState,
};

/// A recorded transition, kept for the run's diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTransition {
    pub from: RunState,
    pub to: RunState,
    pub event: &'static str,
}

/// Run lifecycle state machine.
///
/// Lives for exactly one consumer run; it is never persisted.
#[derive(Debug, Default)]
pub struct RunStateMachine {
    state: RunState,
    history: Vec<RunTransition>,
}

impl RunStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_state(&self) -> RunState {
        self.state
    }

    pub fn history(&self) -> &[RunTransition] {
        &self.history
    }

    /// Attempt to transition the run state
    pub fn transition(&mut self, event: RunEvent) -> StateMachineResult<RunState> {
        let target_state = Self::determine_target_state(self.state, &event)?;

        debug!(
            from_state = %self.state,
            to_state = %target_state,
            event = event.event_type(),
            "Run state transition"
        );

        self.history.push(RunTransition {
            from: self.state,
            to: target_state,
            event: event.event_type(),
        });
        self.state = target_state;

        Ok(target_state)
    }

    /// Move to `Failed` from any active state; a no-op once terminal
    pub fn fail(&mut self, reason: impl Into<String>) -> RunState {
        if self.state.is_active() {
            // active states always accept Fail
            let _ = self.transition(RunEvent::fail_with_error(reason));
        }
        self.state
    }

    /// Determine the target state based on current state and event
    fn determine_target_state(current_state: RunState, event: &RunEvent) -> StateMachineResult<RunState> {
        if current_state.is_terminal() {
            return Err(StateMachineError::AlreadyTerminal {
                state: current_state.to_string(),
            });
        }

        let target = match (current_state, event) {
            (RunState::Idle, RunEvent::Start) => RunState::Enumerating,

            (RunState::Enumerating, RunEvent::PartitionsListed) => RunState::Consuming,
            (RunState::Enumerating, RunEvent::NoPartitions) => RunState::Done,

            (RunState::Consuming, RunEvent::RecordsCollected) => RunState::Checkpointing,
            (RunState::Consuming, RunEvent::NothingToCommit) => RunState::Done,

            (RunState::Checkpointing, RunEvent::Committed) => RunState::Done,

            (state, RunEvent::Fail(_)) if state.is_active() => RunState::Failed,

            (from_state, _) => {
                return Err(StateMachineError::invalid_transition(
                    from_state,
                    event.event_type(),
                ))
            }
        };

        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_productive_run_path() {
        let mut sm = RunStateMachine::new();
        assert_eq!(sm.transition(RunEvent::Start).unwrap(), RunState::Enumerating);
        assert_eq!(
            sm.transition(RunEvent::PartitionsListed).unwrap(),
            RunState::Consuming
        );
        assert_eq!(
            sm.transition(RunEvent::RecordsCollected).unwrap(),
            RunState::Checkpointing
        );
        assert_eq!(sm.transition(RunEvent::Committed).unwrap(), RunState::Done);
        assert_eq!(sm.history().len(), 4);
    }

    #[test]
    fn test_empty_runs_skip_checkpointing() {
        let mut sm = RunStateMachine::new();
        sm.transition(RunEvent::Start).unwrap();
        assert_eq!(sm.transition(RunEvent::NoPartitions).unwrap(), RunState::Done);

        let mut sm = RunStateMachine::new();
        sm.transition(RunEvent::Start).unwrap();
        sm.transition(RunEvent::PartitionsListed).unwrap();
        assert_eq!(
            sm.transition(RunEvent::NothingToCommit).unwrap(),
            RunState::Done
        );
    }

    #[test]
    fn test_invalid_transitions() {
        let mut sm = RunStateMachine::new();

        // cannot commit before consuming
        assert!(sm.transition(RunEvent::Committed).is_err());

        sm.transition(RunEvent::Start).unwrap();
        assert!(sm.transition(RunEvent::RecordsCollected).is_err());
        assert_eq!(sm.current_state(), RunState::Enumerating);
    }

    #[test]
    fn test_fail_from_active_state_only() {
        let mut sm = RunStateMachine::new();
        // idle is not active; fail is a no-op
        assert_eq!(sm.fail("boom"), RunState::Idle);

        sm.transition(RunEvent::Start).unwrap();
        assert_eq!(sm.fail("enumeration failed"), RunState::Failed);

        let err = sm.transition(RunEvent::Start).unwrap_err();
        assert!(matches!(err, StateMachineError::AlreadyTerminal { .. }));
    }
}

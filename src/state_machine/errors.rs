use thiserror::Error;

/// Errors raised by the run and partition state machines
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateMachineError {
    #[error("Invalid state transition from {from} on event {event}")]
    InvalidTransition { from: String, event: String },

    #[error("State machine already finished in state {state}")]
    AlreadyTerminal { state: String },
}

impl StateMachineError {
    pub fn invalid_transition(from: impl ToString, event: impl Into<String>) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            event: event.into(),
        }
    }
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;

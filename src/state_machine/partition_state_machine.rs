use super::{
    errors::{StateMachineError, StateMachineResult},
    events::PartitionEvent,
    states::PartitionState,
};

/// Per-partition state machine, one instance per partition per run
#[derive(Debug, Clone)]
pub struct PartitionStateMachine {
    partition_id: String,
    state: PartitionState,
    pages_fetched: usize,
    abort_reason: Option<String>,
}

impl PartitionStateMachine {
    pub fn new(partition_id: impl Into<String>) -> Self {
        Self {
            partition_id: partition_id.into(),
            state: PartitionState::default(),
            pages_fetched: 0,
            abort_reason: None,
        }
    }

    pub fn partition_id(&self) -> &str {
        &self.partition_id
    }

    pub fn current_state(&self) -> PartitionState {
        self.state
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    pub fn abort_reason(&self) -> Option<&str> {
        self.abort_reason.as_deref()
    }

    pub fn transition(&mut self, event: PartitionEvent) -> StateMachineResult<PartitionState> {
        if self.state.is_terminal() {
            return Err(StateMachineError::AlreadyTerminal {
                state: self.state.to_string(),
            });
        }

        let target = match (self.state, &event) {
            (PartitionState::ResolveCursor, PartitionEvent::CursorResolved) => {
                PartitionState::Fetching
            }
            (PartitionState::Fetching, PartitionEvent::PageFetched) => {
                self.pages_fetched += 1;
                PartitionState::Fetching
            }
            (PartitionState::Fetching, PartitionEvent::Drained) => PartitionState::Exhausted,
            (_, PartitionEvent::Abort(reason)) => {
                self.abort_reason = Some(reason.clone());
                PartitionState::Aborted
            }
            (from_state, _) => {
                return Err(StateMachineError::invalid_transition(
                    from_state,
                    event.event_type(),
                ))
            }
        };

        self.state = target;
        Ok(target)
    }
}

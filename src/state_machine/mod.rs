// State machines for one consumer run
//
// A run moves Idle -> Enumerating -> Consuming -> Checkpointing -> Done, and each
// partition inside Consuming moves ResolveCursor -> Fetching -> Exhausted | Aborted.
// The coordinator drives both machines so an illegal ordering (for example
// committing a checkpoint before consumption finished) surfaces as an error
// instead of silently mutating persisted state.

pub mod errors;
pub mod events;
pub mod partition_state_machine;
pub mod run_state_machine;
pub mod states;

pub use errors::{StateMachineError, StateMachineResult};
pub use events::{PartitionEvent, RunEvent};
pub use partition_state_machine::PartitionStateMachine;
pub use run_state_machine::RunStateMachine;
pub use states::{PartitionState, RunState};

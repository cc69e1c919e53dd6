//! # Consumer
//!
//! The checkpointed multi-partition consumer: one [`ConsumerCoordinator::consume`]
//! call is one run over every partition of a stream.

pub mod coordinator;

pub use coordinator::{ConsumedBatch, ConsumerCoordinator, PartitionOutcome};

//! # Data Model
//!
//! Value types that flow through one invocation: partitions and raw records from
//! the stream, the persisted checkpoint, the two output row shapes, and the
//! structured run result.

pub mod checkpoint;
pub mod rows;
pub mod run_result;
pub mod stream;

pub use checkpoint::{Checkpoint, CheckpointKey};
pub use rows::{CreatorRow, OrderRow};
pub use run_result::{RunFailure, RunResult, RunSummary};
pub use stream::{RawRecord, ReadCursor, StreamPartition};

//! # Consumer Coordinator
//!
//! Drives one run: enumerate partitions, load the checkpoint, drain every
//! partition from its resume marker, then commit the advanced checkpoint.
//!
//! ## Commit policy
//!
//! - The checkpoint is loaded once, after enumeration, and saved at most once,
//!   after every partition has finished.
//! - A run that fetched nothing never writes the checkpoint.
//! - Partition fetch errors are isolated: the partition is abandoned for the
//!   run, the records it already produced are kept and count towards its
//!   advanced marker.
//! - Enumeration and checkpoint store failures fail the run and leave the
//!   stored checkpoint untouched.
//!
//! Records are handed to the caller after the commit. A crash before the
//! commit re-delivers the whole run; a downstream failure after it does not
//! rewind the checkpoint.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::checkpoint::CheckpointStore;
use crate::config::ConsumerConfig;
use crate::error::{IngestError, IngestResult};
use crate::logging::log_partition_operation;
use crate::models::{Checkpoint, CheckpointKey, RawRecord, ReadCursor};
use crate::state_machine::{
    PartitionEvent, PartitionState, PartitionStateMachine, RunEvent, RunState, RunStateMachine,
};
use crate::stream::{PartitionEnumerator, PartitionReader, StreamClient};

/// How one partition fared in a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionOutcome {
    pub partition_id: String,
    pub state: PartitionState,
    pub resumed_from: Option<String>,
    pub last_sequence_marker: Option<String>,
    pub record_count: usize,
    pub pages_fetched: usize,
    pub fell_back_to_trim_horizon: bool,
    pub abort_reason: Option<String>,
}

impl PartitionOutcome {
    pub fn is_aborted(&self) -> bool {
        self.state == PartitionState::Aborted
    }
}

/// Everything a run consumed
#[derive(Debug, Clone, Default)]
pub struct ConsumedBatch {
    /// Partition-major, arrival order within each partition
    pub records: Vec<RawRecord>,
    /// One entry per enumerated partition, in enumeration order
    pub partitions: Vec<PartitionOutcome>,
    /// The committed checkpoint, `None` when nothing was committed
    pub checkpoint: Option<Checkpoint>,
}

impl ConsumedBatch {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn aborted_partitions(&self) -> usize {
        self.partitions.iter().filter(|p| p.is_aborted()).count()
    }
}

pub struct ConsumerCoordinator {
    client: Arc<dyn StreamClient>,
    enumerator: PartitionEnumerator,
    checkpoints: Arc<dyn CheckpointStore>,
    config: ConsumerConfig,
}

impl ConsumerCoordinator {
    pub fn new(
        client: Arc<dyn StreamClient>,
        checkpoints: Arc<dyn CheckpointStore>,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            enumerator: PartitionEnumerator::new(Arc::clone(&client)),
            client,
            checkpoints,
            config,
        }
    }

    /// Run the consumer once over `stream_name`
    #[instrument(skip(self), fields(key = %key))]
    pub async fn consume(&self, stream_name: &str, key: &CheckpointKey) -> IngestResult<ConsumedBatch> {
        let mut run = RunStateMachine::new();
        run.transition(RunEvent::Start)?;
        let deadline = Instant::now() + self.config.run_budget();

        let partitions = match self.enumerator.list(stream_name).await {
            Ok(partitions) => partitions,
            Err(e) => {
                run.fail(e.to_string());
                return Err(e);
            }
        };

        if partitions.is_empty() {
            run.transition(RunEvent::NoPartitions)?;
            info!(stream = %stream_name, "Stream has no partitions, nothing to consume");
            return Ok(ConsumedBatch::default());
        }
        run.transition(RunEvent::PartitionsListed)?;

        let previous = match self.checkpoints.load(key).await {
            Ok(checkpoint) => checkpoint.unwrap_or_default(),
            Err(e) => {
                let err = IngestError::from(e);
                run.fail(err.to_string());
                return Err(err);
            }
        };

        let reader = PartitionReader::new(Arc::clone(&self.client), stream_name, self.config.page_limit)
            .with_deadline(deadline);

        let drains = partitions.iter().map(|partition| {
            let resume_from = previous
                .resume_marker(&partition.partition_id)
                .map(str::to_string);
            drain_partition(&reader, &partition.partition_id, resume_from, deadline)
        });
        let results: Vec<IngestResult<(PartitionOutcome, Vec<RawRecord>)>> = stream::iter(drains)
            .buffered(self.config.max_concurrent_partitions.max(1))
            .collect()
            .await;

        let mut batch = ConsumedBatch::default();
        let mut cursors = Vec::new();
        for result in results {
            let (outcome, records) = match result {
                Ok(drained) => drained,
                Err(e) => {
                    run.fail(e.to_string());
                    return Err(e);
                }
            };
            if let Some(marker) = &outcome.last_sequence_marker {
                cursors.push(ReadCursor::new(&outcome.partition_id, marker));
            }
            batch.records.extend(records);
            batch.partitions.push(outcome);
        }

        let Some(mut next) = previous.advanced(&cursors, Utc::now()) else {
            run.transition(RunEvent::NothingToCommit)?;
            info!(
                stream = %stream_name,
                partitions = batch.partitions.len(),
                aborted = batch.aborted_partitions(),
                "No new records, checkpoint left untouched"
            );
            return Ok(batch);
        };

        let pruned = next.prune_unlisted(&partitions);
        if pruned > 0 {
            debug!(pruned, "Dropped checkpoint entries for partitions no longer listed");
        }

        run.transition(RunEvent::RecordsCollected)?;
        if let Err(e) = self.checkpoints.save(key, &next).await {
            let err = IngestError::from(e);
            run.fail(err.to_string());
            return Err(err);
        }
        run.transition(RunEvent::Committed)?;
        debug_assert_eq!(run.current_state(), RunState::Done);

        info!(
            stream = %stream_name,
            records = batch.records.len(),
            partitions = batch.partitions.len(),
            aborted = batch.aborted_partitions(),
            last_partition_id = ?next.last_partition_id,
            last_sequence_marker = ?next.last_sequence_marker,
            "Run consumed records and committed checkpoint"
        );
        batch.checkpoint = Some(next);
        Ok(batch)
    }
}

/// Drain one partition into memory.
///
/// Only state-machine violations are returned as errors; fetch failures end
/// the partition as `Aborted` with what it had accumulated.
async fn drain_partition(
    reader: &PartitionReader,
    partition_id: &str,
    resume_from: Option<String>,
    deadline: Instant,
) -> IngestResult<(PartitionOutcome, Vec<RawRecord>)> {
    let mut machine = PartitionStateMachine::new(partition_id);
    let mut records: Vec<RawRecord> = Vec::new();
    let mut fell_back = false;

    if Instant::now() >= deadline {
        machine.transition(PartitionEvent::Abort(
            "run budget exhausted before partition started".to_string(),
        ))?;
        warn!(partition_id = %partition_id, "Run budget exhausted, partition skipped this run");
    } else {
        machine.transition(PartitionEvent::CursorResolved)?;
        log_partition_operation(
            "open",
            partition_id,
            resume_from.as_deref(),
            "fetching",
            Some(if resume_from.is_some() { "resume" } else { "cold start" }),
        );

        let mut pages = reader.open(partition_id, resume_from.clone());
        loop {
            match pages.next_page().await {
                Some(Ok(page)) => {
                    machine.transition(PartitionEvent::PageFetched)?;
                    debug!(
                        partition_id = %partition_id,
                        page_records = page.len(),
                        accumulated = records.len() + page.len(),
                        "Fetched page"
                    );
                    records.extend(page);
                }
                Some(Err(e)) => {
                    warn!(
                        partition_id = %partition_id,
                        error = %e,
                        kept_records = records.len(),
                        "Partition fetch failed, abandoning partition for this run"
                    );
                    machine.transition(PartitionEvent::Abort(e.to_string()))?;
                    break;
                }
                None => {
                    machine.transition(PartitionEvent::Drained)?;
                    break;
                }
            }
        }
        fell_back = pages.fell_back_to_trim_horizon();
    }

    let last_sequence_marker = records.last().map(|r| r.sequence_marker.clone());
    log_partition_operation(
        "close",
        partition_id,
        last_sequence_marker.as_deref(),
        &machine.current_state().to_string(),
        machine.abort_reason(),
    );

    let outcome = PartitionOutcome {
        partition_id: partition_id.to_string(),
        state: machine.current_state(),
        resumed_from: resume_from,
        last_sequence_marker,
        record_count: records.len(),
        pages_fetched: machine.pages_fetched(),
        fell_back_to_trim_horizon: fell_back,
        abort_reason: machine.abort_reason().map(str::to_string),
    };
    Ok((outcome, records))
}

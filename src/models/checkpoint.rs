//! # Checkpoint Model
//!
//! Persisted read progress for one stream. The document keeps the two fields the
//! worker has always written (`last_shard_id` / `last_shard_sequence`, the
//! globally-last record of the last productive run) and adds a per-partition map
//! so every partition resumes from its own marker.
//!
//! Documents written before the map existed still resolve: the single cursor is
//! used for the partition it names, and is folded into the map the next time the
//! checkpoint advances.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::stream::{ReadCursor, StreamPartition};

/// Well-known key a checkpoint document is stored under
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckpointKey(String);

impl CheckpointKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CheckpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persisted progress for a stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Partition of the globally-last record consumed
    #[serde(
        rename = "last_shard_id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub last_partition_id: Option<String>,

    /// Sequence marker of the globally-last record consumed
    #[serde(
        rename = "last_shard_sequence",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub last_sequence_marker: Option<String>,

    /// Last consumed marker per partition
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub partitions: BTreeMap<String, String>,

    #[serde(
        rename = "checkpoint_updated_at",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Checkpoint {
    /// True when no position has ever been recorded
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty() && self.last_cursor().is_none()
    }

    /// The globally-last cursor, when both fields are present and non-empty
    pub fn last_cursor(&self) -> Option<ReadCursor> {
        match (&self.last_partition_id, &self.last_sequence_marker) {
            (Some(partition_id), Some(marker)) if !partition_id.is_empty() && !marker.is_empty() => {
                Some(ReadCursor::new(partition_id, marker))
            }
            _ => None,
        }
    }

    /// Marker to resume `partition_id` after, or `None` for a cold start
    pub fn resume_marker(&self, partition_id: &str) -> Option<&str> {
        if let Some(marker) = self.partitions.get(partition_id) {
            return Some(marker.as_str());
        }

        match (&self.last_partition_id, &self.last_sequence_marker) {
            (Some(last_partition), Some(marker))
                if last_partition == partition_id && !marker.is_empty() =>
            {
                Some(marker.as_str())
            }
            _ => None,
        }
    }

    /// Build the checkpoint that follows this one after a run.
    ///
    /// `cursors` holds the last cursor of every partition that yielded records,
    /// in enumeration order; the final entry becomes the globally-last cursor.
    /// Returns `None` when the run yielded nothing, in which case the stored
    /// checkpoint must stay untouched.
    pub fn advanced(&self, cursors: &[ReadCursor], now: DateTime<Utc>) -> Option<Checkpoint> {
        let last = cursors.last()?;

        let mut partitions = self.partitions.clone();
        if let Some(legacy) = self.last_cursor() {
            partitions
                .entry(legacy.partition_id)
                .or_insert(legacy.sequence_marker);
        }
        for cursor in cursors {
            partitions.insert(cursor.partition_id.clone(), cursor.sequence_marker.clone());
        }

        Some(Checkpoint {
            last_partition_id: Some(last.partition_id.clone()),
            last_sequence_marker: Some(last.sequence_marker.clone()),
            partitions,
            updated_at: Some(now),
        })
    }

    /// Drop map entries for partitions missing from `listed`, returning how
    /// many were removed. Partitions leave the listing only once their records
    /// have aged out of the stream, so their markers can never be used again.
    pub fn prune_unlisted(&mut self, listed: &[StreamPartition]) -> usize {
        let before = self.partitions.len();
        self.partitions
            .retain(|partition_id, _| listed.iter().any(|p| &p.partition_id == partition_id));
        before - self.partitions.len()
    }
}

//! Stream-side value types.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One partition (shard) of a named stream, enumerated fresh every run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamPartition {
    pub partition_id: String,
}

impl StreamPartition {
    pub fn new(partition_id: impl Into<String>) -> Self {
        Self {
            partition_id: partition_id.into(),
        }
    }
}

impl fmt::Display for StreamPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.partition_id)
    }
}

/// Last successfully observed position in a partition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReadCursor {
    pub partition_id: String,
    pub sequence_marker: String,
}

impl ReadCursor {
    pub fn new(partition_id: impl Into<String>, sequence_marker: impl Into<String>) -> Self {
        Self {
            partition_id: partition_id.into(),
            sequence_marker: sequence_marker.into(),
        }
    }
}

/// A record as fetched from a partition.
///
/// The payload is kept as opaque bytes; decoding is the transformer's job so a
/// malformed payload never affects fetching or checkpointing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub partition_id: String,
    pub sequence_marker: String,
    pub payload: Bytes,
    pub partition_key: Option<String>,
    pub arrival_timestamp: Option<DateTime<Utc>>,
}

impl RawRecord {
    pub fn new(
        partition_id: impl Into<String>,
        sequence_marker: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            partition_id: partition_id.into(),
            sequence_marker: sequence_marker.into(),
            payload: payload.into(),
            partition_key: None,
            arrival_timestamp: None,
        }
    }

    pub fn with_partition_key(mut self, partition_key: impl Into<String>) -> Self {
        self.partition_key = Some(partition_key.into());
        self
    }

    pub fn with_arrival_timestamp(mut self, arrival: DateTime<Utc>) -> Self {
        self.arrival_timestamp = Some(arrival);
        self
    }

    /// Cursor pointing at this record
    pub fn cursor(&self) -> ReadCursor {
        ReadCursor::new(&self.partition_id, &self.sequence_marker)
    }
}

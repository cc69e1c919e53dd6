//! # Stream Access
//!
//! Page-level access to a partitioned, append-only stream (shards, sequence
//! numbers and shard iterators in Kinesis terms).
//!
//! [`StreamClient`] is the seam every backend implements; the rest of the
//! crate only sees partitions, start positions and pages:
//!
//! - [`PartitionEnumerator`] lists the partitions of a stream.
//! - [`PartitionReader`] turns a partition plus an optional resume marker into a
//!   lazy, finite sequence of pages.
//! - [`StreamWriter`] is the publishing side, used to load exported documents
//!   onto the stream.

pub mod enumerator;
pub mod local;
pub mod memory;
pub mod reader;

#[cfg(feature = "aws")]
pub mod kinesis;

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use thiserror::Error;

use crate::constants::iterator_types;
use crate::models::{RawRecord, StreamPartition};

pub use enumerator::PartitionEnumerator;
pub use local::LocalStreamClient;
pub use memory::InMemoryStream;
pub use reader::{PartitionPages, PartitionReader};

#[cfg(feature = "aws")]
pub use kinesis::KinesisStreamClient;

/// Where reading of a partition begins
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartPosition {
    /// Oldest record still retained
    TrimHorizon,
    /// Strictly after the given sequence marker
    AfterSequence(String),
}

impl StartPosition {
    /// Resume after `marker`, or cold-start when there is none
    pub fn from_marker(marker: Option<&str>) -> Self {
        match marker {
            Some(marker) => Self::AfterSequence(marker.to_string()),
            None => Self::TrimHorizon,
        }
    }

    pub fn iterator_type(&self) -> &'static str {
        match self {
            Self::TrimHorizon => iterator_types::TRIM_HORIZON,
            Self::AfterSequence(_) => iterator_types::AFTER_SEQUENCE_NUMBER,
        }
    }
}

impl fmt::Display for StartPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TrimHorizon => f.write_str(iterator_types::TRIM_HORIZON),
            Self::AfterSequence(marker) => {
                write!(f, "{} {marker}", iterator_types::AFTER_SEQUENCE_NUMBER)
            }
        }
    }
}

/// One page of the partition listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionListing {
    pub partitions: Vec<StreamPartition>,
    pub next_token: Option<String>,
}

/// One page of records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPage {
    pub records: Vec<RawRecord>,
    /// `None` once the partition is closed and fully read
    pub next_iterator: Option<String>,
    pub millis_behind_latest: Option<i64>,
}

/// A record to put onto the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRecord {
    pub partition_key: String,
    pub data: Bytes,
}

impl PublishRecord {
    pub fn new(partition_key: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            partition_key: partition_key.into(),
            data: data.into(),
        }
    }

    /// Bytes counted against the put-batch size limit
    pub fn size(&self) -> usize {
        self.data.len() + self.partition_key.len()
    }
}

/// Result of one batch put
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PutOutcome {
    pub accepted: usize,
    pub failed: usize,
}

/// Errors raised by stream backends
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("Stream {stream} not found")]
    StreamNotFound { stream: String },

    #[error("Invalid position for partition {partition_id}: {message}")]
    PositionInvalid {
        partition_id: String,
        message: String,
    },

    #[error("Request throttled: {message}")]
    Throttled { message: String },

    #[error("Iterator expired for partition {partition_id}")]
    IteratorExpired { partition_id: String },

    #[error("Run deadline reached")]
    DeadlineExceeded,

    #[error("Stream transport error: {message}")]
    Transport { message: String },

    #[error("Request rejected: {message}")]
    Rejected { message: String },
}

impl StreamError {
    pub fn position_invalid(partition_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PositionInvalid {
            partition_id: partition_id.into(),
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    pub fn is_position_invalid(&self) -> bool {
        matches!(self, Self::PositionInvalid { .. })
    }

    /// Errors the next run can be expected to get past on its own
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Throttled { .. }
                | Self::IteratorExpired { .. }
                | Self::DeadlineExceeded
                | Self::Transport { .. }
        )
    }
}

/// Page-level read access to a partitioned stream
#[async_trait]
pub trait StreamClient: Send + Sync {
    /// One page of the partition listing, continuing from `next_token`
    async fn list_partitions(
        &self,
        stream_name: &str,
        next_token: Option<&str>,
    ) -> Result<PartitionListing, StreamError>;

    /// Obtain an iterator for reading `partition_id` from `position`
    async fn partition_iterator(
        &self,
        stream_name: &str,
        partition_id: &str,
        position: &StartPosition,
    ) -> Result<String, StreamError>;

    /// Fetch up to `limit` records at `iterator`
    async fn fetch_page(
        &self,
        partition_id: &str,
        iterator: &str,
        limit: usize,
    ) -> Result<RecordPage, StreamError>;
}

/// Write access to a stream
#[async_trait]
pub trait StreamWriter: Send + Sync {
    async fn put_records(
        &self,
        stream_name: &str,
        records: &[PublishRecord],
    ) -> Result<PutOutcome, StreamError>;
}

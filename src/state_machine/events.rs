use serde::{Deserialize, Serialize};

/// Events that move a run between states
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum RunEvent {
    /// Begin enumerating partitions
    Start,
    /// Enumeration returned at least one partition
    PartitionsListed,
    /// Enumeration returned no partitions
    NoPartitions,
    /// At least one record was accumulated
    RecordsCollected,
    /// Every partition finished without yielding a record
    NothingToCommit,
    /// The advanced checkpoint was saved
    Committed,
    /// A fatal error ended the run
    Fail(String),
}

impl RunEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::PartitionsListed => "partitions_listed",
            Self::NoPartitions => "no_partitions",
            Self::RecordsCollected => "records_collected",
            Self::NothingToCommit => "nothing_to_commit",
            Self::Committed => "committed",
            Self::Fail(_) => "fail",
        }
    }

    /// Extract error message if this is a failure event
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }

    /// Create a failure event with the given error message
    pub fn fail_with_error(error: impl Into<String>) -> Self {
        Self::Fail(error.into())
    }
}

/// Events that move a partition between states
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PartitionEvent {
    /// Resume marker resolved (or cold start chosen); begin fetching
    CursorResolved,
    /// A non-empty page was accumulated
    PageFetched,
    /// An empty page signalled the head of the partition
    Drained,
    /// The partition was abandoned for this run
    Abort(String),
}

impl PartitionEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::CursorResolved => "cursor_resolved",
            Self::PageFetched => "page_fetched",
            Self::Drained => "drained",
            Self::Abort(_) => "abort",
        }
    }

    pub fn abort_reason(&self) -> Option<&str> {
        match self {
            Self::Abort(reason) => Some(reason),
            _ => None,
        }
    }
}

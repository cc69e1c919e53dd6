use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one consumer run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Run constructed, nothing fetched yet
    Idle,
    /// Listing the partitions of the stream
    Enumerating,
    /// Draining partitions into the accumulator
    Consuming,
    /// Persisting the advanced checkpoint
    Checkpointing,
    /// Run finished; checkpoint committed or nothing to commit
    Done,
    /// Run ended on a fatal error; persisted state untouched
    Failed,
}

impl RunState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Check if the run is still doing work
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Enumerating | Self::Consuming | Self::Checkpointing
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Enumerating => write!(f, "enumerating"),
            Self::Consuming => write!(f, "consuming"),
            Self::Checkpointing => write!(f, "checkpointing"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for RunState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "enumerating" => Ok(Self::Enumerating),
            "consuming" => Ok(Self::Consuming),
            "checkpointing" => Ok(Self::Checkpointing),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid run state: {s}")),
        }
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::Idle
    }
}

/// Lifecycle of one partition within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionState {
    /// Looking up the resume marker
    ResolveCursor,
    /// Pulling pages
    Fetching,
    /// Caught up with the head of the partition
    Exhausted,
    /// Abandoned for this run (fetch error or run budget)
    Aborted,
}

impl PartitionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exhausted | Self::Aborted)
    }
}

impl fmt::Display for PartitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResolveCursor => write!(f, "resolve_cursor"),
            Self::Fetching => write!(f, "fetching"),
            Self::Exhausted => write!(f, "exhausted"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

impl std::str::FromStr for PartitionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "resolve_cursor" => Ok(Self::ResolveCursor),
            "fetching" => Ok(Self::Fetching),
            "exhausted" => Ok(Self::Exhausted),
            "aborted" => Ok(Self::Aborted),
            _ => Err(format!("Invalid partition state: {s}")),
        }
    }
}

impl Default for PartitionState {
    fn default() -> Self {
        Self::ResolveCursor
    }
}

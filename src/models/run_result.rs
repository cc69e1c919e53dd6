//! # Run Result
//!
//! The structured value every invocation returns. Serialized with a `status`
//! tag so callers can branch on `"success"` / `"failure"` without parsing
//! messages.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ErrorKind, IngestError};

/// Counters and output locations of a successful run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub records_processed: usize,
    pub order_row_count: usize,
    pub creator_row_count: usize,
    pub dropped_record_count: usize,
    pub partitions_aborted: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_object: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by_object: Option<String>,
}

impl RunSummary {
    /// Summary of a run that consumed nothing
    pub fn empty(run_id: Uuid) -> Self {
        Self {
            run_id,
            records_processed: 0,
            order_row_count: 0,
            creator_row_count: 0,
            dropped_record_count: 0,
            partitions_aborted: 0,
            order_object: None,
            created_by_object: None,
        }
    }
}

/// A fatal run failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    pub run_id: Uuid,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunResult {
    Success(RunSummary),
    Failure(RunFailure),
}

impl RunResult {
    pub fn failure(run_id: Uuid, error: &IngestError) -> Self {
        Self::Failure(RunFailure {
            run_id,
            kind: error.kind(),
            message: error.to_string(),
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn run_id(&self) -> Uuid {
        match self {
            Self::Success(summary) => summary.run_id,
            Self::Failure(failure) => failure.run_id,
        }
    }

    pub fn summary(&self) -> Option<&RunSummary> {
        match self {
            Self::Success(summary) => Some(summary),
            Self::Failure(_) => None,
        }
    }
}

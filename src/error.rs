//! # Ingestion Error Types
//!
//! Run-level error taxonomy for the ingestion pipeline. Every failure that can
//! reach the invocation entry point is an [`IngestError`]; its [`ErrorKind`] is
//! what ends up in the structured failure result.
//!
//! Partition- and record-level kinds (`TransientFetchError`, `PositionInvalid`,
//! `DecodeError`) are absorbed by the consumer and transformer and only show up
//! in logs and per-partition outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::checkpoint::CheckpointError;
use crate::config::ConfigurationError;
use crate::secrets::SecretError;
use crate::state_machine::StateMachineError;

/// Stable classification of an [`IngestError`], serialized into run results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ConfigMissing,
    Configuration,
    EnumerationError,
    StoreUnavailable,
    TransientFetchError,
    PositionInvalid,
    DecodeError,
    WriteError,
    PublishError,
    Internal,
}

impl ErrorKind {
    /// Whether this kind ends the run when it reaches the coordinator or handler
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::TransientFetchError | Self::PositionInvalid | Self::DecodeError
        )
    }

    /// Whether the next trigger can be expected to succeed without operator action
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::EnumerationError
                | Self::StoreUnavailable
                | Self::TransientFetchError
                | Self::WriteError
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigMissing => "config_missing",
            Self::Configuration => "configuration",
            Self::EnumerationError => "enumeration_error",
            Self::StoreUnavailable => "store_unavailable",
            Self::TransientFetchError => "transient_fetch_error",
            Self::PositionInvalid => "position_invalid",
            Self::DecodeError => "decode_error",
            Self::WriteError => "write_error",
            Self::PublishError => "publish_error",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by the ingestion pipeline
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IngestError {
    #[error("Missing required configuration values: {}", keys.join(", "))]
    ConfigMissing { keys: Vec<String> },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Failed to enumerate partitions of stream {stream}: {message}")]
    Enumeration { stream: String, message: String },

    #[error("Checkpoint store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("Transient fetch error on partition {partition_id}: {message}")]
    TransientFetch {
        partition_id: String,
        message: String,
    },

    #[error("Invalid read position on partition {partition_id}: {message}")]
    PositionInvalid {
        partition_id: String,
        message: String,
    },

    #[error("Failed to decode record {sequence_marker}: {message}")]
    Decode {
        sequence_marker: String,
        message: String,
    },

    #[error("Failed to write dataset {dataset}: {message}")]
    Write { dataset: String, message: String },

    #[error("Failed to publish records: {message}")]
    Publish { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl IngestError {
    /// Create a config-missing error for the given keys
    pub fn config_missing<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::ConfigMissing {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an enumeration error
    pub fn enumeration(stream: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Enumeration {
            stream: stream.into(),
            message: message.into(),
        }
    }

    /// Create a store-unavailable error
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
        }
    }

    /// Create a transient fetch error
    pub fn transient_fetch(partition_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransientFetch {
            partition_id: partition_id.into(),
            message: message.into(),
        }
    }

    /// Create a position-invalid error
    pub fn position_invalid(partition_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PositionInvalid {
            partition_id: partition_id.into(),
            message: message.into(),
        }
    }

    /// Create a decode error
    pub fn decode(sequence_marker: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            sequence_marker: sequence_marker.into(),
            message: message.into(),
        }
    }

    /// Create a write error
    pub fn write(dataset: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Write {
            dataset: dataset.into(),
            message: message.into(),
        }
    }

    /// Create a publish error
    pub fn publish(message: impl Into<String>) -> Self {
        Self::Publish {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigMissing { .. } => ErrorKind::ConfigMissing,
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Enumeration { .. } => ErrorKind::EnumerationError,
            Self::StoreUnavailable { .. } => ErrorKind::StoreUnavailable,
            Self::TransientFetch { .. } => ErrorKind::TransientFetchError,
            Self::PositionInvalid { .. } => ErrorKind::PositionInvalid,
            Self::Decode { .. } => ErrorKind::DecodeError,
            Self::Write { .. } => ErrorKind::WriteError,
            Self::Publish { .. } => ErrorKind::PublishError,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }
}

impl From<CheckpointError> for IngestError {
    fn from(err: CheckpointError) -> Self {
        IngestError::store_unavailable(err.to_string())
    }
}

impl From<SecretError> for IngestError {
    fn from(err: SecretError) -> Self {
        match err {
            SecretError::Unavailable { .. } => IngestError::store_unavailable(err.to_string()),
            SecretError::Malformed { .. } => IngestError::configuration(err.to_string()),
        }
    }
}

impl From<ConfigurationError> for IngestError {
    fn from(err: ConfigurationError) -> Self {
        match err {
            ConfigurationError::MissingRequiredField { field, .. } => {
                IngestError::config_missing([field])
            }
            other => IngestError::configuration(other.to_string()),
        }
    }
}

impl From<StateMachineError> for IngestError {
    fn from(err: StateMachineError) -> Self {
        IngestError::internal(err.to_string())
    }
}

/// Result type alias for pipeline operations
pub type IngestResult<T> = Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            IngestError::enumeration("orders", "denied").kind(),
            ErrorKind::EnumerationError
        );
        assert_eq!(
            IngestError::transient_fetch("shard-0", "throttled").kind(),
            ErrorKind::TransientFetchError
        );
        assert_eq!(
            IngestError::config_missing(["S3_BUCKET_NAME"]).kind(),
            ErrorKind::ConfigMissing
        );
    }

    #[test]
    fn test_fatal_and_retryable_classification() {
        assert!(ErrorKind::StoreUnavailable.is_fatal());
        assert!(ErrorKind::StoreUnavailable.is_retryable());
        assert!(ErrorKind::ConfigMissing.is_fatal());
        assert!(!ErrorKind::ConfigMissing.is_retryable());
        assert!(!ErrorKind::TransientFetchError.is_fatal());
        assert!(!ErrorKind::DecodeError.is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = IngestError::config_missing(["KINESIS_STREAM_NAME", "S3_BUCKET_NAME"]);
        let display = err.to_string();
        assert!(display.contains("KINESIS_STREAM_NAME, S3_BUCKET_NAME"));

        let err = IngestError::write("order_data", "put failed");
        assert!(err.to_string().contains("order_data"));
        assert!(err.to_string().contains("put failed"));
    }

    #[test]
    fn test_checkpoint_error_maps_to_store_unavailable() {
        let err: IngestError = CheckpointError::unavailable("connection reset").into();
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
    }

    #[test]
    fn test_kind_serde() {
        let json = serde_json::to_string(&ErrorKind::TransientFetchError).unwrap();
        assert_eq!(json, "\"transient_fetch_error\"");
        assert_eq!(ErrorKind::WriteError.to_string(), "write_error");
    }
}

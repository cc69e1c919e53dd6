//! # System Constants
//!
//! Names and limits shared across the consumer, transformer and sink. Secret keys
//! and dataset names are part of the external contract with existing deployments
//! and must not change.

/// Keys read from the run's secret document
pub mod secret_keys {
    pub const STREAM_NAME: &str = "KINESIS_STREAM_NAME";
    pub const BUCKET_NAME: &str = "S3_BUCKET_NAME";
}

/// Checkpoint document fields
pub mod checkpoint_fields {
    pub const LAST_PARTITION_ID: &str = "last_shard_id";
    pub const LAST_SEQUENCE_MARKER: &str = "last_shard_sequence";
    pub const PARTITIONS: &str = "partitions";
    pub const UPDATED_AT: &str = "checkpoint_updated_at";
}

/// Output dataset names and object layout
pub mod datasets {
    pub const ORDER_DATA: &str = "order_data";
    pub const CREATED_BY_DATA: &str = "created_by_data";
    pub const ORDER_PREFIX: &str = "order_Latest/";
    pub const CREATED_BY_PREFIX: &str = "sales_Latest/";
    pub const PARQUET_EXTENSION: &str = "parquet";
    /// `YYYYMMDD_HHMMSS`, UTC
    pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
    pub const WRITER_CREATED_BY: &str = "stream-ingest-rs";
}

/// Stream API limits
pub mod limits {
    /// Upper bound on records per page (Kinesis GetRecords maximum)
    pub const MAX_PAGE_LIMIT: usize = 10_000;
    /// Maximum bytes per put batch
    pub const MAX_PUT_BATCH_BYTES: usize = 5_000_000;
    /// Maximum records per put batch
    pub const MAX_PUT_BATCH_COUNT: usize = 500;
    pub const DEFAULT_RUN_BUDGET_SECS: u64 = 600;
}

/// Well-known secret (and checkpoint key) used when neither the trigger nor the
/// configuration names one
pub const DEFAULT_SECRET_NAME: &str = "kinesis-sequence_shard-secret";

/// Default AWS region for the stream and secret clients
pub const DEFAULT_REGION: &str = "ap-south-1";

/// Partition key used by the publisher when an exported document carries no id
pub const UNKNOWN_PARTITION_KEY: &str = "unknown_id";

/// Iterator type names, as reported in logs
pub mod iterator_types {
    pub const TRIM_HORIZON: &str = "TRIM_HORIZON";
    pub const AFTER_SEQUENCE_NUMBER: &str = "AFTER_SEQUENCE_NUMBER";
}

//! # Sink
//!
//! Rows -> one Parquet object per dataset per run. A dataset is encoded whole
//! in memory and uploaded with a single put, so an object either exists
//! complete or not at all.

pub mod object_store;
pub mod parquet;

#[cfg(feature = "aws")]
pub mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, instrument};

use crate::config::SinkConfig;
use crate::constants::datasets;
use crate::error::{IngestError, IngestResult};
use crate::logging::log_dataset_operation;

pub use self::object_store::{InMemoryObjectStore, LocalFsObjectStore};
pub use self::parquet::{decode_batches, encode, ColumnarRows, EncodeError};

#[cfg(feature = "aws")]
pub use s3::S3ObjectStore;

/// The two output datasets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Dataset {
    Orders,
    CreatedBy,
}

impl Dataset {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Orders => datasets::ORDER_DATA,
            Self::CreatedBy => datasets::CREATED_BY_DATA,
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where an object was written
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ObjectStoreError {
    #[error("Object store unavailable: {message}")]
    Unavailable { message: String },

    #[error("Put of {bucket}/{key} rejected: {message}")]
    Rejected {
        bucket: String,
        key: String,
        message: String,
    },
}

impl ObjectStoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn rejected(bucket: &str, key: &str, message: impl Into<String>) -> Self {
        Self::Rejected {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// Whole-object storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `body` under `bucket/key`, replacing any existing object
    async fn put(&self, bucket: &str, key: &str, body: Bytes) -> Result<(), ObjectStoreError>;
}

/// Writes datasets as Parquet objects
#[derive(Clone)]
pub struct DatasetSink {
    store: Arc<dyn ObjectStore>,
    config: SinkConfig,
}

impl DatasetSink {
    pub fn new(store: Arc<dyn ObjectStore>, config: SinkConfig) -> Self {
        Self { store, config }
    }

    /// `{prefix}{run_ts}/{dataset}_{run_ts}.parquet`, the folder only when
    /// timestamped folders are enabled
    pub fn object_key(&self, dataset: Dataset, run_ts: DateTime<Utc>) -> String {
        let prefix = match dataset {
            Dataset::Orders => &self.config.order_prefix,
            Dataset::CreatedBy => &self.config.created_by_prefix,
        };
        let stamp = run_ts.format(datasets::TIMESTAMP_FORMAT).to_string();

        let mut key = prefix.clone();
        if !key.is_empty() && !key.ends_with('/') {
            key.push('/');
        }
        if self.config.timestamped_folders {
            key.push_str(&stamp);
            key.push('/');
        }
        key.push_str(&format!(
            "{}_{stamp}.{}",
            dataset.name(),
            datasets::PARQUET_EXTENSION
        ));
        key
    }

    /// Write `rows` as one object; `Ok(None)` without touching the store when
    /// there are no rows
    #[instrument(skip(self, rows), fields(dataset = %dataset, rows = rows.len()))]
    pub async fn write<R>(
        &self,
        rows: &[R],
        dataset: Dataset,
        bucket: &str,
        run_ts: DateTime<Utc>,
    ) -> IngestResult<Option<ObjectLocation>>
    where
        R: ColumnarRows + Sync,
    {
        if rows.is_empty() {
            log_dataset_operation("write", dataset.name(), 0, None, "skipped");
            return Ok(None);
        }

        let body = encode(rows).map_err(|e| {
            error!(dataset = %dataset, error = %e, "Parquet encoding failed");
            IngestError::write(dataset.name(), e.to_string())
        })?;

        let key = self.object_key(dataset, run_ts);
        self.store.put(bucket, &key, body).await.map_err(|e| {
            error!(dataset = %dataset, bucket = %bucket, key = %key, error = %e, "Object upload failed");
            IngestError::write(dataset.name(), e.to_string())
        })?;

        let location = ObjectLocation {
            bucket: bucket.to_string(),
            key,
        };
        log_dataset_operation(
            "write",
            dataset.name(),
            rows.len(),
            Some(&location.to_string()),
            "uploaded",
        );
        Ok(Some(location))
    }
}

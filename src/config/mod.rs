//! # Ingestion Configuration
//!
//! Typed configuration for the ingestion worker, layered from built-in defaults,
//! an optional TOML file and `STREAM_INGEST__*` environment variables.
//!
//! ## Architecture
//!
//! - **Static configuration** ([`IngestConfig`]): loaded once per process by
//!   [`ConfigLoader`] and validated before use.
//! - **Run settings** ([`PipelineSettings`]): the stream and bucket a single run
//!   works against, resolved from the configuration and the run's secret
//!   document at the start of every invocation.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use stream_ingest::config::ConfigLoader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::new().load()?;
//!
//! let page_limit = config.consumer.page_limit;
//! let budget = config.consumer.run_budget();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;
pub mod settings;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{self, datasets, limits};

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigLoader;
pub use settings::PipelineSettings;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Which secret to read and optional static stream/bucket names
    pub pipeline: PipelineConfig,

    /// Paging, concurrency and run budget of the consumer
    pub consumer: ConsumerConfig,

    /// Where the checkpoint document lives
    pub checkpoint: CheckpointConfig,

    /// Output object layout
    pub sink: SinkConfig,

    pub logging: LoggingConfig,

    /// Local or AWS backends
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Secret holding `KINESIS_STREAM_NAME` / `S3_BUCKET_NAME`; the trigger may override it
    pub secret_name: String,
    /// Static stream name; when set the secret's value is ignored
    pub stream_name: Option<String>,
    /// Static bucket name; when set the secret's value is ignored
    pub bucket: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            secret_name: constants::DEFAULT_SECRET_NAME.to_string(),
            stream_name: None,
            bucket: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Records requested per page fetch
    pub page_limit: usize,
    /// Partitions drained at the same time; results are always merged in enumeration order
    pub max_concurrent_partitions: usize,
    /// Wall-clock budget of one run
    pub run_budget_secs: u64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            page_limit: limits::MAX_PAGE_LIMIT,
            max_concurrent_partitions: 1,
            run_budget_secs: limits::DEFAULT_RUN_BUDGET_SECS,
        }
    }
}

impl ConsumerConfig {
    pub fn run_budget(&self) -> Duration {
        Duration::from_secs(self.run_budget_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Checkpoint document key; defaults to the run's secret name
    pub key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SinkConfig {
    pub order_prefix: String,
    pub created_by_prefix: String,
    /// Place each run's objects under a `{run_ts}/` folder inside the prefix
    pub timestamped_folders: bool,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            order_prefix: datasets::ORDER_PREFIX.to_string(),
            created_by_prefix: datasets::CREATED_BY_PREFIX.to_string(),
            timestamped_folders: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Explicit filter directive; wins over the environment-derived default
    pub level: Option<String>,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Filesystem-backed stream, secrets and objects under `local_root`
    #[default]
    Local,
    /// Kinesis, Secrets Manager and S3
    Aws,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub local_root: PathBuf,
    pub region: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Local,
            local_root: PathBuf::from("./data"),
            region: constants::DEFAULT_REGION.to_string(),
        }
    }
}

impl IngestConfig {
    /// Checkpoint key for a run reading `secret_name`
    pub fn checkpoint_key(&self, secret_name: &str) -> String {
        self.checkpoint
            .key
            .clone()
            .filter(|key| !key.is_empty())
            .unwrap_or_else(|| secret_name.to_string())
    }

    /// Validate the configuration for consistency
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.pipeline.secret_name.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "pipeline.secret_name",
                "pipeline configuration",
            ));
        }

        if self.consumer.page_limit == 0 || self.consumer.page_limit > limits::MAX_PAGE_LIMIT {
            return Err(ConfigurationError::invalid_value(
                "consumer.page_limit",
                self.consumer.page_limit.to_string(),
                format!("page limit must be between 1 and {}", limits::MAX_PAGE_LIMIT),
            ));
        }

        if self.consumer.max_concurrent_partitions == 0 {
            return Err(ConfigurationError::invalid_value(
                "consumer.max_concurrent_partitions",
                "0",
                "at least one partition must be drained at a time",
            ));
        }

        if self.consumer.run_budget_secs == 0 {
            return Err(ConfigurationError::invalid_value(
                "consumer.run_budget_secs",
                "0",
                "run budget must be greater than 0",
            ));
        }

        if self.backend.kind == BackendKind::Local
            && self.backend.local_root.as_os_str().is_empty()
        {
            return Err(ConfigurationError::missing_required_field(
                "backend.local_root",
                "local backend configuration",
            ));
        }

        if self.backend.kind == BackendKind::Aws && self.backend.region.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "backend.region",
                "aws backend configuration",
            ));
        }

        Ok(())
    }
}

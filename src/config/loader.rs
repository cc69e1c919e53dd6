//! Configuration Loader
//!
//! Layered loading on top of the `config` crate. Sources, lowest precedence
//! first:
//!
//! 1. built-in defaults ([`IngestConfig::default`])
//! 2. the base TOML file (`config/stream-ingest.toml` unless a path is given)
//! 3. the environment-specific TOML file (`config/stream-ingest.{env}.toml`)
//! 4. environment variables, `STREAM_INGEST__SECTION__FIELD`
//! 5. explicit overrides (CLI flags, tests)

use config::{Config, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::error::{ConfigResult, ConfigurationError};
use super::IngestConfig;

const DEFAULT_CONFIG_FILE: &str = "config/stream-ingest.toml";
const DEFAULT_ENV_PREFIX: &str = "STREAM_INGEST";
const ENV_SEPARATOR: &str = "__";

/// Detect the current environment: `STREAM_INGEST_ENV`, then `APP_ENV`, default `development`
pub fn detect_environment() -> String {
    env::var("STREAM_INGEST_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
        .to_lowercase()
}

/// Builder for a validated [`IngestConfig`]
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config_file: PathBuf,
    file_required: bool,
    environment: String,
    env_prefix: String,
    overrides: Vec<(String, String)>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Loader reading the default file when present
    pub fn new() -> Self {
        Self {
            config_file: PathBuf::from(DEFAULT_CONFIG_FILE),
            file_required: false,
            environment: detect_environment(),
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            overrides: Vec::new(),
        }
    }

    /// Read an explicit file; loading fails if it does not exist
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = path.into();
        self.file_required = true;
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into().to_lowercase();
        self
    }

    /// Change the environment variable prefix (tests use unique prefixes)
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Set a dotted key, e.g. `("consumer.page_limit", "100")`
    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.push((key.into(), value.into()));
        self
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Merge every source, deserialize and validate
    pub fn load(&self) -> ConfigResult<IngestConfig> {
        if self.file_required && !self.config_file.is_file() {
            return Err(ConfigurationError::config_file_not_found(vec![
                self.config_file.clone(),
            ]));
        }

        let defaults =
            Config::try_from(&IngestConfig::default()).map_err(ConfigurationError::load_error)?;

        let env_file = environment_file(&self.config_file, &self.environment);
        debug!(
            config_file = %self.config_file.display(),
            environment_file = %env_file.display(),
            environment = %self.environment,
            "Loading configuration"
        );

        let mut builder = Config::builder()
            .add_source(defaults)
            .add_source(
                File::from(self.config_file.as_path())
                    .format(FileFormat::Toml)
                    .required(self.file_required),
            )
            .add_source(
                File::from(env_file.as_path())
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            );

        for (key, value) in &self.overrides {
            builder = builder
                .set_override(key.as_str(), value.as_str())
                .map_err(ConfigurationError::load_error)?;
        }

        let config: IngestConfig = builder
            .build()
            .map_err(ConfigurationError::load_error)?
            .try_deserialize()
            .map_err(ConfigurationError::deserialize_error)?;

        config.validate()?;

        info!(
            environment = %self.environment,
            secret_name = %config.pipeline.secret_name,
            backend = ?config.backend.kind,
            page_limit = config.consumer.page_limit,
            max_concurrent_partitions = config.consumer.max_concurrent_partitions,
            "Configuration loaded successfully"
        );

        Ok(config)
    }
}

/// `dir/stream-ingest.toml` -> `dir/stream-ingest.{environment}.toml`
fn environment_file(base: &Path, environment: &str) -> PathBuf {
    let stem = base
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("stream-ingest");
    base.with_file_name(format!("{stem}.{environment}.toml"))
}

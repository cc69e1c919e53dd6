//! Per-run settings resolution.
//!
//! Static configuration wins; whatever it leaves unset is read from the run's
//! secret document. Every missing value is reported at once so a single failed
//! run tells the operator everything that needs fixing.

use serde_json::Value;
use tracing::{debug, instrument};

use super::IngestConfig;
use crate::constants::secret_keys;
use crate::error::{IngestError, IngestResult};
use crate::models::CheckpointKey;
use crate::secrets::{SecretDocument, SecretStore};

/// Everything one run needs to know about where to read and write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub secret_name: String,
    pub stream_name: String,
    pub bucket: String,
    pub checkpoint_key: CheckpointKey,
}

impl PipelineSettings {
    /// Resolve settings for a run.
    ///
    /// `secret_override` is the secret name carried by the trigger, if any.
    #[instrument(skip(config, secrets))]
    pub async fn resolve(
        config: &IngestConfig,
        secret_override: Option<&str>,
        secrets: &dyn SecretStore,
    ) -> IngestResult<Self> {
        let secret_name = secret_override
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&config.pipeline.secret_name)
            .to_string();

        let configured_stream = non_empty(config.pipeline.stream_name.as_deref());
        let configured_bucket = non_empty(config.pipeline.bucket.as_deref());

        let document = if configured_stream.is_some() && configured_bucket.is_some() {
            SecretDocument::new()
        } else {
            secrets.get_secret(&secret_name).await?.unwrap_or_else(|| {
                debug!(secret_name = %secret_name, "Secret not found, treating as empty");
                SecretDocument::new()
            })
        };

        let stream_name = configured_stream
            .map(str::to_string)
            .or_else(|| document_value(&document, secret_keys::STREAM_NAME));
        let bucket = configured_bucket
            .map(str::to_string)
            .or_else(|| document_value(&document, secret_keys::BUCKET_NAME));

        let (stream_name, bucket) = match (stream_name, bucket) {
            (Some(stream_name), Some(bucket)) => (stream_name, bucket),
            (stream_name, bucket) => {
                let mut missing = Vec::new();
                if stream_name.is_none() {
                    missing.push(secret_keys::STREAM_NAME);
                }
                if bucket.is_none() {
                    missing.push(secret_keys::BUCKET_NAME);
                }
                return Err(IngestError::config_missing(missing));
            }
        };

        let checkpoint_key = CheckpointKey::new(config.checkpoint_key(&secret_name));

        Ok(Self {
            secret_name,
            stream_name,
            bucket,
            checkpoint_key,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn document_value(document: &SecretDocument, key: &str) -> Option<String> {
    match document.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

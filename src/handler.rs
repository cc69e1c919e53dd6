//! # Invocation Handler
//!
//! Entry point of one triggered run: resolve settings, consume and checkpoint,
//! transform, write both datasets, and fold the outcome into a [`RunResult`].
//! Every failure, including a panic inside the pipeline, comes back as a
//! structured `Failure` rather than an unwound stack.

use chrono::Utc;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::checkpoint::{CheckpointStore, SecretCheckpointStore};
use crate::config::{BackendKind, IngestConfig, PipelineSettings};
use crate::consumer::ConsumerCoordinator;
use crate::error::{IngestError, IngestResult};
use crate::logging::log_error;
use crate::models::{RunResult, RunSummary};
use crate::secrets::{FileSecretStore, SecretStore};
use crate::sink::{Dataset, DatasetSink, LocalFsObjectStore, ObjectLocation, ObjectStore};
use crate::stream::{LocalStreamClient, StreamClient};
use crate::transform::transform_batch;

/// Trigger payload. Every field is optional; an empty event runs with the
/// configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct InvocationEvent {
    #[serde(default, alias = "SECRETS_MANAGER_SECRET_NAME")]
    pub secret_name: Option<String>,
}

/// The external services one run talks to
#[derive(Clone)]
pub struct Backends {
    pub stream: Arc<dyn StreamClient>,
    pub secrets: Arc<dyn SecretStore>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub objects: Arc<dyn ObjectStore>,
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends").finish_non_exhaustive()
    }
}

impl Backends {
    /// Filesystem backends under `root`: `streams/`, `secrets/` and `objects/`.
    /// The checkpoint lives in the secret document like it does on AWS.
    pub fn local(root: impl AsRef<std::path::Path>) -> Self {
        let root = root.as_ref();
        let secrets: Arc<dyn SecretStore> = Arc::new(FileSecretStore::new(root.join("secrets")));
        Self {
            stream: Arc::new(LocalStreamClient::new(root.join("streams"))),
            checkpoints: Arc::new(SecretCheckpointStore::new(Arc::clone(&secrets))),
            secrets,
            objects: Arc::new(LocalFsObjectStore::new(root.join("objects"))),
        }
    }

    /// Kinesis, Secrets Manager and S3 in `region`
    #[cfg(feature = "aws")]
    pub async fn aws(region: &str) -> Self {
        use crate::secrets::SecretsManagerStore;
        use crate::sink::S3ObjectStore;
        use crate::stream::KinesisStreamClient;

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .load()
            .await;
        let secrets: Arc<dyn SecretStore> = Arc::new(SecretsManagerStore::from_conf(&sdk_config));
        Self {
            stream: Arc::new(KinesisStreamClient::from_conf(&sdk_config)),
            checkpoints: Arc::new(SecretCheckpointStore::new(Arc::clone(&secrets))),
            secrets,
            objects: Arc::new(S3ObjectStore::from_conf(&sdk_config)),
        }
    }

    /// Backends selected by `backend.kind`
    pub async fn from_config(config: &IngestConfig) -> IngestResult<Self> {
        match config.backend.kind {
            BackendKind::Local => Ok(Self::local(&config.backend.local_root)),
            #[cfg(feature = "aws")]
            BackendKind::Aws => Ok(Self::aws(&config.backend.region).await),
            #[cfg(not(feature = "aws"))]
            BackendKind::Aws => Err(IngestError::configuration(
                "backend.kind = \"aws\" requires the `aws` feature",
            )),
        }
    }
}

pub struct IngestionHandler {
    config: IngestConfig,
    backends: Backends,
}

impl IngestionHandler {
    pub fn new(config: IngestConfig, backends: Backends) -> Self {
        Self { config, backends }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Run the pipeline once. Never panics and never returns an `Err`; the
    /// outcome is always a [`RunResult`].
    #[instrument(skip(self, event), fields(run_id))]
    pub async fn invoke(&self, event: InvocationEvent) -> RunResult {
        let run_id = Uuid::new_v4();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));
        info!(run_id = %run_id, secret_name = ?event.secret_name, "🚀 RUN: starting");

        let outcome = AssertUnwindSafe(self.run(run_id, &event)).catch_unwind().await;

        let result = match outcome {
            Ok(Ok(summary)) => RunResult::Success(summary),
            Ok(Err(e)) => {
                log_error("handler", "invoke", &e.to_string(), Some(e.kind().as_str()));
                RunResult::failure(run_id, &e)
            }
            Err(panic) => {
                let e = IngestError::internal(panic_message(panic.as_ref()));
                log_error("handler", "invoke", &e.to_string(), Some("panic"));
                RunResult::failure(run_id, &e)
            }
        };

        if let Some(summary) = result.summary() {
            info!(
                run_id = %run_id,
                records = summary.records_processed,
                order_rows = summary.order_row_count,
                creator_rows = summary.creator_row_count,
                dropped = summary.dropped_record_count,
                "✅ RUN: finished"
            );
        }
        result
    }

    async fn run(&self, run_id: Uuid, event: &InvocationEvent) -> IngestResult<RunSummary> {
        let settings = PipelineSettings::resolve(
            &self.config,
            event.secret_name.as_deref(),
            self.backends.secrets.as_ref(),
        )
        .await?;

        let coordinator = ConsumerCoordinator::new(
            Arc::clone(&self.backends.stream),
            Arc::clone(&self.backends.checkpoints),
            self.config.consumer.clone(),
        );
        let consumed = coordinator
            .consume(&settings.stream_name, &settings.checkpoint_key)
            .await?;

        let mut summary = RunSummary::empty(run_id);
        summary.partitions_aborted = consumed.aborted_partitions();
        if consumed.is_empty() {
            info!(stream = %settings.stream_name, "No new records, nothing to write");
            return Ok(summary);
        }

        let batch = transform_batch(&consumed.records);
        summary.records_processed = consumed.records.len();
        summary.order_row_count = batch.orders.len();
        summary.creator_row_count = batch.creators.len();
        summary.dropped_record_count = batch.dropped;

        let sink = DatasetSink::new(Arc::clone(&self.backends.objects), self.config.sink.clone());
        let run_ts = Utc::now();
        let (orders, creators) = tokio::join!(
            sink.write(&batch.orders, Dataset::Orders, &settings.bucket, run_ts),
            sink.write(&batch.creators, Dataset::CreatedBy, &settings.bucket, run_ts),
        );

        let (order_object, created_by_object) = merge_writes(orders, creators)?;
        summary.order_object = order_object.map(|location| location.to_string());
        summary.created_by_object = created_by_object.map(|location| location.to_string());
        Ok(summary)
    }
}

type WriteOutcome = IngestResult<Option<ObjectLocation>>;

/// Both datasets are attempted; any failure fails the run and names every
/// dataset that was not written
fn merge_writes(
    orders: WriteOutcome,
    creators: WriteOutcome,
) -> IngestResult<(Option<ObjectLocation>, Option<ObjectLocation>)> {
    match (orders, creators) {
        (Ok(orders), Ok(creators)) => Ok((orders, creators)),
        (Err(e), Ok(written)) | (Ok(written), Err(e)) => {
            if let Some(location) = written {
                warn!(location = %location, "Dataset written although the run failed");
            }
            Err(e)
        }
        (Err(order_err), Err(creator_err)) => {
            error!(%order_err, %creator_err, "Both datasets failed to write");
            Err(IngestError::write(
                format!("{}, {}", Dataset::Orders, Dataset::CreatedBy),
                format!("{order_err}; {creator_err}"),
            ))
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("pipeline panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("pipeline panicked: {message}")
    } else {
        "pipeline panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_event_accepts_legacy_field_name() {
        let event: InvocationEvent =
            serde_json::from_str(r#"{"SECRETS_MANAGER_SECRET_NAME": "orders-secret"}"#).unwrap();
        assert_eq!(event.secret_name.as_deref(), Some("orders-secret"));

        let event: InvocationEvent = serde_json::from_str("{}").unwrap();
        assert_eq!(event, InvocationEvent::default());
    }

    #[test]
    fn test_merge_writes_names_failed_datasets() {
        let location = ObjectLocation {
            bucket: "lake".to_string(),
            key: "k".to_string(),
        };
        let err = merge_writes(Ok(Some(location)), Err(IngestError::write("created_by_data", "denied")))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WriteError);
        assert!(err.to_string().contains("created_by_data"));

        let err = merge_writes(
            Err(IngestError::write("order_data", "denied")),
            Err(IngestError::write("created_by_data", "denied")),
        )
        .unwrap_err();
        assert!(err.to_string().contains("order_data, created_by_data"));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("index out of bounds");
        assert_eq!(
            panic_message(payload.as_ref()),
            "pipeline panicked: index out of bounds"
        );
        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(payload.as_ref()), "pipeline panicked");
    }
}

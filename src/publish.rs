//! # Publisher
//!
//! Replays an exported document collection onto the stream. Used to seed a
//! stream for testing and backfills; the consumer side never depends on it.
//!
//! An export is a JSON array of envelopes (or a single envelope) of the form
//! `{"_id": {"$oid": "..."}, "payload": {...}}`. Each envelope becomes one
//! stream record keyed by its id, with the serialized `payload` as data.

use bytes::Bytes;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::constants::{limits, UNKNOWN_PARTITION_KEY};
use crate::error::{IngestError, IngestResult};
use crate::stream::{PublishRecord, StreamWriter};

/// Totals of one publish
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct PublishSummary {
    pub documents: usize,
    pub skipped: usize,
    pub batches: usize,
    pub accepted: usize,
    pub failed: usize,
}

/// Split records into put batches bounded by `max_bytes` and `max_count`.
///
/// Order is preserved and no batch is empty. A single record larger than
/// `max_bytes` still gets a batch of its own; the stream rejects it there.
pub fn chunk_records(
    records: Vec<PublishRecord>,
    max_bytes: usize,
    max_count: usize,
) -> Vec<Vec<PublishRecord>> {
    let mut chunks = Vec::new();
    let mut current: Vec<PublishRecord> = Vec::new();
    let mut current_bytes = 0;

    for record in records {
        let size = record.size();
        let over_count = current.len() >= max_count;
        let over_bytes = current_bytes + size > max_bytes;

        if !current.is_empty() && (over_count || over_bytes) {
            chunks.push(std::mem::take(&mut current));
            current_bytes = 0;
        }

        current_bytes += size;
        current.push(record);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Partition key of an exported document: `_id.$oid`, a plain `_id`, or the
/// fallback key
fn partition_key(document: &Value) -> String {
    match document.get("_id") {
        Some(Value::Object(id)) => match id.get("$oid") {
            Some(Value::String(oid)) => oid.clone(),
            _ => UNKNOWN_PARTITION_KEY.to_string(),
        },
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => UNKNOWN_PARTITION_KEY.to_string(),
    }
}

/// Null, `false`, zero, and empty strings, arrays or objects carry nothing to publish
fn is_blank(payload: &Value) -> bool {
    match payload {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
    }
}

/// Turn an export into publishable records.
///
/// Returns the records and the number of documents skipped for lacking a
/// `payload`.
pub fn extract_records(export: &Value) -> IngestResult<(Vec<PublishRecord>, usize)> {
    let documents: Vec<&Value> = match export {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => vec![export],
        _ => {
            return Err(IngestError::publish(
                "export must be a JSON array or a single JSON object",
            ))
        }
    };

    let mut records = Vec::with_capacity(documents.len());
    let mut skipped = 0;

    for (index, document) in documents.into_iter().enumerate() {
        let key = partition_key(document);
        let Some(payload) = document.get("payload").filter(|p| !is_blank(p)) else {
            warn!(index, partition_key = %key, "Skipping exported document without payload");
            skipped += 1;
            continue;
        };

        let data = serde_json::to_vec(payload)
            .map_err(|e| IngestError::publish(format!("failed to serialize payload of {key}: {e}")))?;
        records.push(PublishRecord::new(key, Bytes::from(data)));
    }

    Ok((records, skipped))
}

pub struct Publisher {
    writer: Arc<dyn StreamWriter>,
    max_batch_bytes: usize,
    max_batch_count: usize,
}

impl Publisher {
    pub fn new(writer: Arc<dyn StreamWriter>) -> Self {
        Self {
            writer,
            max_batch_bytes: limits::MAX_PUT_BATCH_BYTES,
            max_batch_count: limits::MAX_PUT_BATCH_COUNT,
        }
    }

    pub fn with_batch_limits(mut self, max_bytes: usize, max_count: usize) -> Self {
        self.max_batch_bytes = max_bytes;
        self.max_batch_count = max_count.max(1);
        self
    }

    /// Put `records` onto `stream_name` in bounded batches.
    ///
    /// Records the stream refuses individually are counted, not retried; a
    /// batch-level failure stops the publish.
    #[instrument(skip(self, records), fields(records = records.len()))]
    pub async fn publish(
        &self,
        stream_name: &str,
        records: Vec<PublishRecord>,
    ) -> IngestResult<PublishSummary> {
        let mut summary = PublishSummary {
            documents: records.len(),
            ..PublishSummary::default()
        };

        for (index, chunk) in chunk_records(records, self.max_batch_bytes, self.max_batch_count)
            .into_iter()
            .enumerate()
        {
            let outcome = self
                .writer
                .put_records(stream_name, &chunk)
                .await
                .map_err(|e| IngestError::publish(format!("batch {index} to {stream_name}: {e}")))?;

            if outcome.failed > 0 {
                warn!(
                    batch = index,
                    failed = outcome.failed,
                    "Stream refused part of a put batch"
                );
            }
            summary.batches += 1;
            summary.accepted += outcome.accepted;
            summary.failed += outcome.failed;
        }

        info!(
            stream = %stream_name,
            batches = summary.batches,
            accepted = summary.accepted,
            failed = summary.failed,
            "📤 PUBLISH: records put onto stream"
        );
        Ok(summary)
    }

    /// Read a JSON export from `path` and publish it
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn publish_export(&self, path: &Path, stream_name: &str) -> IngestResult<PublishSummary> {
        let raw = tokio::fs::read(path)
            .await
            .map_err(|e| IngestError::publish(format!("failed to read {}: {e}", path.display())))?;
        let export: Value = serde_json::from_slice(&raw)
            .map_err(|e| IngestError::publish(format!("{} is not valid JSON: {e}", path.display())))?;

        let (records, skipped) = extract_records(&export)?;
        let mut summary = self.publish(stream_name, records).await?;
        summary.documents += skipped;
        summary.skipped = skipped;
        Ok(summary)
    }
}

//! Filesystem-backed stream for local runs.
//!
//! Layout under the root directory:
//!
//! ```text
//! {root}/{stream}/{partition_id}.jsonl
//! ```
//!
//! Each line is one record envelope `{"partition_key", "data", "arrival"}` where
//! `data` is the payload text. A record's sequence marker is its 1-based line
//! number. A line that is not a valid envelope is still delivered, with the raw
//! line as payload, so it is dropped by the transformer rather than stalling
//! the partition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use super::{
    PartitionListing, PublishRecord, PutOutcome, RecordPage, StartPosition, StreamClient,
    StreamError, StreamWriter,
};
use crate::models::{RawRecord, StreamPartition};

const PARTITION_EXTENSION: &str = "jsonl";

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    partition_key: String,
    data: String,
    #[serde(default)]
    arrival: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct LocalStreamClient {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl LocalStreamClient {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Create a stream directory with `partition_count` empty partitions
    pub async fn create_stream(
        &self,
        stream_name: &str,
        partition_count: usize,
    ) -> Result<Vec<String>, StreamError> {
        let dir = self.stream_dir(stream_name);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StreamError::transport(format!("{}: {e}", dir.display())))?;

        let mut ids = Vec::with_capacity(partition_count);
        for index in 0..partition_count.max(1) {
            let id = format!("shardId-{index:012}");
            let path = self.partition_path(stream_name, &id);
            if !path.exists() {
                tokio::fs::write(&path, b"")
                    .await
                    .map_err(|e| StreamError::transport(format!("{}: {e}", path.display())))?;
            }
            ids.push(id);
        }
        Ok(ids)
    }

    fn stream_dir(&self, stream_name: &str) -> PathBuf {
        self.root.join(stream_name)
    }

    fn partition_path(&self, stream_name: &str, partition_id: &str) -> PathBuf {
        self.stream_dir(stream_name)
            .join(format!("{partition_id}.{PARTITION_EXTENSION}"))
    }

    async fn partition_ids(&self, stream_name: &str) -> Result<Vec<String>, StreamError> {
        let dir = self.stream_dir(stream_name);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                return Err(StreamError::StreamNotFound {
                    stream: stream_name.to_string(),
                })
            }
            Err(e) => return Err(StreamError::transport(format!("{}: {e}", dir.display()))),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StreamError::transport(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(PARTITION_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn read_lines(path: &Path) -> Result<Vec<String>, StreamError> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(content.lines().map(str::to_string).collect()),
            Err(e) if e.kind() == IoErrorKind::NotFound => Err(StreamError::rejected(format!(
                "unknown partition file {}",
                path.display()
            ))),
            Err(e) => Err(StreamError::transport(format!("{}: {e}", path.display()))),
        }
    }

    fn decode_line(partition_id: &str, line_number: usize, line: &str) -> RawRecord {
        let marker = line_number.to_string();
        match serde_json::from_str::<Envelope>(line) {
            Ok(envelope) => {
                let mut record = RawRecord::new(partition_id, marker, envelope.data)
                    .with_partition_key(envelope.partition_key);
                record.arrival_timestamp = envelope.arrival;
                record
            }
            Err(_) => RawRecord::new(partition_id, marker, line.to_string()),
        }
    }
}

#[async_trait]
impl StreamClient for LocalStreamClient {
    async fn list_partitions(
        &self,
        stream_name: &str,
        _next_token: Option<&str>,
    ) -> Result<PartitionListing, StreamError> {
        let partitions = self
            .partition_ids(stream_name)
            .await?
            .into_iter()
            .map(StreamPartition::new)
            .collect();
        Ok(PartitionListing {
            partitions,
            next_token: None,
        })
    }

    async fn partition_iterator(
        &self,
        stream_name: &str,
        partition_id: &str,
        position: &StartPosition,
    ) -> Result<String, StreamError> {
        let path = self.partition_path(stream_name, partition_id);
        let line_count = Self::read_lines(&path).await?.len();

        let next_line = match position {
            StartPosition::TrimHorizon => 1,
            StartPosition::AfterSequence(marker) => {
                let line: usize = marker.parse().map_err(|_| {
                    StreamError::position_invalid(partition_id, format!("malformed marker {marker}"))
                })?;
                if line > line_count {
                    return Err(StreamError::position_invalid(
                        partition_id,
                        format!("marker {marker} is beyond the partition head"),
                    ));
                }
                line + 1
            }
        };

        Ok(format!("{}:{next_line}", path.display()))
    }

    async fn fetch_page(
        &self,
        partition_id: &str,
        iterator: &str,
        limit: usize,
    ) -> Result<RecordPage, StreamError> {
        let (path, next_line) = iterator
            .rsplit_once(':')
            .and_then(|(path, line)| Some((PathBuf::from(path), line.parse::<usize>().ok()?)))
            .ok_or_else(|| StreamError::rejected(format!("malformed iterator {iterator}")))?;

        let lines = Self::read_lines(&path).await?;
        let records: Vec<RawRecord> = lines
            .iter()
            .enumerate()
            .skip(next_line.saturating_sub(1))
            .take(limit)
            .map(|(index, line)| Self::decode_line(partition_id, index + 1, line))
            .collect();

        let following = next_line + records.len();
        let behind = lines.len().saturating_sub(following - 1);

        Ok(RecordPage {
            records,
            next_iterator: Some(format!("{}:{following}", path.display())),
            millis_behind_latest: Some(if behind == 0 { 0 } else { 1000 }),
        })
    }
}

#[async_trait]
impl StreamWriter for LocalStreamClient {
    async fn put_records(
        &self,
        stream_name: &str,
        records: &[PublishRecord],
    ) -> Result<PutOutcome, StreamError> {
        let _guard = self.write_lock.lock().await;

        let partition_ids = self.partition_ids(stream_name).await?;
        if partition_ids.is_empty() {
            return Err(StreamError::StreamNotFound {
                stream: stream_name.to_string(),
            });
        }

        let mut outcome = PutOutcome::default();
        let now = Utc::now();
        let mut buffers: Vec<String> = vec![String::new(); partition_ids.len()];

        for record in records {
            let Ok(data) = std::str::from_utf8(&record.data) else {
                outcome.failed += 1;
                continue;
            };
            let envelope = Envelope {
                partition_key: record.partition_key.clone(),
                data: data.to_string(),
                arrival: Some(now),
            };
            let line = serde_json::to_string(&envelope)
                .map_err(|e| StreamError::rejected(e.to_string()))?;

            let mut hasher = DefaultHasher::new();
            record.partition_key.hash(&mut hasher);
            let index = (hasher.finish() % partition_ids.len() as u64) as usize;
            buffers[index].push_str(&line);
            buffers[index].push('\n');
            outcome.accepted += 1;
        }

        for (partition_id, buffer) in partition_ids.iter().zip(buffers) {
            if buffer.is_empty() {
                continue;
            }
            let path = self.partition_path(stream_name, partition_id);
            let mut file = tokio::fs::OpenOptions::new()
                .append(true)
                .open(&path)
                .await
                .map_err(|e| StreamError::transport(format!("{}: {e}", path.display())))?;
            file.write_all(buffer.as_bytes())
                .await
                .map_err(|e| StreamError::transport(format!("{}: {e}", path.display())))?;
            file.flush()
                .await
                .map_err(|e| StreamError::transport(e.to_string()))?;
        }

        debug!(
            stream = %stream_name,
            accepted = outcome.accepted,
            failed = outcome.failed,
            "Appended records to local stream"
        );
        Ok(outcome)
    }
}

//! In-memory stream for tests and local experiments.
//!
//! Holds a single stream (the stream name passed to calls is not checked).
//! Sequence markers are decimal `u64`s assigned per partition in increasing
//! order. Retention trimming and fetch/listing faults can be injected.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};

use super::{
    PartitionListing, PublishRecord, PutOutcome, RecordPage, StartPosition, StreamClient,
    StreamError, StreamWriter,
};
use crate::models::{RawRecord, StreamPartition};

#[derive(Debug, Clone)]
struct StoredRecord {
    sequence: u64,
    payload: Bytes,
    partition_key: Option<String>,
    arrival: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct PartitionLog {
    records: Vec<StoredRecord>,
    last_sequence: u64,
    trimmed_through: Option<u64>,
    fail_fetch_after: Option<usize>,
    fetches: usize,
}

impl PartitionLog {
    fn first_retained(&self) -> u64 {
        self.trimmed_through.map_or(0, |t| t + 1)
    }
}

#[derive(Debug)]
pub struct InMemoryStream {
    partitions: RwLock<Vec<(String, PartitionLog)>>,
    listing_page_size: usize,
    fail_listing: AtomicBool,
}

impl Default for InMemoryStream {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStream {
    pub fn new() -> Self {
        Self {
            partitions: RwLock::new(Vec::new()),
            listing_page_size: 100,
            fail_listing: AtomicBool::new(false),
        }
    }

    /// Partitions returned per listing call
    pub fn with_listing_page_size(mut self, size: usize) -> Self {
        self.listing_page_size = size.max(1);
        self
    }

    /// Add a partition; listing order is creation order
    pub fn create_partition(&self, partition_id: &str) {
        let mut partitions = self.partitions.write();
        if !partitions.iter().any(|(id, _)| id == partition_id) {
            partitions.push((partition_id.to_string(), PartitionLog::default()));
        }
    }

    /// Append with the next sequence number, returning its marker
    pub fn push(&self, partition_id: &str, payload: impl Into<Bytes>) -> String {
        let mut partitions = self.partitions.write();
        let log = Self::log_mut(&mut partitions, partition_id);
        let sequence = log.last_sequence + 1;
        Self::append(log, sequence, payload.into(), None);
        sequence.to_string()
    }

    /// Append with an explicit sequence number; ignored unless it is beyond the head
    pub fn push_at(&self, partition_id: &str, sequence: u64, payload: impl Into<Bytes>) -> String {
        let mut partitions = self.partitions.write();
        let log = Self::log_mut(&mut partitions, partition_id);
        if sequence > log.last_sequence {
            Self::append(log, sequence, payload.into(), None);
        }
        sequence.to_string()
    }

    /// Drop every record up to and including `sequence` (retention expiry)
    pub fn trim_through(&self, partition_id: &str, sequence: u64) {
        let mut partitions = self.partitions.write();
        let log = Self::log_mut(&mut partitions, partition_id);
        log.records.retain(|r| r.sequence > sequence);
        log.trimmed_through = Some(log.trimmed_through.map_or(sequence, |t| t.max(sequence)));
    }

    /// Fail every fetch on the partition after `pages` successful ones
    pub fn fail_fetch_after(&self, partition_id: &str, pages: usize) {
        let mut partitions = self.partitions.write();
        Self::log_mut(&mut partitions, partition_id).fail_fetch_after = Some(pages);
    }

    pub fn clear_faults(&self) {
        self.fail_listing.store(false, Ordering::SeqCst);
        for (_, log) in self.partitions.write().iter_mut() {
            log.fail_fetch_after = None;
            log.fetches = 0;
        }
    }

    pub fn set_fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    /// Retained records of a partition in arrival order
    pub fn records(&self, partition_id: &str) -> Vec<RawRecord> {
        self.partitions
            .read()
            .iter()
            .find(|(id, _)| id == partition_id)
            .map(|(_, log)| {
                log.records
                    .iter()
                    .map(|r| Self::to_raw(partition_id, r))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn log_mut<'a>(
        partitions: &'a mut Vec<(String, PartitionLog)>,
        partition_id: &str,
    ) -> &'a mut PartitionLog {
        let index = match partitions.iter().position(|(id, _)| id == partition_id) {
            Some(index) => index,
            None => {
                partitions.push((partition_id.to_string(), PartitionLog::default()));
                partitions.len() - 1
            }
        };
        &mut partitions[index].1
    }

    fn append(log: &mut PartitionLog, sequence: u64, payload: Bytes, partition_key: Option<String>) {
        log.last_sequence = sequence;
        log.records.push(StoredRecord {
            sequence,
            payload,
            partition_key,
            arrival: Utc::now(),
        });
    }

    fn to_raw(partition_id: &str, record: &StoredRecord) -> RawRecord {
        let mut raw = RawRecord::new(partition_id, record.sequence.to_string(), record.payload.clone())
            .with_arrival_timestamp(record.arrival);
        raw.partition_key = record.partition_key.clone();
        raw
    }

    fn parse_iterator(iterator: &str) -> Result<(&str, u64), StreamError> {
        iterator
            .rsplit_once(':')
            .and_then(|(partition_id, start)| Some((partition_id, start.parse().ok()?)))
            .ok_or_else(|| StreamError::rejected(format!("malformed iterator {iterator}")))
    }
}

#[async_trait]
impl StreamClient for InMemoryStream {
    async fn list_partitions(
        &self,
        _stream_name: &str,
        next_token: Option<&str>,
    ) -> Result<PartitionListing, StreamError> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(StreamError::transport("simulated listing failure"));
        }

        let start = match next_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| StreamError::rejected(format!("invalid listing token {token}")))?,
            None => 0,
        };

        let partitions = self.partitions.read();
        let end = (start + self.listing_page_size).min(partitions.len());
        let page = partitions
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .map(|(id, _)| StreamPartition::new(id))
            .collect();

        Ok(PartitionListing {
            partitions: page,
            next_token: (end < partitions.len()).then(|| end.to_string()),
        })
    }

    async fn partition_iterator(
        &self,
        _stream_name: &str,
        partition_id: &str,
        position: &StartPosition,
    ) -> Result<String, StreamError> {
        let partitions = self.partitions.read();
        let log = partitions
            .iter()
            .find(|(id, _)| id == partition_id)
            .map(|(_, log)| log)
            .ok_or_else(|| StreamError::rejected(format!("unknown partition {partition_id}")))?;

        let start = match position {
            StartPosition::TrimHorizon => log.first_retained(),
            StartPosition::AfterSequence(marker) => {
                let sequence: u64 = marker.parse().map_err(|_| {
                    StreamError::position_invalid(partition_id, format!("malformed marker {marker}"))
                })?;
                if log.trimmed_through.is_some_and(|t| sequence < t) {
                    return Err(StreamError::position_invalid(
                        partition_id,
                        format!("marker {marker} is older than the retention window"),
                    ));
                }
                if sequence > log.last_sequence {
                    return Err(StreamError::position_invalid(
                        partition_id,
                        format!("marker {marker} is beyond the partition head"),
                    ));
                }
                sequence + 1
            }
        };

        Ok(format!("{partition_id}:{start}"))
    }

    async fn fetch_page(
        &self,
        partition_id: &str,
        iterator: &str,
        limit: usize,
    ) -> Result<RecordPage, StreamError> {
        let (iterator_partition, start) = Self::parse_iterator(iterator)?;
        if iterator_partition != partition_id {
            return Err(StreamError::rejected(format!(
                "iterator {iterator} does not belong to partition {partition_id}"
            )));
        }

        let mut partitions = self.partitions.write();
        let log = partitions
            .iter_mut()
            .find(|(id, _)| id == partition_id)
            .map(|(_, log)| log)
            .ok_or_else(|| StreamError::rejected(format!("unknown partition {partition_id}")))?;

        if log.fail_fetch_after.is_some_and(|n| log.fetches >= n) {
            return Err(StreamError::transport("simulated fetch failure"));
        }
        log.fetches += 1;

        let start = start.max(log.first_retained());
        let records: Vec<RawRecord> = log
            .records
            .iter()
            .filter(|r| r.sequence >= start)
            .take(limit)
            .map(|r| Self::to_raw(partition_id, r))
            .collect();

        let next_start = log
            .records
            .iter()
            .filter(|r| r.sequence >= start)
            .take(limit)
            .last()
            .map_or(start, |r| r.sequence + 1);
        let behind = log
            .records
            .iter()
            .filter(|r| r.sequence >= next_start)
            .count();

        Ok(RecordPage {
            records,
            next_iterator: Some(format!("{partition_id}:{next_start}")),
            millis_behind_latest: Some(if behind == 0 { 0 } else { 1000 }),
        })
    }
}

#[async_trait]
impl StreamWriter for InMemoryStream {
    async fn put_records(
        &self,
        stream_name: &str,
        records: &[PublishRecord],
    ) -> Result<PutOutcome, StreamError> {
        let mut partitions = self.partitions.write();
        if partitions.is_empty() {
            return Err(StreamError::StreamNotFound {
                stream: stream_name.to_string(),
            });
        }

        for record in records {
            let mut hasher = DefaultHasher::new();
            record.partition_key.hash(&mut hasher);
            let index = (hasher.finish() % partitions.len() as u64) as usize;
            let log = &mut partitions[index].1;
            let sequence = log.last_sequence + 1;
            Self::append(
                log,
                sequence,
                record.data.clone(),
                Some(record.partition_key.clone()),
            );
        }

        Ok(PutOutcome {
            accepted: records.len(),
            failed: 0,
        })
    }
}

//! Amazon Kinesis Data Streams backend.

use async_trait::async_trait;
use aws_sdk_kinesis::error::{DisplayErrorContext, SdkError};
use aws_sdk_kinesis::operation::get_records::GetRecordsError;
use aws_sdk_kinesis::operation::get_shard_iterator::GetShardIteratorError;
use aws_sdk_kinesis::primitives::Blob;
use aws_sdk_kinesis::types::{PutRecordsRequestEntry, ShardIteratorType};
use aws_sdk_kinesis::Client;
use chrono::{DateTime, Utc};
use tracing::warn;

use super::{
    PartitionListing, PublishRecord, PutOutcome, RecordPage, StartPosition, StreamClient,
    StreamError, StreamWriter,
};
use crate::constants::limits;
use crate::models::{RawRecord, StreamPartition};

#[derive(Debug, Clone)]
pub struct KinesisStreamClient {
    client: Client,
}

impl KinesisStreamClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_conf(config: &aws_config::SdkConfig) -> Self {
        Self::new(Client::new(config))
    }

    fn to_chrono(timestamp: &aws_sdk_kinesis::primitives::DateTime) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(timestamp.secs(), timestamp.subsec_nanos())
    }
}

fn iterator_error(partition_id: &str, err: SdkError<GetShardIteratorError>) -> StreamError {
    let message = DisplayErrorContext(&err).to_string();
    match err.as_service_error() {
        Some(GetShardIteratorError::InvalidArgumentException(_)) => {
            StreamError::position_invalid(partition_id, message)
        }
        Some(GetShardIteratorError::ProvisionedThroughputExceededException(_)) => {
            StreamError::Throttled { message }
        }
        Some(GetShardIteratorError::ResourceNotFoundException(_)) => StreamError::rejected(message),
        _ => StreamError::transport(message),
    }
}

fn records_error(partition_id: &str, err: SdkError<GetRecordsError>) -> StreamError {
    let message = DisplayErrorContext(&err).to_string();
    match err.as_service_error() {
        Some(GetRecordsError::ExpiredIteratorException(_)) => StreamError::IteratorExpired {
            partition_id: partition_id.to_string(),
        },
        Some(GetRecordsError::ProvisionedThroughputExceededException(_)) => {
            StreamError::Throttled { message }
        }
        _ => StreamError::transport(message),
    }
}

#[async_trait]
impl StreamClient for KinesisStreamClient {
    async fn list_partitions(
        &self,
        stream_name: &str,
        next_token: Option<&str>,
    ) -> Result<PartitionListing, StreamError> {
        // ListShards rejects a stream name alongside a continuation token
        let request = match next_token {
            Some(token) => self.client.list_shards().next_token(token),
            None => self.client.list_shards().stream_name(stream_name),
        };

        let output = request.send().await.map_err(|e| {
            if e
                .as_service_error()
                .is_some_and(|s| s.is_resource_not_found_exception())
            {
                StreamError::StreamNotFound {
                    stream: stream_name.to_string(),
                }
            } else {
                StreamError::transport(DisplayErrorContext(&e).to_string())
            }
        })?;

        Ok(PartitionListing {
            partitions: output
                .shards()
                .iter()
                .map(|shard| StreamPartition::new(shard.shard_id()))
                .collect(),
            next_token: output.next_token().map(str::to_string),
        })
    }

    async fn partition_iterator(
        &self,
        stream_name: &str,
        partition_id: &str,
        position: &StartPosition,
    ) -> Result<String, StreamError> {
        let request = self
            .client
            .get_shard_iterator()
            .stream_name(stream_name)
            .shard_id(partition_id);

        let request = match position {
            StartPosition::TrimHorizon => request.shard_iterator_type(ShardIteratorType::TrimHorizon),
            StartPosition::AfterSequence(marker) => request
                .shard_iterator_type(ShardIteratorType::AfterSequenceNumber)
                .starting_sequence_number(marker),
        };

        let output = request
            .send()
            .await
            .map_err(|e| iterator_error(partition_id, e))?;

        output
            .shard_iterator()
            .map(str::to_string)
            .ok_or_else(|| StreamError::transport("GetShardIterator returned no iterator"))
    }

    async fn fetch_page(
        &self,
        partition_id: &str,
        iterator: &str,
        limit: usize,
    ) -> Result<RecordPage, StreamError> {
        let limit = limit.clamp(1, limits::MAX_PAGE_LIMIT) as i32;
        let output = self
            .client
            .get_records()
            .shard_iterator(iterator)
            .limit(limit)
            .send()
            .await
            .map_err(|e| records_error(partition_id, e))?;

        let records = output
            .records()
            .iter()
            .map(|record| {
                let mut raw = RawRecord::new(
                    partition_id,
                    record.sequence_number(),
                    record.data().as_ref().to_vec(),
                )
                .with_partition_key(record.partition_key());
                raw.arrival_timestamp = record
                    .approximate_arrival_timestamp()
                    .and_then(Self::to_chrono);
                raw
            })
            .collect();

        Ok(RecordPage {
            records,
            next_iterator: output.next_shard_iterator().map(str::to_string),
            millis_behind_latest: output.millis_behind_latest(),
        })
    }
}

#[async_trait]
impl StreamWriter for KinesisStreamClient {
    async fn put_records(
        &self,
        stream_name: &str,
        records: &[PublishRecord],
    ) -> Result<PutOutcome, StreamError> {
        let entries = records
            .iter()
            .map(|record| {
                PutRecordsRequestEntry::builder()
                    .data(Blob::new(record.data.to_vec()))
                    .partition_key(&record.partition_key)
                    .build()
                    .map_err(|e| StreamError::rejected(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let output = self
            .client
            .put_records()
            .stream_name(stream_name)
            .set_records(Some(entries))
            .send()
            .await
            .map_err(|e| StreamError::transport(DisplayErrorContext(&e).to_string()))?;

        let failed = output.failed_record_count().unwrap_or(0).max(0) as usize;
        if failed > 0 {
            warn!(stream = %stream_name, failed, "Kinesis rejected part of a put batch");
        }

        Ok(PutOutcome {
            accepted: records.len().saturating_sub(failed),
            failed,
        })
    }
}

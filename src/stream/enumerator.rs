use std::sync::Arc;
use tracing::{debug, error, instrument};

use super::StreamClient;
use crate::error::{IngestError, IngestResult};
use crate::models::StreamPartition;

/// Lists every partition of a stream, following listing pagination
#[derive(Clone)]
pub struct PartitionEnumerator {
    client: Arc<dyn StreamClient>,
}

impl PartitionEnumerator {
    pub fn new(client: Arc<dyn StreamClient>) -> Self {
        Self { client }
    }

    /// All partitions in listing order.
    ///
    /// Any failure, including one on a later listing page, fails the whole call;
    /// a partial listing is never returned.
    #[instrument(skip(self))]
    pub async fn list(&self, stream_name: &str) -> IngestResult<Vec<StreamPartition>> {
        let mut partitions = Vec::new();
        let mut next_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let listing = self
                .client
                .list_partitions(stream_name, next_token.as_deref())
                .await
                .map_err(|e| {
                    error!(stream = %stream_name, error = %e, "Partition listing failed");
                    IngestError::enumeration(stream_name, e.to_string())
                })?;
            pages += 1;
            partitions.extend(listing.partitions);

            match listing.next_token {
                Some(token) if next_token.as_deref() == Some(token.as_str()) => {
                    return Err(IngestError::enumeration(
                        stream_name,
                        format!("listing token {token} repeated"),
                    ));
                }
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        debug!(
            stream = %stream_name,
            partition_count = partitions.len(),
            listing_pages = pages,
            "Enumerated partitions"
        );
        Ok(partitions)
    }
}

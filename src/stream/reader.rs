//! Lazy page reader for a single partition.
//!
//! A [`PartitionPages`] is pulled one page at a time with
//! [`PartitionPages::next_page`]. It resolves its iterator on the first pull,
//! ends at the first empty page (the head of the partition at fetch time), and
//! ends after yielding the first fetch error. It is not restartable; the next
//! run opens a fresh reader from the committed checkpoint.

use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{StartPosition, StreamClient, StreamError};
use crate::error::{IngestError, IngestResult};
use crate::models::RawRecord;

/// Opens page readers against one stream
#[derive(Clone)]
pub struct PartitionReader {
    client: Arc<dyn StreamClient>,
    stream_name: String,
    page_limit: usize,
    deadline: Option<Instant>,
}

impl PartitionReader {
    pub fn new(client: Arc<dyn StreamClient>, stream_name: impl Into<String>, page_limit: usize) -> Self {
        Self {
            client,
            stream_name: stream_name.into(),
            page_limit,
            deadline: None,
        }
    }

    /// Bound every iterator request and page fetch by `deadline`
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Open `partition_id`, resuming strictly after `resume_from` when given
    pub fn open(&self, partition_id: impl Into<String>, resume_from: Option<String>) -> PartitionPages {
        PartitionPages {
            client: Arc::clone(&self.client),
            stream_name: self.stream_name.clone(),
            partition_id: partition_id.into(),
            page_limit: self.page_limit,
            deadline: self.deadline,
            resume_from,
            state: PagesState::Unopened,
            fell_back_to_trim_horizon: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PagesState {
    Unopened,
    Open(String),
    Finished,
}

/// Finite sequence of pages from one partition
pub struct PartitionPages {
    client: Arc<dyn StreamClient>,
    stream_name: String,
    partition_id: String,
    page_limit: usize,
    deadline: Option<Instant>,
    resume_from: Option<String>,
    state: PagesState,
    fell_back_to_trim_horizon: bool,
}

impl PartitionPages {
    pub fn partition_id(&self) -> &str {
        &self.partition_id
    }

    /// The resume marker was rejected and reading restarted at the oldest record
    pub fn fell_back_to_trim_horizon(&self) -> bool {
        self.fell_back_to_trim_horizon
    }

    pub fn is_finished(&self) -> bool {
        self.state == PagesState::Finished
    }

    /// Pull the next non-empty page.
    ///
    /// Returns `None` once the partition is drained. A fetch failure is yielded
    /// once as `Some(Err(TransientFetchError))`, after which the reader is finished.
    pub async fn next_page(&mut self) -> Option<IngestResult<Vec<RawRecord>>> {
        let iterator = match std::mem::replace(&mut self.state, PagesState::Finished) {
            PagesState::Finished => return None,
            PagesState::Open(iterator) => iterator,
            PagesState::Unopened => match self.resolve_iterator().await {
                Ok(iterator) => iterator,
                Err(e) => return Some(Err(self.fetch_error(e))),
            },
        };

        let fetch = self
            .client
            .fetch_page(&self.partition_id, &iterator, self.page_limit);
        let page = match self.bounded(fetch).await {
            Ok(page) => page,
            Err(e) => return Some(Err(self.fetch_error(e))),
        };

        if page.records.is_empty() {
            debug!(
                partition_id = %self.partition_id,
                millis_behind_latest = ?page.millis_behind_latest,
                "Empty page, partition drained"
            );
            return None;
        }

        if let Some(next) = page.next_iterator {
            self.state = PagesState::Open(next);
        }
        Some(Ok(page.records))
    }

    async fn resolve_iterator(&mut self) -> Result<String, StreamError> {
        let position = StartPosition::from_marker(self.resume_from.as_deref());
        debug!(
            partition_id = %self.partition_id,
            position = %position,
            "Resolving partition iterator"
        );

        let request = self
            .client
            .partition_iterator(&self.stream_name, &self.partition_id, &position);
        match self.bounded(request).await {
            Err(e) if e.is_position_invalid() && position != StartPosition::TrimHorizon => {
                warn!(
                    partition_id = %self.partition_id,
                    sequence_marker = ?self.resume_from,
                    error = %e,
                    "Resume marker rejected, re-reading partition from TRIM_HORIZON"
                );
                self.fell_back_to_trim_horizon = true;
                let retry = self.client.partition_iterator(
                    &self.stream_name,
                    &self.partition_id,
                    &StartPosition::TrimHorizon,
                );
                self.bounded(retry).await
            }
            other => other,
        }
    }

    async fn bounded<T, F>(&self, request: F) -> Result<T, StreamError>
    where
        F: Future<Output = Result<T, StreamError>>,
    {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(StreamError::DeadlineExceeded),
            Some(deadline) => tokio::time::timeout_at(deadline, request)
                .await
                .map_err(|_| StreamError::DeadlineExceeded)?,
            None => request.await,
        }
    }

    fn fetch_error(&self, error: StreamError) -> IngestError {
        IngestError::transient_fetch(&self.partition_id, error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::stream::InMemoryStream;
    use std::time::Duration;

    fn markers(records: &[RawRecord]) -> Vec<&str> {
        records.iter().map(|r| r.sequence_marker.as_str()).collect()
    }

    fn seeded(count: usize) -> Arc<InMemoryStream> {
        let stream = InMemoryStream::new();
        stream.create_partition("shard-a");
        for i in 0..count {
            stream.push("shard-a", format!("{{\"n\": {i}}}"));
        }
        Arc::new(stream)
    }

    #[tokio::test]
    async fn test_paginates_until_empty_page() {
        let stream = seeded(5);
        let reader = PartitionReader::new(stream.clone(), "orders", 2);
        let mut pages = reader.open("shard-a", None);

        let mut seen = Vec::new();
        let mut page_count = 0;
        while let Some(page) = pages.next_page().await {
            let page = page.unwrap();
            assert!(page.len() <= 2);
            seen.extend(page);
            page_count += 1;
        }

        assert_eq!(page_count, 3);
        assert_eq!(markers(&seen), ["1", "2", "3", "4", "5"]);
        assert!(pages.is_finished());
        assert!(pages.next_page().await.is_none());
    }

    #[tokio::test]
    async fn test_resume_is_exclusive() {
        let stream = seeded(4);
        let reader = PartitionReader::new(stream, "orders", 100);
        let mut pages = reader.open("shard-a", Some("2".to_string()));

        let page = pages.next_page().await.unwrap().unwrap();
        assert_eq!(markers(&page), ["3", "4"]);
        assert!(pages.next_page().await.is_none());
    }

    #[tokio::test]
    async fn test_resume_at_head_yields_nothing() {
        let stream = seeded(3);
        let reader = PartitionReader::new(stream, "orders", 100);
        let mut pages = reader.open("shard-a", Some("3".to_string()));
        assert!(pages.next_page().await.is_none());
    }

    #[tokio::test]
    async fn test_invalid_marker_falls_back_to_trim_horizon() {
        let stream = seeded(4);
        stream.trim_through("shard-a", 2);

        let reader = PartitionReader::new(stream, "orders", 100);
        let mut pages = reader.open("shard-a", Some("1".to_string()));

        let page = pages.next_page().await.unwrap().unwrap();
        assert_eq!(markers(&page), ["3", "4"]);
        assert!(pages.fell_back_to_trim_horizon());
    }

    #[tokio::test]
    async fn test_fetch_error_is_yielded_once() {
        let stream = seeded(5);
        stream.fail_fetch_after("shard-a", 1);

        let reader = PartitionReader::new(stream, "orders", 2);
        let mut pages = reader.open("shard-a", None);

        assert_eq!(pages.next_page().await.unwrap().unwrap().len(), 2);
        let err = pages.next_page().await.unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransientFetchError);
        assert!(pages.next_page().await.is_none());
    }

    #[tokio::test]
    async fn test_expired_deadline_is_transient() {
        let stream = seeded(2);
        let deadline = Instant::now() - Duration::from_millis(10);

        let reader = PartitionReader::new(stream, "orders", 100).with_deadline(deadline);
        let mut pages = reader.open("shard-a", None);
        let err = pages.next_page().await.unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransientFetchError);
    }
}

//! Resume semantics across consecutive runs.

mod common;

use common::{coordinator, delivered, key, pairs, STREAM};
use serde_json::json;
use std::sync::Arc;
use stream_ingest::checkpoint::{CheckpointStore, InMemoryCheckpointStore, SecretCheckpointStore};
use stream_ingest::config::ConsumerConfig;
use stream_ingest::models::Checkpoint;
use stream_ingest::secrets::{InMemorySecretStore, SecretDocument};
use stream_ingest::stream::InMemoryStream;

fn two_partition_stream() -> Arc<InMemoryStream> {
    let stream = Arc::new(InMemoryStream::new());
    stream.create_partition("A");
    stream.create_partition("B");
    for seq in [1, 2, 3] {
        stream.push_at("A", seq, format!("a{seq}"));
    }
    for seq in [10, 20] {
        stream.push_at("B", seq, format!("b{seq}"));
    }
    stream
}

#[tokio::test]
async fn test_cold_start_then_incremental_run() {
    let stream = two_partition_stream();
    let store = Arc::new(InMemoryCheckpointStore::new());
    let consumer = coordinator(&stream, &store, ConsumerConfig::default());

    let first = consumer.consume(STREAM, &key()).await.unwrap();
    assert_eq!(
        delivered(&first),
        pairs(&[("A", "1"), ("A", "2"), ("A", "3"), ("B", "10"), ("B", "20")])
    );

    let saved = store.get(&key()).unwrap();
    assert_eq!(saved.last_partition_id.as_deref(), Some("B"));
    assert_eq!(saved.last_sequence_marker.as_deref(), Some("20"));
    assert_eq!(saved.partitions.get("A").map(String::as_str), Some("3"));

    stream.push_at("A", 4, "a4");

    let second = consumer.consume(STREAM, &key()).await.unwrap();
    assert_eq!(delivered(&second), pairs(&[("A", "4")]));

    let saved = store.get(&key()).unwrap();
    assert_eq!(saved.last_partition_id.as_deref(), Some("A"));
    assert_eq!(saved.last_sequence_marker.as_deref(), Some("4"));
    assert_eq!(saved.partitions.get("B").map(String::as_str), Some("20"));
    assert_eq!(store.save_count(), 2);
}

#[tokio::test]
async fn test_empty_run_leaves_checkpoint_untouched() {
    let stream = two_partition_stream();
    let store = Arc::new(InMemoryCheckpointStore::new());
    let consumer = coordinator(&stream, &store, ConsumerConfig::default());

    consumer.consume(STREAM, &key()).await.unwrap();
    let committed = store.get(&key()).unwrap();

    let idle = consumer.consume(STREAM, &key()).await.unwrap();
    assert!(idle.is_empty());
    assert!(idle.checkpoint.is_none());
    assert_eq!(store.save_count(), 1);
    assert_eq!(store.get(&key()).unwrap(), committed);
}

#[tokio::test]
async fn test_no_record_delivered_twice_or_skipped() {
    let stream = Arc::new(InMemoryStream::new());
    stream.create_partition("shardId-000000000000");
    let store = Arc::new(InMemoryCheckpointStore::new());
    let consumer = coordinator(
        &stream,
        &store,
        ConsumerConfig {
            page_limit: 3,
            ..ConsumerConfig::default()
        },
    );

    let mut seen = Vec::new();
    for round in 0..4 {
        for i in 0..(round * 2 + 1) {
            stream.push("shardId-000000000000", format!("r{round}-{i}"));
        }
        let batch = consumer.consume(STREAM, &key()).await.unwrap();
        seen.extend(batch.records.into_iter().map(|r| r.sequence_marker));
    }

    let expected: Vec<String> = (1..=16).map(|n: u64| n.to_string()).collect();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn test_single_cursor_document_resumes_only_named_partition() {
    // A document holding only the globally-last cursor: partition A has no
    // position of its own and is read from the oldest retained record.
    let stream = two_partition_stream();
    stream.push_at("A", 4, "a4");

    let mut document = SecretDocument::new();
    document.insert("KINESIS_STREAM_NAME".into(), json!(STREAM));
    document.insert("last_shard_id".into(), json!("B"));
    document.insert("last_shard_sequence".into(), json!("20"));
    let secrets = Arc::new(InMemorySecretStore::new().with_secret(common::CHECKPOINT_KEY, document));
    let store = Arc::new(SecretCheckpointStore::new(secrets.clone()));

    let consumer = stream_ingest::consumer::ConsumerCoordinator::new(
        stream.clone(),
        store.clone(),
        ConsumerConfig::default(),
    );
    let batch = consumer.consume(STREAM, &key()).await.unwrap();
    assert_eq!(
        delivered(&batch),
        pairs(&[("A", "1"), ("A", "2"), ("A", "3"), ("A", "4")])
    );

    // the legacy cursor is folded into the per-partition map
    let saved = store.load(&key()).await.unwrap().unwrap();
    assert_eq!(saved.partitions.get("B").map(String::as_str), Some("20"));
    assert_eq!(saved.partitions.get("A").map(String::as_str), Some("4"));

    let document = secrets.snapshot(common::CHECKPOINT_KEY).unwrap();
    assert_eq!(document["KINESIS_STREAM_NAME"], STREAM);
    assert_eq!(document["last_shard_id"], "A");
    assert_eq!(document["last_shard_sequence"], "4");
}

#[tokio::test]
async fn test_expired_position_falls_back_to_oldest_retained() {
    let stream = Arc::new(InMemoryStream::new());
    for _ in 0..5 {
        stream.push("A", "x");
    }
    stream.trim_through("A", 3);

    let mut checkpoint = Checkpoint::default();
    checkpoint.partitions.insert("A".to_string(), "1".to_string());
    let store = Arc::new(InMemoryCheckpointStore::new().with_checkpoint(key(), checkpoint));
    let consumer = coordinator(&stream, &store, ConsumerConfig::default());

    let batch = consumer.consume(STREAM, &key()).await.unwrap();
    assert_eq!(delivered(&batch), pairs(&[("A", "4"), ("A", "5")]));
    assert!(batch.partitions[0].fell_back_to_trim_horizon);
    assert_eq!(batch.partitions[0].resumed_from.as_deref(), Some("1"));
}

#[tokio::test]
async fn test_concurrent_drain_keeps_enumeration_order() {
    let stream = Arc::new(InMemoryStream::new().with_listing_page_size(2));
    for partition in ["p0", "p1", "p2", "p3", "p4"] {
        stream.create_partition(partition);
        for i in 0..3 {
            stream.push(partition, format!("{partition}-{i}"));
        }
    }
    let store = Arc::new(InMemoryCheckpointStore::new());
    let consumer = coordinator(
        &stream,
        &store,
        ConsumerConfig {
            page_limit: 2,
            max_concurrent_partitions: 4,
            ..ConsumerConfig::default()
        },
    );

    let batch = consumer.consume(STREAM, &key()).await.unwrap();
    let partitions: Vec<&str> = batch
        .partitions
        .iter()
        .map(|p| p.partition_id.as_str())
        .collect();
    assert_eq!(partitions, ["p0", "p1", "p2", "p3", "p4"]);
    assert_eq!(batch.records.len(), 15);
    assert_eq!(batch.records[14].partition_id, "p4");

    let saved = store.get(&key()).unwrap();
    assert_eq!(saved.last_partition_id.as_deref(), Some("p4"));
    assert_eq!(saved.partitions.len(), 5);
}

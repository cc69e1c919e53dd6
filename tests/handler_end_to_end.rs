//! Whole-pipeline runs against the filesystem backends.

mod common;

use arrow::array::{Array, Float64Array, StringArray, TimestampMillisecondArray};
use bytes::Bytes;
use common::{bare_order_document, order_document, payload};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stream_ingest::config::IngestConfig;
use stream_ingest::error::ErrorKind;
use stream_ingest::handler::{Backends, IngestionHandler, InvocationEvent};
use stream_ingest::models::RunResult;
use stream_ingest::secrets::{FileSecretStore, SecretDocument, SecretStore};
use stream_ingest::sink::{decode_batches, InMemoryObjectStore};
use stream_ingest::stream::{LocalStreamClient, PublishRecord, StreamWriter};

const SECRET: &str = "kinesis-sequence_shard-secret";
const STREAM: &str = "orders";
const BUCKET: &str = "lake";

async fn write_secret(root: &Path, document: serde_json::Value) {
    let serde_json::Value::Object(document) = document else {
        panic!("secret must be an object");
    };
    FileSecretStore::new(root.join("secrets"))
        .put_secret(SECRET, &document)
        .await
        .unwrap();
}

async fn local_stream(root: &Path, partitions: usize) -> LocalStreamClient {
    let client = LocalStreamClient::new(root.join("streams"));
    client.create_stream(STREAM, partitions).await.unwrap();
    client
}

fn local_config(root: &Path) -> IngestConfig {
    let mut config = IngestConfig::default();
    config.backend.local_root = root.to_path_buf();
    config
}

fn parquet_files(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                found.extend(parquet_files(&path));
            } else if path.extension().is_some_and(|ext| ext == "parquet") {
                found.push(path);
            }
        }
    }
    found.sort();
    found
}

#[tokio::test]
async fn test_local_run_writes_both_datasets_then_goes_idle() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write_secret(
        root,
        json!({"KINESIS_STREAM_NAME": STREAM, "S3_BUCKET_NAME": BUCKET, "unrelated": "kept"}),
    )
    .await;

    let client = local_stream(root, 2).await;
    let records = vec![
        PublishRecord::new("65f0a1", payload(&order_document("65f0a1", 1))),
        PublishRecord::new("65f0a2", payload(&order_document("65f0a2", 2))),
        PublishRecord::new("65f0a3", payload(&bare_order_document("65f0a3"))),
        PublishRecord::new("junk", Bytes::from_static(b"{not json")),
    ];
    client.put_records(STREAM, &records).await.unwrap();

    let config = local_config(root);
    let handler = IngestionHandler::new(config.clone(), Backends::local(root));
    let result = handler.invoke(InvocationEvent::default()).await;

    let summary = result.summary().expect("run should succeed").clone();
    assert_eq!(summary.records_processed, 4);
    assert_eq!(summary.order_row_count, 3);
    assert_eq!(summary.creator_row_count, 2);
    assert_eq!(summary.dropped_record_count, 1);
    assert!(summary.order_object.as_deref().unwrap().starts_with("lake/order_Latest/"));
    assert!(summary
        .created_by_object
        .as_deref()
        .unwrap()
        .starts_with("lake/sales_Latest/"));

    let order_files = parquet_files(&root.join("objects/lake/order_Latest"));
    assert_eq!(order_files.len(), 1);
    let batches = decode_batches(Bytes::from(std::fs::read(&order_files[0]).unwrap())).unwrap();
    let orders = &batches[0];
    assert_eq!(orders.num_rows(), 3);

    let object_ids = orders
        .column_by_name("_id")
        .unwrap()
        .as_any()
        .downcast_ref::<StringArray>()
        .unwrap();
    let mut ids: Vec<&str> = (0..object_ids.len()).map(|i| object_ids.value(i)).collect();
    ids.sort();
    assert_eq!(ids, ["65f0a1", "65f0a2", "65f0a3"]);

    let totals = orders
        .column_by_name("total")
        .unwrap()
        .as_any()
        .downcast_ref::<Float64Array>()
        .unwrap();
    assert!((0..totals.len()).any(|i| totals.value(i) == 1520.5));

    let created_at = orders
        .column_by_name("createdAt")
        .unwrap()
        .as_any()
        .downcast_ref::<TimestampMillisecondArray>()
        .unwrap();
    assert_eq!(created_at.null_count(), 1);

    let creator_files = parquet_files(&root.join("objects/lake/sales_Latest"));
    assert_eq!(creator_files.len(), 1);
    let creators = decode_batches(Bytes::from(std::fs::read(&creator_files[0]).unwrap())).unwrap();
    assert_eq!(creators[0].num_rows(), 2);

    // the checkpoint lives beside the configuration in the secret document
    let document = FileSecretStore::new(root.join("secrets"))
        .get_secret(SECRET)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(document["unrelated"], "kept");
    assert!(document.contains_key("last_shard_id"));
    assert!(document.contains_key("last_shard_sequence"));

    // nothing new: success, no objects, checkpoint unchanged
    let idle = handler.invoke(InvocationEvent::default()).await;
    let idle_summary = idle.summary().expect("idle run should succeed");
    assert_eq!(idle_summary.records_processed, 0);
    assert!(idle_summary.order_object.is_none());
    assert_eq!(parquet_files(&root.join("objects")).len(), 2);

    let after_idle = FileSecretStore::new(root.join("secrets"))
        .get_secret(SECRET)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after_idle, document);
}

#[tokio::test]
async fn test_trigger_secret_name_is_honoured() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    FileSecretStore::new(root.join("secrets"))
        .put_secret("other-secret", &{
            let mut document = SecretDocument::new();
            document.insert("KINESIS_STREAM_NAME".into(), json!(STREAM));
            document.insert("S3_BUCKET_NAME".into(), json!(BUCKET));
            document
        })
        .await
        .unwrap();
    let client = local_stream(root, 1).await;
    client
        .put_records(STREAM, &[PublishRecord::new("a", payload(&order_document("a", 1)))])
        .await
        .unwrap();

    let handler = IngestionHandler::new(local_config(root), Backends::local(root));
    let event: InvocationEvent =
        serde_json::from_value(json!({"SECRETS_MANAGER_SECRET_NAME": "other-secret"})).unwrap();
    let result = handler.invoke(event).await;

    assert!(result.is_success(), "{result:?}");
    let document = FileSecretStore::new(root.join("secrets"))
        .get_secret("other-secret")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(document["last_shard_sequence"], "1");
}

#[tokio::test]
async fn test_missing_configuration_is_reported_by_key() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write_secret(root, json!({"KINESIS_STREAM_NAME": STREAM})).await;

    let handler = IngestionHandler::new(local_config(root), Backends::local(root));
    let result = handler.invoke(InvocationEvent::default()).await;

    let RunResult::Failure(failure) = result else {
        panic!("expected failure");
    };
    assert_eq!(failure.kind, ErrorKind::ConfigMissing);
    assert!(failure.message.contains("S3_BUCKET_NAME"));
    assert!(!failure.message.contains("KINESIS_STREAM_NAME"));
}

#[tokio::test]
async fn test_missing_stream_is_enumeration_error() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write_secret(root, json!({"KINESIS_STREAM_NAME": "absent", "S3_BUCKET_NAME": BUCKET})).await;

    let handler = IngestionHandler::new(local_config(root), Backends::local(root));
    let result = handler.invoke(InvocationEvent::default()).await;

    let RunResult::Failure(failure) = result else {
        panic!("expected failure");
    };
    assert_eq!(failure.kind, ErrorKind::EnumerationError);
}

#[tokio::test]
async fn test_upload_failure_fails_run_after_commit() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write_secret(root, json!({"KINESIS_STREAM_NAME": STREAM, "S3_BUCKET_NAME": BUCKET})).await;
    let client = local_stream(root, 1).await;
    client
        .put_records(STREAM, &[PublishRecord::new("a", payload(&order_document("a", 1)))])
        .await
        .unwrap();

    let objects = Arc::new(InMemoryObjectStore::new());
    objects.set_unavailable(true);
    let mut backends = Backends::local(root);
    backends.objects = objects.clone();

    let handler = IngestionHandler::new(local_config(root), backends);
    let result = handler.invoke(InvocationEvent::default()).await;

    let RunResult::Failure(failure) = result else {
        panic!("expected failure");
    };
    assert_eq!(failure.kind, ErrorKind::WriteError);
    assert!(failure.message.contains("order_data"));
    assert!(failure.message.contains("created_by_data"));
    assert!(objects.is_empty());

    // the checkpoint was committed before the upload was attempted
    let document = FileSecretStore::new(root.join("secrets"))
        .get_secret(SECRET)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(document["last_shard_sequence"], "1");
}

#[tokio::test]
async fn test_one_dataset_failing_does_not_block_the_other() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write_secret(root, json!({"KINESIS_STREAM_NAME": STREAM, "S3_BUCKET_NAME": BUCKET})).await;
    let client = local_stream(root, 1).await;
    client
        .put_records(STREAM, &[PublishRecord::new("a", payload(&order_document("a", 1)))])
        .await
        .unwrap();

    let objects = Arc::new(InMemoryObjectStore::new());
    objects.fail_prefix("sales_Latest/");
    let mut backends = Backends::local(root);
    backends.objects = objects.clone();

    let handler = IngestionHandler::new(local_config(root), backends);
    let result = handler.invoke(InvocationEvent::default()).await;

    let RunResult::Failure(failure) = result else {
        panic!("expected failure");
    };
    assert_eq!(failure.kind, ErrorKind::WriteError);
    assert!(failure.message.contains("created_by_data"));
    assert!(!failure.message.contains("order_data"));

    let keys = objects.keys(BUCKET);
    assert_eq!(keys.len(), 1);
    assert!(keys[0].starts_with("order_Latest/"));
    assert!(keys[0].contains("order_data_"));
    let body = objects.get(BUCKET, &keys[0]).unwrap();
    let rows: usize = decode_batches(body).unwrap().iter().map(|b| b.num_rows()).sum();
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn test_static_configuration_without_secret() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let client = local_stream(root, 1).await;
    client
        .put_records(STREAM, &[PublishRecord::new("a", payload(&bare_order_document("a")))])
        .await
        .unwrap();

    let mut config = local_config(root);
    config.pipeline.stream_name = Some(STREAM.to_string());
    config.pipeline.bucket = Some(BUCKET.to_string());
    config.sink.timestamped_folders = false;

    let objects = Arc::new(InMemoryObjectStore::new());
    let mut backends = Backends::local(root);
    backends.objects = objects.clone();

    let result = IngestionHandler::new(config, backends)
        .invoke(InvocationEvent::default())
        .await;
    let summary = result.summary().expect("run should succeed");
    assert_eq!(summary.order_row_count, 1);
    assert_eq!(summary.creator_row_count, 0);
    assert!(summary.created_by_object.is_none());

    let keys = objects.keys(BUCKET);
    assert_eq!(keys.len(), 1);
    assert!(keys[0].starts_with("order_Latest/order_data_"));
    assert!(keys[0].ends_with(".parquet"));
}

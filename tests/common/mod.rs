//! Shared fixtures for integration tests.

#![allow(dead_code)]

pub mod strategies;

use serde_json::{json, Value};
use std::sync::Arc;
use stream_ingest::checkpoint::InMemoryCheckpointStore;
use stream_ingest::config::ConsumerConfig;
use stream_ingest::consumer::{ConsumedBatch, ConsumerCoordinator};
use stream_ingest::models::CheckpointKey;
use stream_ingest::stream::InMemoryStream;

pub const CHECKPOINT_KEY: &str = "kinesis-sequence_shard-secret";
pub const STREAM: &str = "orders-stream";

pub fn key() -> CheckpointKey {
    CheckpointKey::new(CHECKPOINT_KEY)
}

/// An order document as it appears on the stream
pub fn order_document(oid: &str, order_number: u64) -> Value {
    json!({
        "_id": {"$oid": oid},
        "id": format!("ord-{order_number}"),
        "orderNumber": order_number.to_string(),
        "status": "DELIVERED",
        "dcName": "DC-NORTH",
        "villageName": "Kondapur",
        "total": 1520.5,
        "paidAmount": {"$numberDouble": "1000"},
        "invoiceNumber": {"$numberLong": "4411"},
        "isPrinted": true,
        "createdAt": {"$date": "2025-03-04T05:06:07.000Z"},
        "createdBy": {
            "_id": {"$oid": "5f0000000000000000000001"},
            "displayName": "Sales Rep",
            "role": "SR",
            "email": "rep@example.com",
            "userName": "rep1"
        }
    })
}

/// An order without a `createdBy` sub-document
pub fn bare_order_document(oid: &str) -> Value {
    json!({"_id": {"$oid": oid}, "status": "PENDING"})
}

pub fn payload(document: &Value) -> Vec<u8> {
    document.to_string().into_bytes()
}

pub fn coordinator(
    stream: &Arc<InMemoryStream>,
    store: &Arc<InMemoryCheckpointStore>,
    config: ConsumerConfig,
) -> ConsumerCoordinator {
    ConsumerCoordinator::new(stream.clone(), store.clone(), config)
}

/// `(partition_id, sequence_marker)` of every consumed record, in delivery order
pub fn delivered(batch: &ConsumedBatch) -> Vec<(String, String)> {
    batch
        .records
        .iter()
        .map(|r| (r.partition_id.clone(), r.sequence_marker.clone()))
        .collect()
}

pub fn pairs(expected: &[(&str, &str)]) -> Vec<(String, String)> {
    expected
        .iter()
        .map(|(p, m)| (p.to_string(), m.to_string()))
        .collect()
}

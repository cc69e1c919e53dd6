//! # Transformer
//!
//! Pure record -> rows projection. Each record yields at most one
//! [`OrderRow`] and at most one [`CreatorRow`]. A record whose payload cannot be
//! decoded yields neither; it is logged and counted, never fatal to the batch.

pub mod creator;
pub mod document;
pub mod order;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{IngestError, IngestResult};
use crate::models::{CreatorRow, OrderRow, RawRecord};

pub use document::Document;

/// Rows derived from one record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transformed {
    pub order: Option<OrderRow>,
    pub creator: Option<CreatorRow>,
}

impl Transformed {
    pub fn is_dropped(&self) -> bool {
        self.order.is_none()
    }
}

/// Rows derived from a batch, in record order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformedBatch {
    pub orders: Vec<OrderRow>,
    pub creators: Vec<CreatorRow>,
    pub dropped: usize,
}

/// Decode a payload into a JSON object
pub fn decode_payload(record: &RawRecord) -> IngestResult<Map<String, Value>> {
    let text = std::str::from_utf8(&record.payload)
        .map_err(|e| IngestError::decode(&record.sequence_marker, format!("payload is not UTF-8: {e}")))?;

    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(IngestError::decode(
            &record.sequence_marker,
            format!("payload is not a JSON object: {}", json_type(&other)),
        )),
        Err(e) => Err(IngestError::decode(
            &record.sequence_marker,
            format!("payload is not valid JSON: {e}"),
        )),
    }
}

/// Derive rows, or the reason the record has to be dropped
pub fn try_transform(record: &RawRecord) -> IngestResult<(OrderRow, Option<CreatorRow>)> {
    let fields = decode_payload(record)?;
    let doc = Document::new(&fields);

    // an absent or empty `_id` still yields rows; a wrapper without `$oid` does not
    if let Some(Value::Object(id)) = doc.get("_id") {
        if !id.contains_key("$oid") {
            return Err(IngestError::decode(
                &record.sequence_marker,
                "_id object has no $oid",
            ));
        }
    }
    let object_id = doc.object_id("_id").unwrap_or_default();

    let order = order::order_row(&doc, &object_id);
    let creator = creator::creator_row(&doc, &object_id);
    Ok((order, creator))
}

/// Derive rows from a record; malformed records yield no rows
pub fn transform(record: &RawRecord) -> Transformed {
    match try_transform(record) {
        Ok((order, creator)) => Transformed {
            order: Some(order),
            creator,
        },
        Err(e) => {
            warn!(
                partition_id = %record.partition_id,
                sequence_marker = %record.sequence_marker,
                error = %e,
                "Dropping record that could not be decoded"
            );
            Transformed::default()
        }
    }
}

/// Transform every record, keeping record order
pub fn transform_batch(records: &[RawRecord]) -> TransformedBatch {
    let mut batch = TransformedBatch::default();

    for record in records {
        let transformed = transform(record);
        if transformed.is_dropped() {
            batch.dropped += 1;
            continue;
        }
        batch.orders.extend(transformed.order);
        batch.creators.extend(transformed.creator);
    }

    debug!(
        records = records.len(),
        order_rows = batch.orders.len(),
        creator_rows = batch.creators.len(),
        dropped = batch.dropped,
        "Transformed batch"
    );
    batch
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

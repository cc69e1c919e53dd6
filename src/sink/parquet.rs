//! Parquet encoding for the output datasets.
//!
//! The column layout of each dataset is the contract with downstream readers:
//! column names match the upstream document field names, amounts are
//! `Float64`, counters `Int64`, and `createdAt` is a UTC millisecond timestamp.
//! Every dataset is encoded as one Snappy-compressed file holding a single
//! record batch.

use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray, TimestampMillisecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::errors::ParquetError;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;
use std::io::Cursor;
use std::sync::Arc;
use thiserror::Error;

use crate::constants::datasets;
use crate::models::{CreatorRow, OrderRow};

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("parquet error: {0}")]
    Parquet(#[from] ParquetError),
}

/// A row type with a fixed columnar layout
pub trait ColumnarRows: Sized {
    fn schema() -> Arc<Schema>;

    /// One array per schema field, in schema order
    fn columns(rows: &[Self]) -> Vec<ArrayRef>;
}

fn utf8(name: &str) -> Field {
    Field::new(name, DataType::Utf8, false)
}

fn float(name: &str) -> Field {
    Field::new(name, DataType::Float64, false)
}

fn strings<R>(rows: &[R], f: impl Fn(&R) -> &str) -> ArrayRef {
    Arc::new(StringArray::from(rows.iter().map(f).collect::<Vec<_>>()))
}

fn floats<R>(rows: &[R], f: impl Fn(&R) -> f64) -> ArrayRef {
    Arc::new(Float64Array::from(rows.iter().map(f).collect::<Vec<_>>()))
}

fn utc_millis() -> DataType {
    DataType::Timestamp(TimeUnit::Millisecond, Some("UTC".into()))
}

impl ColumnarRows for OrderRow {
    fn schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            utf8("id"),
            utf8("_id"),
            utf8("address"),
            float("balanceAmount"),
            utf8("bankName"),
            utf8("bankPaidAmount"),
            float("cashAmount"),
            float("cashSettled"),
            utf8("complete"),
            Field::new("createdAt", utc_millis(), true),
            utf8("dcName"),
            utf8("delivering"),
            utf8("deliveryAt"),
            float("diffAmt"),
            float("discountAmount"),
            utf8("dispatchAt"),
            float("invAmount"),
            utf8("invoice"),
            utf8("invoiceAt"),
            utf8("updatedAt"),
            Field::new("invoiceNumber", DataType::Int64, false),
            Field::new("isPrinted", DataType::Boolean, false),
            Field::new("orderNumber", DataType::Utf8, true),
            utf8("packed"),
            utf8("packedAt"),
            float("paidAmount"),
            float("prevBalance"),
            utf8("remarks"),
            float("returnAmount"),
            utf8("route"),
            utf8("status"),
            float("total"),
            utf8("vehicleNumber"),
            utf8("villageName"),
            utf8("created_on"),
            utf8("subTotal"),
            float("handlingFee"),
            Field::new("isCascaded", DataType::Boolean, false),
            utf8("cascadedAt"),
            utf8("cascadedOn"),
            Field::new("transactionId", DataType::Int64, false),
        ]))
    }

    fn columns(rows: &[Self]) -> Vec<ArrayRef> {
        let created_at = TimestampMillisecondArray::from(
            rows.iter()
                .map(|r| r.created_at.map(|t| t.timestamp_millis()))
                .collect::<Vec<_>>(),
        )
        .with_timezone("UTC");

        vec![
            strings(rows, |r| r.id.as_str()),
            strings(rows, |r| r.object_id.as_str()),
            strings(rows, |r| r.address.as_str()),
            floats(rows, |r| r.balance_amount),
            strings(rows, |r| r.bank_name.as_str()),
            strings(rows, |r| r.bank_paid_amount.as_str()),
            floats(rows, |r| r.cash_amount),
            floats(rows, |r| r.cash_settled),
            strings(rows, |r| r.complete.as_str()),
            Arc::new(created_at),
            strings(rows, |r| r.dc_name.as_str()),
            strings(rows, |r| r.delivering.as_str()),
            strings(rows, |r| r.delivery_at.as_str()),
            floats(rows, |r| r.diff_amt),
            floats(rows, |r| r.discount_amount),
            strings(rows, |r| r.dispatch_at.as_str()),
            floats(rows, |r| r.inv_amount),
            strings(rows, |r| r.invoice.as_str()),
            strings(rows, |r| r.invoice_at.as_str()),
            strings(rows, |r| r.updated_at.as_str()),
            Arc::new(Int64Array::from(
                rows.iter().map(|r| r.invoice_number).collect::<Vec<_>>(),
            )),
            Arc::new(BooleanArray::from(
                rows.iter().map(|r| r.is_printed).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                rows.iter()
                    .map(|r| r.order_number.as_deref())
                    .collect::<Vec<_>>(),
            )),
            strings(rows, |r| r.packed.as_str()),
            strings(rows, |r| r.packed_at.as_str()),
            floats(rows, |r| r.paid_amount),
            floats(rows, |r| r.prev_balance),
            strings(rows, |r| r.remarks.as_str()),
            floats(rows, |r| r.return_amount),
            strings(rows, |r| r.route.as_str()),
            strings(rows, |r| r.status.as_str()),
            floats(rows, |r| r.total),
            strings(rows, |r| r.vehicle_number.as_str()),
            strings(rows, |r| r.village_name.as_str()),
            strings(rows, |r| r.created_on.as_str()),
            strings(rows, |r| r.sub_total.as_str()),
            floats(rows, |r| r.handling_fee),
            Arc::new(BooleanArray::from(
                rows.iter().map(|r| r.is_cascaded).collect::<Vec<_>>(),
            )),
            strings(rows, |r| r.cascaded_at.as_str()),
            strings(rows, |r| r.cascaded_on.as_str()),
            Arc::new(Int64Array::from(
                rows.iter().map(|r| r.transaction_id).collect::<Vec<_>>(),
            )),
        ]
    }
}

impl ColumnarRows for CreatorRow {
    fn schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            utf8("order_id"),
            utf8("_id"),
            utf8("status"),
            utf8("dcName"),
            utf8("displayName"),
            utf8("role"),
            utf8("email"),
            utf8("roleName"),
            utf8("userName"),
            utf8("created_on"),
        ]))
    }

    fn columns(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            strings(rows, |r| r.order_id.as_str()),
            strings(rows, |r| r.object_id.as_str()),
            strings(rows, |r| r.status.as_str()),
            strings(rows, |r| r.dc_name.as_str()),
            strings(rows, |r| r.display_name.as_str()),
            strings(rows, |r| r.role.as_str()),
            strings(rows, |r| r.email.as_str()),
            strings(rows, |r| r.role_name.as_str()),
            strings(rows, |r| r.user_name.as_str()),
            strings(rows, |r| r.created_on.as_str()),
        ]
    }
}

fn writer_properties() -> WriterProperties {
    let created_by = KeyValue {
        key: "created_by".to_string(),
        value: Some(datasets::WRITER_CREATED_BY.to_string()),
    };
    WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_key_value_metadata(Some(vec![created_by]))
        .build()
}

/// Encode rows into an in-memory Parquet file
pub fn encode<R: ColumnarRows>(rows: &[R]) -> Result<Bytes, EncodeError> {
    let schema = R::schema();
    let batch = RecordBatch::try_new(Arc::clone(&schema), R::columns(rows))?;

    let mut cursor = Cursor::new(Vec::<u8>::new());
    let mut writer = ArrowWriter::try_new(&mut cursor, schema, Some(writer_properties()))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(Bytes::from(cursor.into_inner()))
}

/// Read every record batch back out of a Parquet file
pub fn decode_batches(bytes: Bytes) -> Result<Vec<RecordBatch>, EncodeError> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(bytes)?.build()?;
    let batches = reader.collect::<Result<Vec<_>, ArrowError>>()?;
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Array;
    use chrono::{DateTime, Utc};

    fn order(object_id: &str, created_at: Option<DateTime<Utc>>) -> OrderRow {
        OrderRow {
            id: "ORD".to_string(),
            object_id: object_id.to_string(),
            address: String::new(),
            balance_amount: 1.5,
            bank_name: String::new(),
            bank_paid_amount: String::new(),
            cash_amount: 0.0,
            cash_settled: 0.0,
            complete: String::new(),
            created_at,
            dc_name: "north".to_string(),
            delivering: String::new(),
            delivery_at: String::new(),
            diff_amt: 0.0,
            discount_amount: 0.0,
            dispatch_at: String::new(),
            inv_amount: 0.0,
            invoice: String::new(),
            invoice_at: String::new(),
            updated_at: String::new(),
            invoice_number: 7,
            is_printed: false,
            order_number: None,
            packed: String::new(),
            packed_at: String::new(),
            paid_amount: 0.0,
            prev_balance: 0.0,
            remarks: String::new(),
            return_amount: 0.0,
            route: String::new(),
            status: "open".to_string(),
            total: 10.0,
            vehicle_number: String::new(),
            village_name: String::new(),
            created_on: String::new(),
            sub_total: String::new(),
            handling_fee: 0.0,
            is_cascaded: false,
            cascaded_at: String::new(),
            cascaded_on: String::new(),
            transaction_id: 3,
        }
    }

    #[test]
    fn test_order_schema_matches_columns() {
        let rows = vec![order("a", None)];
        assert_eq!(OrderRow::schema().fields().len(), 41);
        assert_eq!(OrderRow::columns(&rows).len(), 41);
        assert_eq!(CreatorRow::schema().fields().len(), 10);
    }

    #[test]
    fn test_encode_and_read_back() {
        let created = DateTime::from_timestamp_millis(1_700_000_000_000);
        let rows = vec![order("a", created), order("b", None)];

        let bytes = encode(&rows).unwrap();
        assert_eq!(&bytes[..4], b"PAR1");

        let batches = decode_batches(bytes).unwrap();
        let total: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(total, 2);

        let batch = &batches[0];
        let ids = batch
            .column_by_name("_id")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(ids.value(0), "a");
        assert_eq!(ids.value(1), "b");

        let created_at = batch
            .column_by_name("createdAt")
            .unwrap()
            .as_any()
            .downcast_ref::<TimestampMillisecondArray>()
            .unwrap();
        assert_eq!(created_at.value(0), 1_700_000_000_000);
        assert!(created_at.is_null(1));

        let order_number = batch.column_by_name("orderNumber").unwrap();
        assert_eq!(order_number.null_count(), 2);
    }
}

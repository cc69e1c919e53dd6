//! # Output Rows
//!
//! The two flattened projections derived from an order event payload. Field
//! names serialize (and become Parquet column names) exactly as they appear in
//! the upstream documents so downstream queries keep working.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One order, flattened from the top level of the payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRow {
    pub id: String,
    #[serde(rename = "_id")]
    pub object_id: String,
    pub address: String,
    #[serde(rename = "balanceAmount")]
    pub balance_amount: f64,
    #[serde(rename = "bankName")]
    pub bank_name: String,
    #[serde(rename = "bankPaidAmount")]
    pub bank_paid_amount: String,
    #[serde(rename = "cashAmount")]
    pub cash_amount: f64,
    #[serde(rename = "cashSettled")]
    pub cash_settled: f64,
    pub complete: String,
    #[serde(rename = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "dcName")]
    pub dc_name: String,
    pub delivering: String,
    #[serde(rename = "deliveryAt")]
    pub delivery_at: String,
    #[serde(rename = "diffAmt")]
    pub diff_amt: f64,
    #[serde(rename = "discountAmount")]
    pub discount_amount: f64,
    #[serde(rename = "dispatchAt")]
    pub dispatch_at: String,
    #[serde(rename = "invAmount")]
    pub inv_amount: f64,
    pub invoice: String,
    #[serde(rename = "invoiceAt")]
    pub invoice_at: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
    #[serde(rename = "invoiceNumber")]
    pub invoice_number: i64,
    #[serde(rename = "isPrinted")]
    pub is_printed: bool,
    #[serde(rename = "orderNumber")]
    pub order_number: Option<String>,
    pub packed: String,
    #[serde(rename = "packedAt")]
    pub packed_at: String,
    #[serde(rename = "paidAmount")]
    pub paid_amount: f64,
    #[serde(rename = "prevBalance")]
    pub prev_balance: f64,
    pub remarks: String,
    #[serde(rename = "returnAmount")]
    pub return_amount: f64,
    pub route: String,
    pub status: String,
    pub total: f64,
    #[serde(rename = "vehicleNumber")]
    pub vehicle_number: String,
    #[serde(rename = "villageName")]
    pub village_name: String,
    pub created_on: String,
    #[serde(rename = "subTotal")]
    pub sub_total: String,
    #[serde(rename = "handlingFee")]
    pub handling_fee: f64,
    #[serde(rename = "isCascaded")]
    pub is_cascaded: bool,
    #[serde(rename = "cascadedAt")]
    pub cascaded_at: String,
    #[serde(rename = "cascadedOn")]
    pub cascaded_on: String,
    #[serde(rename = "transactionId")]
    pub transaction_id: i64,
}

/// The user that created an order, keyed back to the order by `order_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatorRow {
    pub order_id: String,
    #[serde(rename = "_id")]
    pub object_id: String,
    pub status: String,
    #[serde(rename = "dcName")]
    pub dc_name: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub role: String,
    pub email: String,
    #[serde(rename = "roleName")]
    pub role_name: String,
    #[serde(rename = "userName")]
    pub user_name: String,
    pub created_on: String,
}

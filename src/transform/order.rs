use super::document::Document;
use crate::models::OrderRow;

/// Flatten the top level of an order document.
///
/// `object_id` is the already-resolved `_id`.
pub fn order_row(doc: &Document<'_>, object_id: &str) -> OrderRow {
    OrderRow {
        id: doc.text("id"),
        object_id: object_id.to_string(),
        address: doc.text("address"),
        balance_amount: doc.number("balanceAmount"),
        bank_name: doc.text("bankName"),
        bank_paid_amount: doc.text("bankPaidAmount"),
        cash_amount: doc.number("cashAmount"),
        cash_settled: doc.number("cashSettled"),
        complete: doc.text("complete"),
        created_at: doc.epoch_millis("createdAt"),
        dc_name: doc.text("dcName"),
        delivering: doc.text("delivering"),
        delivery_at: doc.text("deliveryAt"),
        diff_amt: doc.number("diffAmt"),
        discount_amount: doc.number("discountAmount"),
        dispatch_at: doc.text("dispatchAt"),
        inv_amount: doc.number("invAmount"),
        invoice: doc.text("invoice"),
        invoice_at: doc.text("invoiceAt"),
        updated_at: doc.text("updatedAt"),
        invoice_number: doc.integer("invoiceNumber"),
        is_printed: doc.flag("isPrinted"),
        order_number: doc.opt_text("orderNumber"),
        packed: doc.text("packed"),
        packed_at: doc.text("packedAt"),
        paid_amount: doc.number("paidAmount"),
        prev_balance: doc.number("prevBalance"),
        remarks: doc.text("remarks"),
        return_amount: doc.number("returnAmount"),
        route: doc.text("route"),
        status: doc.text("status"),
        total: doc.number("total"),
        vehicle_number: doc.text("vehicleNumber"),
        village_name: doc.text("villageName"),
        created_on: doc.text("created_on"),
        sub_total: doc.text("subTotal"),
        handling_fee: doc.number("handlingFee"),
        is_cascaded: doc.flag("isCascaded"),
        cascaded_at: doc.text("cascadedAt"),
        cascaded_on: doc.text("cascadedOn"),
        transaction_id: doc.integer("transactionId"),
    }
}

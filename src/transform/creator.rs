use super::document::Document;
use crate::models::CreatorRow;

/// Project the `createdBy` sub-document, if the order carries a non-empty one
pub fn creator_row(doc: &Document<'_>, order_id: &str) -> Option<CreatorRow> {
    let created_by = doc.object("createdBy")?;

    Some(CreatorRow {
        order_id: order_id.to_string(),
        object_id: created_by.object_id("_id").unwrap_or_default(),
        status: created_by.text("status"),
        dc_name: created_by.text("dcName"),
        display_name: created_by.text("displayName"),
        role: created_by.text("role"),
        email: created_by.text("email"),
        role_name: created_by.text("roleName"),
        user_name: created_by.text("userName"),
        created_on: created_by.text("created_on"),
    })
}

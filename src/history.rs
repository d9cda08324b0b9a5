use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{is_valid_status, Document, NewDocumentHistory};
use crate::schema::{document_history, documents};

pub const REASON_CREATED: &str = "created";
pub const REASON_STATUS_UPDATED: &str = "status updated";

/// Audit row for a freshly created document: previous status is null.
pub fn record_creation(conn: &mut PgConnection, document: &Document) -> QueryResult<()> {
    let entry = NewDocumentHistory {
        id: Uuid::new_v4(),
        document_id: document.id,
        previous_status: None,
        new_status: document.status.clone(),
        changed_by: document.created_by,
        change_reason: Some(REASON_CREATED.to_string()),
    };
    diesel::insert_into(document_history::table)
        .values(&entry)
        .execute(conn)?;
    Ok(())
}

/// Moves a document to `new_status` and appends exactly one audit row, both
/// in the same transaction. Any status may follow any other — the history is
/// an audit trail, not a guard. Saving the same status again writes nothing
/// and returns `false`.
pub fn change_status(
    conn: &mut PgConnection,
    document_id: Uuid,
    new_status: &str,
    changed_by: Option<Uuid>,
    reason: Option<&str>,
) -> AppResult<bool> {
    if !is_valid_status(new_status) {
        return Err(AppError::bad_request(format!(
            "invalid status '{new_status}'"
        )));
    }

    conn.transaction::<bool, AppError, _>(|conn| {
        let document: Document = documents::table.find(document_id).first(conn)?;

        if document.status == new_status {
            return Ok(false);
        }

        let now = Utc::now().naive_utc();
        diesel::update(documents::table.find(document_id))
            .set((
                documents::status.eq(new_status),
                documents::updated_at.eq(now),
            ))
            .execute(conn)?;

        let entry = NewDocumentHistory {
            id: Uuid::new_v4(),
            document_id,
            previous_status: Some(document.status),
            new_status: new_status.to_string(),
            changed_by,
            change_reason: Some(reason.unwrap_or(REASON_STATUS_UPDATED).to_string()),
        };
        diesel::insert_into(document_history::table)
            .values(&entry)
            .execute(conn)?;

        Ok(true)
    })
}

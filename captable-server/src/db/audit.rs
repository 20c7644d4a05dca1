//! Append-only document audit log

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::models::{AuditAction, AuditLogEntry};
use crate::error::CapTableError;

pub fn append(
    conn: &Connection,
    document_id: &str,
    actor_id: &str,
    action: AuditAction,
    details: serde_json::Value,
    now: DateTime<Utc>,
) -> Result<AuditLogEntry, CapTableError> {
    let entry = AuditLogEntry {
        id: uuid::Uuid::new_v4().to_string(),
        document_id: document_id.to_string(),
        actor_id: actor_id.to_string(),
        action,
        details,
        created_at: now,
    };

    conn.execute(
        "INSERT INTO document_audit_log (id, document_id, actor_id, action, details, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            entry.id,
            entry.document_id,
            entry.actor_id,
            entry.action.as_str(),
            entry.details,
            entry.created_at,
        ],
    )?;

    Ok(entry)
}

/// Entries for a document in insertion order. For operators and tests.
pub fn list_for_document(conn: &Connection, document_id: &str) -> Result<Vec<AuditLogEntry>, CapTableError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM document_audit_log WHERE document_id = ?1 ORDER BY rowid",
    )?;
    let rows = stmt.query_map(params![document_id], AuditLogEntry::from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

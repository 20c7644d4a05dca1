//! Document rows

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::models::{Document, DocumentStatus};
use crate::error::CapTableError;

pub fn insert_document(conn: &Connection, doc: &Document) -> Result<(), CapTableError> {
    conn.execute(
        "INSERT INTO documents (id, company_id, title, description, file_path, signed_file_path,
            file_name, file_size, file_type, uploaded_by, requires_all_signatures, status,
            created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            doc.id,
            doc.company_id,
            doc.title,
            doc.description,
            doc.file_path,
            doc.signed_file_path,
            doc.file_name,
            doc.file_size,
            doc.file_type,
            doc.uploaded_by,
            doc.requires_all_signatures,
            doc.status.as_str(),
            doc.created_at,
            doc.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_document(conn: &Connection, id: &str) -> Result<Option<Document>, CapTableError> {
    Ok(conn
        .query_row("SELECT * FROM documents WHERE id = ?1", params![id], Document::from_row)
        .optional()?)
}

/// Newest first.
pub fn list_company_documents(conn: &Connection, company_id: &str) -> Result<Vec<Document>, CapTableError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM documents WHERE company_id = ?1 ORDER BY created_at DESC, id DESC",
    )?;
    let rows = stmt.query_map(params![company_id], Document::from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Move an open document (`pending` or `partially_signed`) to `status`.
///
/// Returns 0 when the document was already closed, so only one caller
/// observes the transition to `fully_signed`.
pub fn advance_status(
    conn: &Connection,
    id: &str,
    status: DocumentStatus,
    now: DateTime<Utc>,
) -> Result<usize, CapTableError> {
    Ok(conn.execute(
        "UPDATE documents SET status = ?2, updated_at = ?3
         WHERE id = ?1 AND status IN ('pending', 'partially_signed')",
        params![id, status.as_str(), now],
    )?)
}

/// Record the signed variant and confirm `fully_signed`.
pub fn set_signed_artifact(
    conn: &Connection,
    id: &str,
    signed_file_path: &str,
    now: DateTime<Utc>,
) -> Result<usize, CapTableError> {
    Ok(conn.execute(
        "UPDATE documents SET signed_file_path = ?2, status = 'fully_signed', updated_at = ?3 WHERE id = ?1",
        params![id, signed_file_path, now],
    )?)
}

pub fn delete_document(conn: &Connection, id: &str) -> Result<usize, CapTableError> {
    Ok(conn.execute("DELETE FROM documents WHERE id = ?1", params![id])?)
}

/// Fully signed PDFs that require signatures but have no signed variant.
pub fn missing_signed_variants(conn: &Connection) -> Result<Vec<Document>, CapTableError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM documents
         WHERE requires_all_signatures = 1
           AND status = 'fully_signed'
           AND signed_file_path IS NULL
           AND lower(file_type) = 'application/pdf'
         ORDER BY created_at, id",
    )?;
    let rows = stmt.query_map([], Document::from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

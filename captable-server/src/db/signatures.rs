//! Signature request rows
//!
//! Transitions out of `pending` are conditional updates: a second writer
//! racing on the same request sees zero affected rows.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::models::{display_name, PendingSignature, Profile, SignatureRequest, SignerRecord};
use crate::error::CapTableError;

pub fn insert_request(conn: &Connection, request: &SignatureRequest) -> Result<(), CapTableError> {
    conn.execute(
        "INSERT INTO document_signatures (id, document_id, company_id, signer_id, position, status,
            signature_data, signed_at, declined_at, decline_reason, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            request.id,
            request.document_id,
            request.company_id,
            request.signer_id,
            request.position,
            request.status.as_str(),
            request.signature_data,
            request.signed_at,
            request.declined_at,
            request.decline_reason,
            request.created_at,
        ],
    )?;
    Ok(())
}

pub fn get_request(conn: &Connection, id: &str) -> Result<Option<SignatureRequest>, CapTableError> {
    Ok(conn
        .query_row(
            "SELECT * FROM document_signatures WHERE id = ?1",
            params![id],
            SignatureRequest::from_row,
        )
        .optional()?)
}

/// All requests of a document in signer-list order.
pub fn list_for_document(conn: &Connection, document_id: &str) -> Result<Vec<SignatureRequest>, CapTableError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM document_signatures WHERE document_id = ?1 ORDER BY position, id",
    )?;
    let rows = stmt.query_map(params![document_id], SignatureRequest::from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Requests of a document joined with signer profiles, in signer-list order.
pub fn signer_records(conn: &Connection, document_id: &str) -> Result<Vec<SignerRecord>, CapTableError> {
    let mut stmt = conn.prepare(
        "SELECT s.*, p.id AS profile_id, p.email AS profile_email, p.full_name AS profile_full_name
         FROM document_signatures s
         LEFT JOIN profiles p ON p.id = s.signer_id
         WHERE s.document_id = ?1
         ORDER BY s.position, s.id",
    )?;
    let rows = stmt.query_map(params![document_id], |row| {
        let request = SignatureRequest::from_row(row)?;
        let profile = match row.get::<_, Option<String>>("profile_id")? {
            Some(id) => Some(Profile {
                id,
                email: row.get("profile_email")?,
                full_name: row.get("profile_full_name")?,
            }),
            None => None,
        };
        Ok(SignerRecord {
            signer_name: display_name(profile.as_ref()),
            signer_email: profile.map(|p| p.email).unwrap_or_default(),
            request,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// `pending → signed`. Returns 0 when the request was no longer pending.
pub fn mark_signed(
    conn: &Connection,
    id: &str,
    signature_data: &str,
    signed_at: DateTime<Utc>,
) -> Result<usize, CapTableError> {
    Ok(conn.execute(
        "UPDATE document_signatures SET status = 'signed', signature_data = ?2, signed_at = ?3
         WHERE id = ?1 AND status = 'pending'",
        params![id, signature_data, signed_at],
    )?)
}

/// `pending → declined`. Returns 0 when the request was no longer pending.
pub fn mark_declined(
    conn: &Connection,
    id: &str,
    reason: &str,
    declined_at: DateTime<Utc>,
) -> Result<usize, CapTableError> {
    Ok(conn.execute(
        "UPDATE document_signatures SET status = 'declined', decline_reason = ?2, declined_at = ?3
         WHERE id = ?1 AND status = 'pending'",
        params![id, reason, declined_at],
    )?)
}

/// Pending requests of a signer across all companies, newest first.
pub fn pending_for_signer(conn: &Connection, signer_id: &str) -> Result<Vec<PendingSignature>, CapTableError> {
    let mut stmt = conn.prepare(
        "SELECT s.*, d.title AS document_title, d.description AS document_description,
                d.file_name AS document_file_name, c.name AS company_name
         FROM document_signatures s
         JOIN documents d ON d.id = s.document_id
         JOIN companies c ON c.id = d.company_id
         WHERE s.signer_id = ?1 AND s.status = 'pending'
         ORDER BY s.created_at DESC, s.id",
    )?;
    let rows = stmt.query_map(params![signer_id], |row| {
        Ok(PendingSignature {
            request: SignatureRequest::from_row(row)?,
            document_title: row.get("document_title")?,
            document_description: row.get("document_description")?,
            file_name: row.get("document_file_name")?,
            company_name: row.get("company_name")?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Pending requests of a signer within one company.
pub fn pending_in_company(
    conn: &Connection,
    company_id: &str,
    signer_id: &str,
) -> Result<Vec<SignatureRequest>, CapTableError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM document_signatures
         WHERE company_id = ?1 AND signer_id = ?2 AND status = 'pending'
         ORDER BY created_at, id",
    )?;
    let rows = stmt.query_map(params![company_id, signer_id], SignatureRequest::from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

//! Typed rows for the document workflow tables
//!
//! Status columns are parsed once here; the rest of the crate only sees
//! enums and `Option`s.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use equity::{EquityError, ShareCalculationMethod};
use rusqlite::Row;
use serde::Serialize;

equity::string_enum! {
    /// Lifecycle of an uploaded document.
    pub enum DocumentStatus {
        Pending => "pending",
        PartiallySigned => "partially_signed",
        FullySigned => "fully_signed",
        Cancelled => "cancelled",
    }
}

equity::string_enum! {
    /// Per-signer request state. `Signed` and `Declined` are terminal.
    pub enum SignatureStatus {
        Pending => "pending",
        Signed => "signed",
        Declined => "declined",
    }
}

equity::string_enum! {
    pub enum AuditAction {
        Uploaded => "uploaded",
        Signed => "signed",
        Declined => "declined",
        SignedPdfGenerated => "signed_pdf_generated",
        SignedPdfRegenerated => "signed_pdf_regenerated",
    }
}

equity::string_enum! {
    pub enum MemberRole {
        Owner => "owner",
        BoardMember => "board_member",
    }
}

equity::string_enum! {
    pub enum MemberStatus {
        Pending => "pending",
        Active => "active",
        Removed => "removed",
    }
}

/// Read a string-coded enum column.
pub(crate) fn enum_column<T>(row: &Row<'_>, column: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = EquityError>,
{
    let text: String = row.get(column)?;
    text.parse().map_err(|e: EquityError| {
        let index = row.as_ref().column_index(column).unwrap_or(0);
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
}

impl Profile {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            email: row.get("email")?,
            full_name: row.get("full_name")?,
        })
    }
}

/// Name printed for a signer: full name, else email, else `Unknown`.
pub fn display_name(profile: Option<&Profile>) -> String {
    profile
        .and_then(|p| {
            p.full_name
                .as_deref()
                .filter(|n| !n.trim().is_empty())
                .or(Some(p.email.as_str()).filter(|e| !e.is_empty()))
        })
        .unwrap_or("Unknown")
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Company {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub authorized_shares: Option<i64>,
    pub share_calculation_method: ShareCalculationMethod,
    pub created_at: DateTime<Utc>,
}

impl Company {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            owner_id: row.get("owner_id")?,
            authorized_shares: row.get("authorized_shares")?,
            share_calculation_method: enum_column(row, "share_calculation_method")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyMember {
    pub id: String,
    pub company_id: String,
    pub user_id: String,
    pub role: MemberRole,
    pub status: MemberStatus,
    pub invited_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CompanyMember {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            company_id: row.get("company_id")?,
            user_id: row.get("user_id")?,
            role: enum_column(row, "role")?,
            status: enum_column(row, "status")?,
            invited_by: row.get("invited_by")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: String,
    pub company_id: String,
    pub title: String,
    pub description: Option<String>,
    pub file_path: String,
    /// Set only once a signed variant has been generated.
    pub signed_file_path: Option<String>,
    pub file_name: String,
    pub file_size: i64,
    pub file_type: String,
    pub uploaded_by: String,
    pub requires_all_signatures: bool,
    pub status: DocumentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            company_id: row.get("company_id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            file_path: row.get("file_path")?,
            signed_file_path: row.get("signed_file_path")?,
            file_name: row.get("file_name")?,
            file_size: row.get("file_size")?,
            file_type: row.get("file_type")?,
            uploaded_by: row.get("uploaded_by")?,
            requires_all_signatures: row.get("requires_all_signatures")?,
            status: enum_column(row, "status")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Whether a signature page can be appended to this file type.
    pub fn supports_signature_page(&self) -> bool {
        signature_page::supports_mime_type(&self.file_type)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignatureRequest {
    pub id: String,
    pub document_id: String,
    pub company_id: String,
    pub signer_id: String,
    /// Order of the signer in the upload's signer list.
    pub position: i64,
    pub status: SignatureStatus,
    #[serde(skip_serializing)]
    pub signature_data: Option<String>,
    pub signed_at: Option<DateTime<Utc>>,
    pub declined_at: Option<DateTime<Utc>>,
    pub decline_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SignatureRequest {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            document_id: row.get("document_id")?,
            company_id: row.get("company_id")?,
            signer_id: row.get("signer_id")?,
            position: row.get("position")?,
            status: enum_column(row, "status")?,
            signature_data: row.get("signature_data")?,
            signed_at: row.get("signed_at")?,
            declined_at: row.get("declined_at")?,
            decline_reason: row.get("decline_reason")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// A request joined with its signer's profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignerRecord {
    #[serde(flatten)]
    pub request: SignatureRequest,
    pub signer_name: String,
    pub signer_email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentWithSignatures {
    #[serde(flatten)]
    pub document: Document,
    pub signatures: Vec<SignerRecord>,
}

/// A pending request of the acting signer, with context for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingSignature {
    #[serde(flatten)]
    pub request: SignatureRequest,
    pub document_title: String,
    pub document_description: Option<String>,
    pub file_name: String,
    pub company_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditLogEntry {
    pub id: String,
    pub document_id: String,
    pub actor_id: String,
    pub action: AuditAction,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            document_id: row.get("document_id")?,
            actor_id: row.get("actor_id")?,
            action: enum_column(row, "action")?,
            details: row.get("details")?,
            created_at: row.get("created_at")?,
        })
    }
}

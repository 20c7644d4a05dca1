//! Document and signature workflow
//!
//! Upload stores the blob first and then writes the document with its
//! signature requests in one transaction; if that fails the blob is
//! removed again. Signing and declining are conditional on the request
//! still being pending, so concurrent attempts resolve to one winner and
//! one `Conflict`.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::artifact::{ArtifactService, ArtifactTrigger};
use super::events::{CapTableEvent, EventBus};
use super::{owned_company, record_audit, visible_company, ServiceSettings};
use crate::db::{
    companies, documents, signatures, AuditAction, CapTableDb, Document, DocumentStatus, DocumentWithSignatures,
    PendingSignature, SignatureRequest, SignatureStatus,
};
use crate::document_store::{DocumentStore, SignedUrl};
use crate::error::CapTableError;
use crate::ledger::{self, SignatureAction};
use crate::principal::ActingPrincipal;

const MAX_TITLE_LEN: usize = 500;

/// A new document and who must sign it.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub company_id: String,
    pub title: String,
    pub description: Option<String>,
    pub file_name: String,
    pub file_type: String,
    pub file_bytes: Vec<u8>,
    pub requires_signature: bool,
    /// Ignored unless `requires_signature` is set.
    pub signer_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignOutcome {
    pub request: SignatureRequest,
    pub document_status: DocumentStatus,
    /// Set when this signature completed the document and the signed
    /// variant was stored.
    pub signed_file_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteReport {
    pub document_id: String,
    /// Blob paths that could not be removed. The row is deleted regardless.
    pub orphaned_paths: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileVariant {
    #[default]
    Original,
    Signed,
}

pub struct DocumentService {
    db: Arc<CapTableDb>,
    store: Arc<dyn DocumentStore>,
    artifacts: Arc<ArtifactService>,
    events: Arc<EventBus>,
    settings: ServiceSettings,
}

impl DocumentService {
    pub fn new(
        db: Arc<CapTableDb>,
        store: Arc<dyn DocumentStore>,
        artifacts: Arc<ArtifactService>,
        events: Arc<EventBus>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            db,
            store,
            artifacts,
            events,
            settings,
        }
    }

    /// Upload a document, optionally requesting signatures from board members.
    pub async fn upload(&self, principal: &ActingPrincipal, request: UploadRequest) -> Result<Document, CapTableError> {
        let title = request.title.trim().to_string();
        if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
            return Err(CapTableError::Validation(format!(
                "title must be 1-{} characters",
                MAX_TITLE_LEN
            )));
        }
        if request.file_name.trim().is_empty() {
            return Err(CapTableError::Validation("file name is required".into()));
        }
        if request.file_type.trim().is_empty() {
            return Err(CapTableError::Validation("file type is required".into()));
        }
        if request.file_bytes.is_empty() {
            return Err(CapTableError::Validation("file is empty".into()));
        }
        if request.file_bytes.len() > self.settings.max_upload_bytes {
            return Err(CapTableError::Validation(format!(
                "file exceeds {} bytes",
                self.settings.max_upload_bytes
            )));
        }

        let signer_ids = if request.requires_signature {
            let ids = dedupe(&request.signer_ids);
            if ids.is_empty() {
                return Err(CapTableError::Validation(
                    "at least one signer is required".into(),
                ));
            }
            ids
        } else {
            Vec::new()
        };

        self.db.with_conn(|conn| {
            owned_company(conn, &request.company_id, principal)?;
            for signer_id in &signer_ids {
                if !companies::is_active_board_member(conn, &request.company_id, signer_id)? {
                    return Err(CapTableError::Validation(format!(
                        "{} is not an active board member",
                        signer_id
                    )));
                }
            }
            Ok(())
        })?;

        let now = Utc::now();
        let file_path = storage_path(&request.company_id, &request.file_name, now.timestamp_millis());
        self.store
            .put(&file_path, &request.file_bytes, &request.file_type)
            .await
            .map_err(|e| CapTableError::Dependency(format!("upload failed: {}", e)))?;

        let document = Document {
            id: uuid::Uuid::new_v4().to_string(),
            company_id: request.company_id.clone(),
            title,
            description: request.description.filter(|d| !d.trim().is_empty()),
            file_path: file_path.clone(),
            signed_file_path: None,
            file_name: request.file_name.clone(),
            file_size: request.file_bytes.len() as i64,
            file_type: request.file_type.clone(),
            uploaded_by: principal.user_id().to_string(),
            requires_all_signatures: request.requires_signature,
            status: if request.requires_signature {
                DocumentStatus::Pending
            } else {
                DocumentStatus::FullySigned
            },
            created_at: now,
            updated_at: now,
        };

        let requests: Vec<SignatureRequest> = signer_ids
            .iter()
            .enumerate()
            .map(|(position, signer_id)| SignatureRequest {
                id: uuid::Uuid::new_v4().to_string(),
                document_id: document.id.clone(),
                company_id: document.company_id.clone(),
                signer_id: signer_id.clone(),
                position: position as i64,
                status: SignatureStatus::Pending,
                signature_data: None,
                signed_at: None,
                declined_at: None,
                decline_reason: None,
                created_at: now,
            })
            .collect();

        let committed = self.db.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            documents::insert_document(&tx, &document)?;
            for request in &requests {
                signatures::insert_request(&tx, request)?;
            }
            tx.commit()?;
            Ok(())
        });

        if let Err(e) = committed {
            for outcome in self.store.delete(std::slice::from_ref(&file_path)).await {
                if let Err(cleanup) = outcome.result {
                    warn!(path = %outcome.path, error = %cleanup, "Failed to remove blob of aborted upload");
                }
            }
            return Err(e);
        }

        record_audit(
            &self.db,
            &document.id,
            principal.user_id(),
            AuditAction::Uploaded,
            serde_json::json!({
                "title": document.title,
                "file_name": document.file_name,
                "requires_signature": document.requires_all_signatures,
                "board_members_count": requests.len(),
            }),
        );
        self.events.emit(CapTableEvent::DocumentUploaded {
            document_id: document.id.clone(),
            company_id: document.company_id.clone(),
            signer_count: requests.len(),
        });

        info!(document_id = %document.id, signers = requests.len(), "Document uploaded");
        Ok(document)
    }

    /// Documents of a company with their signature requests, newest first.
    pub fn company_documents(
        &self,
        principal: &ActingPrincipal,
        company_id: &str,
    ) -> Result<Vec<DocumentWithSignatures>, CapTableError> {
        self.db.with_conn(|conn| {
            visible_company(conn, company_id, principal)?;
            documents::list_company_documents(conn, company_id)?
                .into_iter()
                .map(|document| {
                    let signatures = signatures::signer_records(conn, &document.id)?;
                    Ok(DocumentWithSignatures { document, signatures })
                })
                .collect()
        })
    }

    /// Pending requests addressed to the principal.
    pub fn pending_signatures(&self, principal: &ActingPrincipal) -> Result<Vec<PendingSignature>, CapTableError> {
        self.db
            .with_conn(|conn| signatures::pending_for_signer(conn, principal.user_id()))
    }

    /// Expiring download URL for the original or the signed variant.
    pub fn document_url(
        &self,
        principal: &ActingPrincipal,
        document_id: &str,
        variant: FileVariant,
    ) -> Result<SignedUrl, CapTableError> {
        let document = self.visible_document(principal, document_id)?;
        let path = match variant {
            FileVariant::Original => document.file_path,
            FileVariant::Signed => document.signed_file_path.ok_or_else(|| {
                CapTableError::NotFound(format!("document {} has no signed variant", document_id))
            })?,
        };
        self.store
            .signed_url(&path, self.settings.signed_url_ttl)
            .map_err(|e| CapTableError::Dependency(e.to_string()))
    }

    /// Record the principal's signature on a pending request.
    ///
    /// When this is the last outstanding signature the document becomes
    /// `fully_signed` and, for PDFs, the signed variant is generated before
    /// returning. Generation failure is logged and left for repair; the
    /// signature itself stands.
    pub async fn sign(
        &self,
        principal: &ActingPrincipal,
        request_id: &str,
        signature_data: &str,
    ) -> Result<SignOutcome, CapTableError> {
        if signature_data.trim().is_empty() {
            return Err(CapTableError::Validation("signature data is required".into()));
        }

        let request = self.load_request(request_id)?;
        ledger::authorize(&request, principal, SignatureAction::Sign)?;

        let changed = self
            .db
            .with_conn(|conn| signatures::mark_signed(conn, request_id, signature_data, Utc::now()))?;
        if changed == 0 {
            return Err(CapTableError::Conflict(format!(
                "signature request {} is no longer pending",
                request_id
            )));
        }

        record_audit(
            &self.db,
            &request.document_id,
            principal.user_id(),
            AuditAction::Signed,
            serde_json::json!({ "signature_id": request_id }),
        );
        self.events.emit(CapTableEvent::SignatureRecorded {
            request_id: request_id.to_string(),
            document_id: request.document_id.clone(),
            signer_id: request.signer_id.clone(),
        });

        let signed_file_path = match self.complete_if_done(principal, &request.document_id).await {
            Ok(path) => path,
            Err(e) => {
                error!(document_id = %request.document_id, error = %e, "Completion check failed after signing");
                None
            }
        };

        let (request, document_status) = self.db.with_conn(|conn| {
            let request = signatures::get_request(conn, request_id)?
                .ok_or_else(|| CapTableError::NotFound(format!("signature request {}", request_id)))?;
            let status = documents::get_document(conn, &request.document_id)?
                .map(|d| d.status)
                .unwrap_or(DocumentStatus::PartiallySigned);
            Ok((request, status))
        })?;

        Ok(SignOutcome {
            request,
            document_status,
            signed_file_path,
        })
    }

    /// Advance the document after a signature. Returns the signed variant
    /// path when this call completed it and generation succeeded.
    async fn complete_if_done(
        &self,
        principal: &ActingPrincipal,
        document_id: &str,
    ) -> Result<Option<String>, CapTableError> {
        let (document, requests) = self.db.with_conn(|conn| {
            let document = documents::get_document(conn, document_id)?
                .ok_or_else(|| CapTableError::NotFound(format!("document {}", document_id)))?;
            let requests = signatures::list_for_document(conn, document_id)?;
            Ok((document, requests))
        })?;

        let status = ledger::status_after_sign(&requests);
        let advanced = self
            .db
            .with_conn(|conn| documents::advance_status(conn, document_id, status, Utc::now()))?;

        if status != DocumentStatus::FullySigned || advanced == 0 {
            debug!(document_id = %document_id, status = %status, "Document still awaiting signatures");
            return Ok(None);
        }

        self.events.emit(CapTableEvent::DocumentCompleted {
            document_id: document_id.to_string(),
        });

        if !document.supports_signature_page() {
            return Ok(None);
        }

        match self
            .artifacts
            .generate(&document, principal.user_id(), ArtifactTrigger::Completion)
            .await
        {
            Ok(path) => Ok(Some(path)),
            Err(e) => {
                error!(document_id = %document_id, error = %e, "Signed PDF generation failed, repair will retry");
                self.events.emit(CapTableEvent::SignedArtifactFailed {
                    document_id: document_id.to_string(),
                    reason: e.to_string(),
                });
                Ok(None)
            }
        }
    }

    /// Decline a pending request. Never completes the document.
    pub fn decline(
        &self,
        principal: &ActingPrincipal,
        request_id: &str,
        reason: Option<&str>,
    ) -> Result<SignatureRequest, CapTableError> {
        let request = self.load_request(request_id)?;
        ledger::authorize(&request, principal, SignatureAction::Decline)?;

        let reason = ledger::decline_reason(reason);
        let changed = self
            .db
            .with_conn(|conn| signatures::mark_declined(conn, request_id, &reason, Utc::now()))?;
        if changed == 0 {
            return Err(CapTableError::Conflict(format!(
                "signature request {} is no longer pending",
                request_id
            )));
        }

        record_audit(
            &self.db,
            &request.document_id,
            principal.user_id(),
            AuditAction::Declined,
            serde_json::json!({ "signature_id": request_id, "reason": reason }),
        );
        self.events.emit(CapTableEvent::SignatureDeclined {
            request_id: request_id.to_string(),
            document_id: request.document_id.clone(),
            signer_id: request.signer_id.clone(),
            reason,
            automatic: false,
        });

        self.load_request(request_id)
    }

    /// Delete a document and its blobs. Owner only.
    ///
    /// Blob deletions are attempted independently and their failures
    /// reported; the row (with its requests and audit trail) is removed
    /// either way.
    pub async fn delete(&self, principal: &ActingPrincipal, document_id: &str) -> Result<DeleteReport, CapTableError> {
        let document = self.db.with_conn(|conn| {
            let document = documents::get_document(conn, document_id)?
                .ok_or_else(|| CapTableError::NotFound(format!("document {}", document_id)))?;
            owned_company(conn, &document.company_id, principal)?;
            Ok(document)
        })?;

        let mut paths = vec![document.file_path.clone()];
        if let Some(signed) = &document.signed_file_path {
            paths.push(signed.clone());
        }

        let mut orphaned_paths = Vec::new();
        for outcome in self.store.delete(&paths).await {
            if let Err(e) = outcome.result {
                warn!(document_id = %document_id, path = %outcome.path, error = %e, "Failed to delete blob");
                orphaned_paths.push(outcome.path);
            }
        }

        self.db
            .with_conn(|conn| documents::delete_document(conn, document_id))?;
        self.events.emit(CapTableEvent::DocumentDeleted {
            document_id: document_id.to_string(),
            company_id: document.company_id.clone(),
        });

        info!(document_id = %document_id, orphaned = orphaned_paths.len(), "Document deleted");
        Ok(DeleteReport {
            document_id: document_id.to_string(),
            orphaned_paths,
        })
    }

    /// Audit trail of a document, oldest first.
    pub fn audit_log(
        &self,
        principal: &ActingPrincipal,
        document_id: &str,
    ) -> Result<Vec<crate::db::AuditLogEntry>, CapTableError> {
        self.visible_document(principal, document_id)?;
        self.db
            .with_conn(|conn| crate::db::audit::list_for_document(conn, document_id))
    }

    fn load_request(&self, request_id: &str) -> Result<SignatureRequest, CapTableError> {
        self.db
            .with_conn(|conn| signatures::get_request(conn, request_id))?
            .ok_or_else(|| CapTableError::NotFound(format!("signature request {}", request_id)))
    }

    fn visible_document(&self, principal: &ActingPrincipal, document_id: &str) -> Result<Document, CapTableError> {
        self.db.with_conn(|conn| {
            let document = documents::get_document(conn, document_id)?
                .ok_or_else(|| CapTableError::NotFound(format!("document {}", document_id)))?;
            visible_company(conn, &document.company_id, principal)
                .map_err(|_| CapTableError::NotFound(format!("document {}", document_id)))?;
            Ok(document)
        })
    }
}

/// Signer ids in first-seen order without blanks or repeats.
fn dedupe(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty() && seen.insert(id.to_string()))
        .map(str::to_string)
        .collect()
}

/// `{company_id}/{millis}-{random}.{ext}`
fn storage_path(company_id: &str, file_name: &str, millis: i64) -> String {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "bin".to_string());
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("{}/{}-{}.{}", company_id, millis, &random[..12], ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedupe_keeps_order() {
        let ids = vec!["b".to_string(), "a".into(), " b ".into(), "".into(), "c".into(), "a".into()];
        assert_eq!(dedupe(&ids), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_storage_path_shape() {
        let path = storage_path("c1", "Board Minutes.PDF", 1_700_000_000_000);
        assert!(path.starts_with("c1/1700000000000-"));
        assert!(path.ends_with(".pdf"));
        assert!(crate::document_store::validate_path(&path).is_ok());

        assert!(storage_path("c1", "README", 1).ends_with(".bin"));
        assert!(storage_path("c1", "evil.p/df", 1).ends_with(".bin"));
    }
}

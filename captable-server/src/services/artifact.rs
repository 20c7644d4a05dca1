//! Signed PDF generation
//!
//! Produces `{stem}-signed.{ext}` next to the original once every request
//! of a document is signed, and records it on the document. Used inline on
//! completion and by the repair sweep for documents whose inline
//! generation failed.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use signature_page::{SignatureInfo, PDF_MIME_TYPE};
use tracing::{debug, info, warn};

use super::events::{CapTableEvent, EventBus};
use super::{owned_company, record_audit};
use crate::db::{documents, signatures, AuditAction, CapTableDb, Document, SignerRecord};
use crate::document_store::DocumentStore;
use crate::error::CapTableError;
use crate::ledger;
use crate::principal::ActingPrincipal;

/// Path of the signed variant of `file_path`.
///
/// `c1/123-abc.pdf` becomes `c1/123-abc-signed.pdf`. A path without an
/// extension gets a `-signed` suffix.
pub fn signed_variant_path(file_path: &str) -> String {
    let (dir, name) = match file_path.rsplit_once('/') {
        Some((dir, name)) => (Some(dir), name),
        None => (None, file_path),
    };
    let signed_name = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}-signed.{}", stem, ext),
        _ => format!("{}-signed", name),
    };
    match dir {
        Some(dir) => format!("{}/{}", dir, signed_name),
        None => signed_name,
    }
}

/// What caused a generation run. Decides the audit action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactTrigger {
    /// The final signature was just recorded.
    Completion,
    /// Explicit regeneration of one document.
    Regenerate,
    /// Sweep over documents missing a signed variant.
    Repair,
}

impl ArtifactTrigger {
    fn audit_action(self) -> AuditAction {
        match self {
            ArtifactTrigger::Completion => AuditAction::SignedPdfGenerated,
            ArtifactTrigger::Regenerate | ArtifactTrigger::Repair => AuditAction::SignedPdfRegenerated,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RepairStatus {
    Success,
    Skipped,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepairOutcome {
    pub document_id: String,
    pub title: String,
    pub status: RepairStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Result of a repair sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RepairReport {
    pub results: Vec<RepairOutcome>,
    pub success_count: usize,
    pub skipped_count: usize,
    pub error_count: usize,
}

impl RepairReport {
    fn push(&mut self, outcome: RepairOutcome) {
        match outcome.status {
            RepairStatus::Success => self.success_count += 1,
            RepairStatus::Skipped => self.skipped_count += 1,
            RepairStatus::Error => self.error_count += 1,
        }
        self.results.push(outcome);
    }
}

/// Failures that make a repair candidate a skip rather than an error.
fn is_skip(error: &CapTableError) -> bool {
    error.is_conflict() || error.is_validation()
}

pub struct ArtifactService {
    db: Arc<CapTableDb>,
    store: Arc<dyn DocumentStore>,
    events: Arc<EventBus>,
}

impl ArtifactService {
    pub fn new(db: Arc<CapTableDb>, store: Arc<dyn DocumentStore>, events: Arc<EventBus>) -> Self {
        Self { db, store, events }
    }

    /// Generate and store the signed variant of `document`.
    ///
    /// Re-checks that every request is signed. Overwrites an existing
    /// variant, so running it twice is harmless. Returns the stored path.
    pub async fn generate(
        &self,
        document: &Document,
        actor_id: &str,
        trigger: ArtifactTrigger,
    ) -> Result<String, CapTableError> {
        if !document.supports_signature_page() {
            return Err(CapTableError::Validation(format!(
                "signature pages need {}, document {} is {}",
                PDF_MIME_TYPE, document.id, document.file_type
            )));
        }

        let records = self
            .db
            .with_conn(|conn| signatures::signer_records(conn, &document.id))?;
        let requests: Vec<_> = records.iter().map(|r| r.request.clone()).collect();
        if !ledger::all_signed(&requests) {
            return Err(CapTableError::Conflict(format!(
                "document {} has incomplete signatures",
                document.id
            )));
        }

        let original = self
            .store
            .get(&document.file_path)
            .await
            .map_err(|e| CapTableError::Dependency(format!("download failed: {}", e)))?;

        let infos = signature_infos(&records);
        let title = document.title.clone();
        let signed = tokio::task::spawn_blocking(move || {
            signature_page::add_signature_page(&original, &title, &infos)
        })
        .await
        .map_err(|e| CapTableError::Internal(format!("compositor task failed: {}", e)))??;

        let signed_path = signed_variant_path(&document.file_path);
        self.store
            .put(&signed_path, &signed, PDF_MIME_TYPE)
            .await
            .map_err(|e| CapTableError::Dependency(format!("upload failed: {}", e)))?;

        let updated = self
            .db
            .with_conn(|conn| documents::set_signed_artifact(conn, &document.id, &signed_path, Utc::now()))?;
        if updated == 0 {
            return Err(CapTableError::NotFound(format!("document {}", document.id)));
        }

        record_audit(
            &self.db,
            &document.id,
            actor_id,
            trigger.audit_action(),
            serde_json::json!({
                "signed_file_path": signed_path,
                "signature_count": records.len(),
            }),
        );
        self.events.emit(CapTableEvent::SignedArtifactGenerated {
            document_id: document.id.clone(),
            signed_file_path: signed_path.clone(),
            regenerated: trigger != ArtifactTrigger::Completion,
        });

        debug!(document_id = %document.id, bytes = signed.len(), "Signed variant stored");
        Ok(signed_path)
    }

    /// Owner-requested regeneration of one document.
    pub async fn regenerate(
        &self,
        principal: &ActingPrincipal,
        document_id: &str,
    ) -> Result<String, CapTableError> {
        let document = self.db.with_conn(|conn| {
            let document = documents::get_document(conn, document_id)?
                .ok_or_else(|| CapTableError::NotFound(format!("document {}", document_id)))?;
            owned_company(conn, &document.company_id, principal)?;
            Ok(document)
        })?;

        self.generate(&document, principal.user_id(), ArtifactTrigger::Regenerate)
            .await
    }

    /// Repair documents of companies the principal owns.
    pub async fn repair_owned(&self, principal: &ActingPrincipal) -> Result<RepairReport, CapTableError> {
        let candidates = self.db.with_conn(|conn| {
            let all = documents::missing_signed_variants(conn)?;
            let mut owned = Vec::with_capacity(all.len());
            for document in all {
                if owned_company(conn, &document.company_id, principal).is_ok() {
                    owned.push(document);
                }
            }
            Ok(owned)
        })?;
        Ok(self.repair(candidates, principal.user_id()).await)
    }

    /// Repair every document missing a signed variant.
    pub async fn repair_all(&self, actor_id: &str) -> Result<RepairReport, CapTableError> {
        let candidates = self.db.with_conn(documents::missing_signed_variants)?;
        Ok(self.repair(candidates, actor_id).await)
    }

    /// Candidates are processed one at a time. A failure is recorded and
    /// the sweep moves on.
    async fn repair(&self, candidates: Vec<Document>, actor_id: &str) -> RepairReport {
        let mut report = RepairReport::default();
        if candidates.is_empty() {
            debug!("No documents need a signed variant");
            return report;
        }

        info!(count = candidates.len(), "Repairing signed variants");
        for document in candidates {
            let outcome = match self.generate(&document, actor_id, ArtifactTrigger::Repair).await {
                Ok(_) => RepairOutcome {
                    document_id: document.id.clone(),
                    title: document.title.clone(),
                    status: RepairStatus::Success,
                    reason: None,
                },
                Err(e) => {
                    let status = if is_skip(&e) {
                        RepairStatus::Skipped
                    } else {
                        warn!(document_id = %document.id, error = %e, "Repair failed");
                        RepairStatus::Error
                    };
                    RepairOutcome {
                        document_id: document.id.clone(),
                        title: document.title.clone(),
                        status,
                        reason: Some(e.to_string()),
                    }
                }
            };
            report.push(outcome);
        }

        info!(
            success = report.success_count,
            skipped = report.skipped_count,
            errors = report.error_count,
            "Repair finished"
        );
        report
    }
}

fn signature_infos(records: &[SignerRecord]) -> Vec<SignatureInfo> {
    let now = Utc::now();
    records
        .iter()
        .map(|record| SignatureInfo {
            signer_name: record.signer_name.clone(),
            signer_email: record.signer_email.clone(),
            signature_data: record.request.signature_data.clone().unwrap_or_default(),
            signed_at: record.request.signed_at.unwrap_or(now),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_variant_path() {
        assert_eq!(signed_variant_path("c1/1700-abc.pdf"), "c1/1700-abc-signed.pdf");
        assert_eq!(signed_variant_path("c1/minutes.v2.pdf"), "c1/minutes.v2-signed.pdf");
        assert_eq!(signed_variant_path("c1/noext"), "c1/noext-signed");
        assert_eq!(signed_variant_path("plain.pdf"), "plain-signed.pdf");
        assert_eq!(signed_variant_path("c1.d/.hidden"), "c1.d/.hidden-signed");
    }

    #[test]
    fn test_report_counts() {
        let mut report = RepairReport::default();
        for status in [RepairStatus::Success, RepairStatus::Skipped, RepairStatus::Error, RepairStatus::Success] {
            report.push(RepairOutcome {
                document_id: "d".into(),
                title: "t".into(),
                status,
                reason: None,
            });
        }
        assert_eq!((report.success_count, report.skipped_count, report.error_count), (2, 1, 1));
        assert_eq!(report.results.len(), 4);
    }

    #[test]
    fn test_audit_action_by_trigger() {
        assert_eq!(ArtifactTrigger::Completion.audit_action(), AuditAction::SignedPdfGenerated);
        assert_eq!(ArtifactTrigger::Repair.audit_action(), AuditAction::SignedPdfRegenerated);
    }
}

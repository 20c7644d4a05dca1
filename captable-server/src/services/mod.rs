//! Workflow services
//!
//! Each service owns one area of the workflow and shares the database,
//! blob store and event bus through `Arc`s:
//!
//! - `DocumentService` - upload, listing, signing, declining, deletion
//! - `ArtifactService` - signed PDF generation and repair
//! - `MemberService` - board membership and revocation
//! - `CapTableService` - snapshots and instrument conversion
//!
//! Authoritative changes commit first. Audit entries and events are written
//! afterwards and only logged on failure.

pub mod artifact;
pub mod cap_table;
pub mod documents;
pub mod events;
pub mod members;
pub mod response;

use std::sync::Arc;

use chrono::Utc;
use rusqlite::Connection;
use tracing::warn;

use crate::db::{audit, companies, AuditAction, Company, CapTableDb, MemberStatus};
use crate::document_store::DocumentStore;
use crate::error::CapTableError;
use crate::principal::ActingPrincipal;

pub use artifact::{ArtifactService, ArtifactTrigger, RepairOutcome, RepairReport, RepairStatus};
pub use cap_table::{CapTableService, ConversionOutcome, ConversionRequest};
pub use documents::{DeleteReport, DocumentService, FileVariant, SignOutcome, UploadRequest};
pub use events::{spawn_logging_listener, CapTableEvent, EventBus, EventListener, LoggingEventListener};
pub use members::{MemberService, RemovalReport};

/// Limits applied by the services.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub max_upload_bytes: usize,
    pub signed_url_ttl: chrono::Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            max_upload_bytes: 25 * 1024 * 1024,
            signed_url_ttl: chrono::Duration::hours(1),
        }
    }
}

/// Container for all services
pub struct Services {
    pub db: Arc<CapTableDb>,
    pub store: Arc<dyn DocumentStore>,
    pub events: Arc<EventBus>,
    pub documents: Arc<DocumentService>,
    pub artifacts: Arc<ArtifactService>,
    pub members: Arc<MemberService>,
    pub cap_table: Arc<CapTableService>,
}

impl Services {
    pub fn new(db: Arc<CapTableDb>, store: Arc<dyn DocumentStore>, settings: ServiceSettings) -> Self {
        let events = Arc::new(EventBus::new());
        let artifacts = Arc::new(ArtifactService::new(db.clone(), store.clone(), events.clone()));
        let documents = Arc::new(DocumentService::new(
            db.clone(),
            store.clone(),
            artifacts.clone(),
            events.clone(),
            settings,
        ));
        let members = Arc::new(MemberService::new(db.clone(), events.clone()));
        let cap_table = Arc::new(CapTableService::new(db.clone(), events.clone()));

        Self {
            db,
            store,
            events,
            documents,
            artifacts,
            members,
            cap_table,
        }
    }
}

/// Company visible to the principal: owner or active member.
///
/// Invisible companies are reported as missing.
pub(crate) fn visible_company(
    conn: &Connection,
    company_id: &str,
    principal: &ActingPrincipal,
) -> Result<Company, CapTableError> {
    let not_found = || CapTableError::NotFound(format!("company {}", company_id));
    let company = companies::get_company(conn, company_id)?.ok_or_else(not_found)?;
    if principal.is(&company.owner_id) {
        return Ok(company);
    }
    match companies::get_membership(conn, company_id, principal.user_id())? {
        Some(member) if member.status == MemberStatus::Active => Ok(company),
        _ => Err(not_found()),
    }
}

/// Company the principal owns. Members who are not the owner get `Forbidden`.
pub(crate) fn owned_company(
    conn: &Connection,
    company_id: &str,
    principal: &ActingPrincipal,
) -> Result<Company, CapTableError> {
    let company = visible_company(conn, company_id, principal)?;
    if !principal.is(&company.owner_id) {
        return Err(CapTableError::Forbidden(format!(
            "only the owner of company {} may do this",
            company_id
        )));
    }
    Ok(company)
}

/// Append an audit entry after the fact. Failures are logged, never returned.
pub(crate) fn record_audit(
    db: &CapTableDb,
    document_id: &str,
    actor_id: &str,
    action: AuditAction,
    details: serde_json::Value,
) {
    let result = db.with_conn(|conn| audit::append(conn, document_id, actor_id, action, details, Utc::now()));
    if let Err(e) = result {
        warn!(document_id = %document_id, action = %action, error = %e, "Failed to write audit entry");
    }
}

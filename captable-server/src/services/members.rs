//! Board membership
//!
//! Removing a member declines their pending signature requests in the
//! company in the same transaction, so a revoked signer never blocks a
//! document forever and can no longer sign.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use super::events::{CapTableEvent, EventBus};
use super::{owned_company, record_audit, visible_company};
use crate::db::{companies, signatures, AuditAction, CapTableDb, CompanyMember, MemberRole, MemberStatus};
use crate::error::CapTableError;
use crate::principal::ActingPrincipal;

/// Decline reason recorded for requests of a removed member.
pub const REVOKED_REASON: &str = "Board membership revoked";

#[derive(Debug, Clone, Serialize)]
pub struct RemovalReport {
    pub member: CompanyMember,
    /// Requests declined because the member was removed.
    pub declined_request_ids: Vec<String>,
}

/// Basic `local@domain.tld` shape check.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

pub struct MemberService {
    db: Arc<CapTableDb>,
    events: Arc<EventBus>,
}

impl MemberService {
    pub fn new(db: Arc<CapTableDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    pub fn list(&self, principal: &ActingPrincipal, company_id: &str) -> Result<Vec<CompanyMember>, CapTableError> {
        self.db.with_conn(|conn| {
            visible_company(conn, company_id, principal)?;
            companies::list_members(conn, company_id)
        })
    }

    /// Add a registered user as board member by email. Owner only.
    ///
    /// A previously removed member is reactivated.
    pub fn add_board_member(
        &self,
        principal: &ActingPrincipal,
        company_id: &str,
        email: &str,
    ) -> Result<CompanyMember, CapTableError> {
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(CapTableError::Validation(format!("invalid email address: {}", email)));
        }

        let member = self.db.with_conn(|conn| {
            owned_company(conn, company_id, principal)?;

            let profile = companies::find_profile_by_email(conn, email)?.ok_or_else(|| {
                CapTableError::NotFound(format!("no user found with email {}; they need to sign up first", email))
            })?;
            if principal.is(&profile.id) {
                return Err(CapTableError::Validation("you cannot add yourself as a board member".into()));
            }

            match companies::get_membership(conn, company_id, &profile.id)? {
                Some(existing) if existing.status != MemberStatus::Removed => Err(CapTableError::Conflict(format!(
                    "{} is already a member of this company",
                    email
                ))),
                Some(mut existing) => {
                    companies::set_member_status(conn, &existing.id, MemberStatus::Active, MemberRole::BoardMember)?;
                    existing.status = MemberStatus::Active;
                    existing.role = MemberRole::BoardMember;
                    Ok(existing)
                }
                None => {
                    let member = companies::new_member(
                        company_id,
                        &profile.id,
                        MemberRole::BoardMember,
                        Some(principal.user_id()),
                        Utc::now(),
                    );
                    companies::insert_member(conn, &member)?;
                    Ok(member)
                }
            }
        })?;

        self.events.emit(CapTableEvent::BoardMemberAdded {
            company_id: company_id.to_string(),
            user_id: member.user_id.clone(),
        });
        info!(company_id = %company_id, user_id = %member.user_id, "Board member added");
        Ok(member)
    }

    /// Remove a board member and decline their pending requests. Owner only.
    pub fn remove_board_member(
        &self,
        principal: &ActingPrincipal,
        company_id: &str,
        user_id: &str,
    ) -> Result<RemovalReport, CapTableError> {
        let (member, declined) = self.db.with_conn_mut(|conn| {
            let company = owned_company(conn, company_id, principal)?;
            if company.owner_id == user_id {
                return Err(CapTableError::Validation("the company owner cannot be removed".into()));
            }

            let mut member = companies::get_membership(conn, company_id, user_id)?
                .filter(|m| m.status != MemberStatus::Removed)
                .ok_or_else(|| CapTableError::NotFound(format!("member {} of company {}", user_id, company_id)))?;

            let tx = conn.transaction()?;
            companies::set_member_status(&tx, &member.id, MemberStatus::Removed, member.role)?;
            let now = Utc::now();
            let mut declined = Vec::new();
            for request in signatures::pending_in_company(&tx, company_id, user_id)? {
                if signatures::mark_declined(&tx, &request.id, REVOKED_REASON, now)? > 0 {
                    declined.push(request);
                }
            }
            tx.commit()?;

            member.status = MemberStatus::Removed;
            Ok((member, declined))
        })?;

        for request in &declined {
            record_audit(
                &self.db,
                &request.document_id,
                principal.user_id(),
                AuditAction::Declined,
                serde_json::json!({
                    "signature_id": request.id,
                    "reason": REVOKED_REASON,
                    "automatic": true,
                }),
            );
            self.events.emit(CapTableEvent::SignatureDeclined {
                request_id: request.id.clone(),
                document_id: request.document_id.clone(),
                signer_id: request.signer_id.clone(),
                reason: REVOKED_REASON.to_string(),
                automatic: true,
            });
        }
        self.events.emit(CapTableEvent::BoardMemberRemoved {
            company_id: company_id.to_string(),
            user_id: user_id.to_string(),
            auto_declined: declined.len(),
        });

        info!(company_id = %company_id, user_id = %user_id, declined = declined.len(), "Board member removed");
        Ok(RemovalReport {
            member,
            declined_request_ids: declined.into_iter().map(|r| r.id).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_shape() {
        assert!(is_valid_email("dana@example.com"));
        assert!(is_valid_email("a.b+c@sub.example.org"));
        assert!(!is_valid_email("dana@example"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("dana example@x.com"));
        assert!(!is_valid_email("a@b@c.com"));
        assert!(!is_valid_email("dana@.com"));
        assert!(!is_valid_email("dana@example."));
    }
}

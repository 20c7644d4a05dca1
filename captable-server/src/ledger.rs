//! Signature request state machine
//!
//! ```text
//! pending ──sign────▶ signed     (terminal)
//!    └─────decline──▶ declined   (terminal)
//! ```
//!
//! Identity is checked before state so "wrong person" and "already
//! resolved" stay distinguishable to the caller.

use crate::db::{DocumentStatus, SignatureRequest, SignatureStatus};
use crate::error::CapTableError;
use crate::principal::ActingPrincipal;

/// Reason recorded when a signer declines without giving one.
pub const DEFAULT_DECLINE_REASON: &str = "No reason provided";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAction {
    Sign,
    Decline,
}

impl SignatureAction {
    pub fn target(self) -> SignatureStatus {
        match self {
            SignatureAction::Sign => SignatureStatus::Signed,
            SignatureAction::Decline => SignatureStatus::Declined,
        }
    }
}

/// Check that `principal` may apply `action` to `request`.
///
/// Returns the status the request moves to.
pub fn authorize(
    request: &SignatureRequest,
    principal: &ActingPrincipal,
    action: SignatureAction,
) -> Result<SignatureStatus, CapTableError> {
    if !principal.is(&request.signer_id) {
        return Err(CapTableError::Forbidden(format!(
            "signature request {} belongs to another signer",
            request.id
        )));
    }

    match request.status {
        SignatureStatus::Pending => Ok(action.target()),
        resolved => Err(CapTableError::Conflict(format!(
            "signature request {} is already {}",
            request.id, resolved
        ))),
    }
}

/// Trimmed reason, or the default placeholder when blank.
pub fn decline_reason(reason: Option<&str>) -> String {
    match reason.map(str::trim) {
        Some(r) if !r.is_empty() => r.to_string(),
        _ => DEFAULT_DECLINE_REASON.to_string(),
    }
}

/// Every request signed. An empty set never counts as complete.
pub fn all_signed(requests: &[SignatureRequest]) -> bool {
    !requests.is_empty() && requests.iter().all(|r| r.status == SignatureStatus::Signed)
}

/// Document status after a successful sign.
pub fn status_after_sign(requests: &[SignatureRequest]) -> DocumentStatus {
    if all_signed(requests) {
        DocumentStatus::FullySigned
    } else {
        DocumentStatus::PartiallySigned
    }
}

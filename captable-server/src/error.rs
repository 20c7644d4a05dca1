//! Error types for captable-server

use thiserror::Error;

use crate::document_store::DocumentStoreError;

#[derive(Error, Debug)]
pub enum CapTableError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Missing, or not visible to the acting principal.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Blob store or compositor failure.
    #[error("Dependency failure: {0}")]
    Dependency(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CapTableError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_dependency(&self) -> bool {
        matches!(self, Self::Dependency(_))
    }
}

impl From<equity::EquityError> for CapTableError {
    fn from(e: equity::EquityError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<signature_page::CompositorError> for CapTableError {
    fn from(e: signature_page::CompositorError) -> Self {
        Self::Dependency(format!("signature page: {}", e))
    }
}

impl From<DocumentStoreError> for CapTableError {
    fn from(e: DocumentStoreError) -> Self {
        Self::Dependency(format!("document store: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equity_errors_are_validation() {
        let err: CapTableError = equity::EquityError::InvalidInput("price".into()).into();
        assert!(err.is_validation());
    }

    #[test]
    fn test_store_errors_are_dependency() {
        let err: CapTableError = DocumentStoreError::NotFound("a/b.pdf".into()).into();
        assert!(err.is_dependency());
        assert!(!err.is_not_found());
    }
}

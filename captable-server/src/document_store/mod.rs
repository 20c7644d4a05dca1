//! Document blob storage
//!
//! Uploaded files and generated signed variants are addressed by a relative
//! path (`{company_id}/{file_name}`). The store is reached through the
//! [`DocumentStore`] trait so the workflow can run against the local
//! filesystem in production and an in-memory store with injectable failures
//! in tests.
//!
//! Every operation is fallible and none is retried here.

pub mod fs;
pub mod memory;
pub mod signing;

use async_trait::async_trait;
use chrono::Duration;
use thiserror::Error;

pub use fs::FsDocumentStore;
pub use memory::MemoryDocumentStore;
pub use signing::{SignedUrl, UrlSigner};

#[derive(Error, Debug)]
pub enum DocumentStoreError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid object path: {0}")]
    InvalidPath(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of deleting one path in a batch.
#[derive(Debug)]
pub struct DeleteOutcome {
    pub path: String,
    pub result: Result<(), DocumentStoreError>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read the object at `path`.
    async fn get(&self, path: &str) -> Result<Vec<u8>, DocumentStoreError>;

    /// Write `bytes` to `path`, replacing any existing object.
    async fn put(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<(), DocumentStoreError>;

    /// Delete every path independently. One failure never stops the rest.
    /// A path that holds no object counts as deleted.
    async fn delete(&self, paths: &[String]) -> Vec<DeleteOutcome>;

    /// Expiring download URL for `path`.
    fn signed_url(&self, path: &str, ttl: Duration) -> Result<SignedUrl, DocumentStoreError>;
}

/// Reject paths that could escape the store root.
pub fn validate_path(path: &str) -> Result<(), DocumentStoreError> {
    if path.is_empty() || path.len() > 1024 {
        return Err(DocumentStoreError::InvalidPath("path must be 1-1024 bytes".into()));
    }
    if path.starts_with('/') || path.contains('\\') || path.contains('\0') {
        return Err(DocumentStoreError::InvalidPath(path.to_string()));
    }
    if path.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..") {
        return Err(DocumentStoreError::InvalidPath(path.to_string()));
    }
    Ok(())
}

/// Content type served for a stored path, by extension.
pub fn content_type_for(path: &str) -> &'static str {
    match path.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "pdf" => "application/pdf",
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "txt" => "text/plain",
        Some(ext) if ext == "doc" => "application/msword",
        Some(ext) if ext == "docx" => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_path() {
        assert!(validate_path("c1/123-abc.pdf").is_ok());
        assert!(validate_path("").is_err());
        assert!(validate_path("/etc/passwd").is_err());
        assert!(validate_path("c1/../../etc").is_err());
        assert!(validate_path("c1//x.pdf").is_err());
        assert!(validate_path("c1\\x.pdf").is_err());
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("a/b.PDF"), "application/pdf");
        assert_eq!(content_type_for("a/b"), "application/octet-stream");
    }
}

//! Filesystem-backed document store
//!
//! Objects live under `root/` at their relative path. Writes go to a
//! temporary sibling and are renamed into place so a reader never sees a
//! half-written signed variant.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Duration;
use tokio::fs;
use tracing::{debug, info};

use super::{validate_path, DeleteOutcome, DocumentStore, DocumentStoreError, SignedUrl, UrlSigner};

pub struct FsDocumentStore {
    root: PathBuf,
    signer: UrlSigner,
}

impl FsDocumentStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub async fn new<P: AsRef<Path>>(root: P, signer: UrlSigner) -> Result<Self, DocumentStoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;

        info!(path = %root.display(), "Initialized document store");

        Ok(Self { root, signer })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, DocumentStoreError> {
        validate_path(path)?;
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn get(&self, path: &str) -> Result<Vec<u8>, DocumentStoreError> {
        let full = self.resolve(path)?;
        match fs::read(&full).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(DocumentStoreError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<(), DocumentStoreError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await?;
        }

        let tmp = full.with_file_name(format!(
            ".{}.{}.tmp",
            full.file_name().and_then(|n| n.to_str()).unwrap_or("object"),
            uuid::Uuid::new_v4()
        ));
        fs::write(&tmp, bytes).await?;
        if let Err(e) = fs::rename(&tmp, &full).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!(path = %path, size = bytes.len(), content_type = %content_type, "Stored document object");
        Ok(())
    }

    async fn delete(&self, paths: &[String]) -> Vec<DeleteOutcome> {
        let mut outcomes = Vec::with_capacity(paths.len());
        for path in paths {
            let result = match self.resolve(path) {
                Ok(full) => match fs::remove_file(&full).await {
                    Ok(()) => Ok(()),
                    // Already gone
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                    Err(e) => Err(e.into()),
                },
                Err(e) => Err(e),
            };
            outcomes.push(DeleteOutcome { path: path.clone(), result });
        }
        outcomes
    }

    fn signed_url(&self, path: &str, ttl: Duration) -> Result<SignedUrl, DocumentStoreError> {
        validate_path(path)?;
        self.signer.sign(path, ttl)
    }
}

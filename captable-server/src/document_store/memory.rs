//! In-memory document store for tests.
//!
//! Failures can be injected per operation to exercise the workflow's
//! partial-failure handling.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Duration;

use super::{validate_path, DeleteOutcome, DocumentStore, DocumentStoreError, SignedUrl, UrlSigner};

struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
}

pub struct MemoryDocumentStore {
    objects: RwLock<HashMap<String, StoredObject>>,
    signer: UrlSigner,
    fail_gets: AtomicBool,
    fail_puts: AtomicBool,
    failing_deletes: RwLock<HashSet<String>>,
    get_count: AtomicU32,
    put_count: AtomicU32,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            signer: UrlSigner::new("memory-store", "http://memory.invalid"),
            fail_gets: AtomicBool::new(false),
            fail_puts: AtomicBool::new(false),
            failing_deletes: RwLock::new(HashSet::new()),
            get_count: AtomicU32::new(0),
            put_count: AtomicU32::new(0),
        }
    }

    /// Make every `get` fail until reset.
    pub fn set_fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    /// Make every `put` fail until reset.
    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Make deleting `path` fail.
    pub fn fail_delete_of(&self, path: impl Into<String>) {
        if let Ok(mut set) = self.failing_deletes.write() {
            set.insert(path.into());
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.objects.read().map(|o| o.contains_key(path)).unwrap_or(false)
    }

    pub fn content_type(&self, path: &str) -> Option<String> {
        self.objects
            .read()
            .ok()
            .and_then(|o| o.get(path).map(|obj| obj.content_type.clone()))
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .objects
            .read()
            .map(|o| o.keys().cloned().collect())
            .unwrap_or_default();
        paths.sort();
        paths
    }

    pub fn get_count(&self) -> u32 {
        self.get_count.load(Ordering::SeqCst)
    }

    pub fn put_count(&self) -> u32 {
        self.put_count.load(Ordering::SeqCst)
    }

    fn poisoned() -> DocumentStoreError {
        DocumentStoreError::Unavailable("memory store lock poisoned".into())
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, path: &str) -> Result<Vec<u8>, DocumentStoreError> {
        self.get_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(DocumentStoreError::Unavailable("injected get failure".into()));
        }
        let objects = self.objects.read().map_err(|_| Self::poisoned())?;
        objects
            .get(path)
            .map(|obj| obj.bytes.clone())
            .ok_or_else(|| DocumentStoreError::NotFound(path.to_string()))
    }

    async fn put(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<(), DocumentStoreError> {
        self.put_count.fetch_add(1, Ordering::SeqCst);
        validate_path(path)?;
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(DocumentStoreError::Unavailable("injected put failure".into()));
        }
        let mut objects = self.objects.write().map_err(|_| Self::poisoned())?;
        objects.insert(
            path.to_string(),
            StoredObject {
                bytes: bytes.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn delete(&self, paths: &[String]) -> Vec<DeleteOutcome> {
        let failing: HashSet<String> = self
            .failing_deletes
            .read()
            .map(|s| s.clone())
            .unwrap_or_default();

        paths
            .iter()
            .map(|path| {
                let result = if failing.contains(path) {
                    Err(DocumentStoreError::Unavailable(format!("injected delete failure for {}", path)))
                } else {
                    match self.objects.write() {
                        Ok(mut objects) => {
                            objects.remove(path);
                            Ok(())
                        }
                        Err(_) => Err(Self::poisoned()),
                    }
                };
                DeleteOutcome { path: path.clone(), result }
            })
            .collect()
    }

    fn signed_url(&self, path: &str, ttl: Duration) -> Result<SignedUrl, DocumentStoreError> {
        validate_path(path)?;
        self.signer.sign(path, ttl)
    }
}

//! Test doubles shared by unit and integration tests.
//!
//! Enabled for this crate's own tests and for downstream test builds via the
//! `test-utils` feature.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{RemoteConfig, ResumeDocument};
use crate::storage::DocumentStore;
use crate::sync::SyncClient;
use crate::transport::{RemoteEntry, Transport, WebDavError};

#[derive(Clone)]
struct StoredFile {
    content: String,
    modified: DateTime<Utc>,
}

/// In-memory WebDAV server double.
///
/// Behaves like a well-mannered server: writes require the parent collection,
/// deleting an absent file succeeds, re-creating a collection succeeds, and
/// the etag changes whenever content does.
pub struct InMemoryTransport {
    files: Mutex<HashMap<String, StoredFile>>,
    collections: Mutex<HashSet<String>>,
    fail_paths: Mutex<HashSet<String>>,
    collections_created: Mutex<usize>,
}

impl InMemoryTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            files: Mutex::new(HashMap::new()),
            collections: Mutex::new(HashSet::new()),
            fail_paths: Mutex::new(HashSet::new()),
            collections_created: Mutex::new(0),
        })
    }

    /// A transport with the given collections pre-created, so tests can seed
    /// files without walking the base path first.
    pub fn with_collections(paths: &[&str]) -> Arc<Self> {
        let transport = Self::new();
        {
            let mut collections = transport.collections.lock().unwrap();
            for path in paths {
                collections.insert(normalize(path));
            }
        }
        transport
    }

    /// Seeds a file directly, bypassing the parent-collection check.
    pub fn put_file(&self, path: &str, content: &str) {
        self.files.lock().unwrap().insert(
            normalize(path),
            StoredFile {
                content: content.to_string(),
                modified: Utc::now(),
            },
        );
    }

    /// Every operation on this exact path will fail with a transport error.
    pub fn fail_path(&self, path: &str) {
        self.fail_paths.lock().unwrap().insert(normalize(path));
    }

    pub fn file_content(&self, path: &str) -> Option<String> {
        self.files
            .lock()
            .unwrap()
            .get(&normalize(path))
            .map(|f| f.content.clone())
    }

    pub fn file_count(&self) -> usize {
        self.files.lock().unwrap().len()
    }

    pub fn has_collection(&self, path: &str) -> bool {
        self.collections.lock().unwrap().contains(&normalize(path))
    }

    /// Number of collections actually created through `make_collection`.
    pub fn collections_created(&self) -> usize {
        *self.collections_created.lock().unwrap()
    }

    fn check_failure(&self, path: &str) -> Result<(), WebDavError> {
        if self.fail_paths.lock().unwrap().contains(&normalize(path)) {
            return Err(WebDavError::Transport(
                "simulated network failure".to_string(),
            ));
        }
        Ok(())
    }

    fn file_entry(path: &str, file: &StoredFile) -> RemoteEntry {
        RemoteEntry {
            name: file_name(path),
            path: path.to_string(),
            is_directory: false,
            etag: Some(etag_of(&file.content)),
            last_modified: Some(file.modified),
            size: Some(file.content.len() as u64),
        }
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>, WebDavError> {
        self.check_failure(path)?;
        let parent = normalize(path);
        let files = self.files.lock().unwrap();
        let entries = files
            .iter()
            .filter(|(file_path, _)| parent_of(file_path) == parent)
            .map(|(file_path, file)| Self::file_entry(file_path, file))
            .collect();
        Ok(entries)
    }

    async fn read(&self, path: &str) -> Result<String, WebDavError> {
        self.check_failure(path)?;
        self.files
            .lock()
            .unwrap()
            .get(&normalize(path))
            .map(|f| f.content.clone())
            .ok_or_else(|| WebDavError::NotFound(path.to_string()))
    }

    async fn write(&self, path: &str, content: &str) -> Result<(), WebDavError> {
        self.check_failure(path)?;
        let normalized = normalize(path);
        let parent = parent_of(&normalized);
        if !parent.is_empty() && !self.collections.lock().unwrap().contains(&parent) {
            return Err(WebDavError::Conflict(path.to_string()));
        }
        self.files.lock().unwrap().insert(
            normalized,
            StoredFile {
                content: content.to_string(),
                modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), WebDavError> {
        self.check_failure(path)?;
        self.files.lock().unwrap().remove(&normalize(path));
        Ok(())
    }

    async fn stat(&self, path: &str) -> Result<RemoteEntry, WebDavError> {
        self.check_failure(path)?;
        let normalized = normalize(path);

        if let Some(file) = self.files.lock().unwrap().get(&normalized) {
            return Ok(Self::file_entry(&normalized, file));
        }
        if normalized.is_empty() || self.collections.lock().unwrap().contains(&normalized) {
            return Ok(RemoteEntry {
                name: file_name(&normalized),
                path: format!("{}/", normalized),
                is_directory: true,
                etag: None,
                last_modified: None,
                size: None,
            });
        }
        Err(WebDavError::NotFound(path.to_string()))
    }

    async fn make_collection(&self, path: &str) -> Result<(), WebDavError> {
        self.check_failure(path)?;
        let inserted = self.collections.lock().unwrap().insert(normalize(path));
        if inserted {
            *self.collections_created.lock().unwrap() += 1;
        }
        Ok(())
    }
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

fn parent_of(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => String::new(),
        Some(index) => path[..index].to_string(),
    }
}

fn file_name(path: &str) -> String {
    path.rsplit('/').next().unwrap_or_default().to_string()
}

fn etag_of(content: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let digest = hasher.finalize();
    digest
        .iter()
        .take(8)
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

/// In-memory [`DocumentStore`] for batch-workflow tests.
pub struct MemoryStore {
    documents: Mutex<HashMap<String, ResumeDocument>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            documents: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_documents(documents: Vec<ResumeDocument>) -> Self {
        let store = Self::new();
        {
            let mut map = store.documents.lock().unwrap();
            for doc in documents {
                map.insert(doc.id.clone(), doc);
            }
        }
        store
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn initialize(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn list(&self) -> anyhow::Result<HashMap<String, ResumeDocument>> {
        Ok(self.documents.lock().unwrap().clone())
    }

    async fn get(&self, id: &str) -> anyhow::Result<Option<ResumeDocument>> {
        Ok(self.documents.lock().unwrap().get(id).cloned())
    }

    async fn save(&self, doc: &ResumeDocument) -> anyhow::Result<()> {
        self.documents
            .lock()
            .unwrap()
            .insert(doc.id.clone(), doc.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> anyhow::Result<()> {
        self.documents.lock().unwrap().remove(id);
        Ok(())
    }
}

/// A document with a fixed `updated_at`, for deterministic conflict tests.
pub fn doc_at(id: &str, title: &str, epoch_secs: i64) -> ResumeDocument {
    let timestamp = DateTime::<Utc>::from_timestamp(epoch_secs, 0)
        .unwrap_or_else(Utc::now);
    ResumeDocument {
        id: id.to_string(),
        title: title.to_string(),
        content: serde_json::json!({"sections": []}),
        created_at: timestamp,
        updated_at: timestamp,
    }
}

/// Writes a document into the transport at its canonical remote path.
pub fn seed_remote(transport: &InMemoryTransport, config: &RemoteConfig, doc: &ResumeDocument) {
    let path = config.document_path(&doc.id);
    let content = serde_json::to_string_pretty(doc).unwrap();
    transport.put_file(&path, &content);
}

/// A connected client over a fresh in-memory transport with the base
/// collection already present.
pub fn connected_client() -> (Arc<InMemoryTransport>, SyncClient, RemoteConfig) {
    let config = RemoteConfig::new("https://dav.example.com", "user", "secret");
    let base = config.normalized_base_path();
    let transport = InMemoryTransport::with_collections(&[base.as_str()]);
    let client = SyncClient::with_transport(config.clone(), transport.clone());
    (transport, client, config)
}

//! Change detection without transferring full content.
//!
//! Compares a local content hash and the remote entity-tag/last-modified
//! fingerprint against a cache of previously-observed fingerprints. The cache
//! is advisory, never authoritative: losing it only forces extra comparison
//! work, it can never corrupt data.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::transport::{Transport, WebDavError};

/// Delay between per-file remote lookups in batch detection, to avoid
/// hammering the remote server.
const BATCH_REQUEST_DELAY: Duration = Duration::from_millis(50);

/// Last-observed fingerprint for one remote file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFingerprint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Result of comparing one file against the fingerprint cache.
#[derive(Debug, Clone)]
pub struct ChangeReport {
    pub needs_sync: bool,
    pub local_changed: bool,
    pub remote_changed: bool,
    pub remote: Option<FileFingerprint>,
}

/// Decides whether a named document differs between local and remote.
pub struct ChangeDetector {
    transport: Arc<dyn Transport>,
    base_path: String,
    cache_path: PathBuf,
    cache: HashMap<String, FileFingerprint>,
}

impl ChangeDetector {
    /// Loads the fingerprint cache from `cache_path`; an unreadable or
    /// malformed cache degrades to empty with a warning.
    pub async fn load(
        transport: Arc<dyn Transport>,
        base_path: impl Into<String>,
        cache_path: impl Into<PathBuf>,
    ) -> Self {
        let cache_path = cache_path.into();
        let cache = match tokio::fs::read_to_string(&cache_path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(cache) => cache,
                Err(e) => {
                    warn!("discarding malformed fingerprint cache: {}", e);
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };

        Self {
            transport,
            base_path: base_path.into(),
            cache_path,
            cache,
        }
    }

    /// Deterministic fingerprint for local content: SHA-256 hex.
    pub fn content_hash(content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|byte| format!("{:02x}", byte))
            .collect()
    }

    /// Server-side fingerprint via `stat`; `None` when the file is absent.
    pub async fn remote_fingerprint(
        &self,
        file_name: &str,
    ) -> Result<Option<FileFingerprint>, WebDavError> {
        match self.transport.stat(&self.remote_path(file_name)).await {
            Ok(entry) => Ok(Some(FileFingerprint {
                content_hash: None,
                etag: entry.etag,
                last_modified: entry.last_modified,
                size: entry.size,
            })),
            Err(WebDavError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Compares one file's local content and remote fingerprint against the
    /// cache. `needs_sync` is true when there is no cached fingerprint, the
    /// local hash changed, or the remote fingerprint changed.
    pub async fn detect(
        &self,
        file_name: &str,
        local_content: &str,
    ) -> Result<ChangeReport, WebDavError> {
        let local_hash = Self::content_hash(local_content);
        let cached = self.cache.get(file_name);
        let remote = self.remote_fingerprint(file_name).await?;

        let local_changed = match cached.and_then(|c| c.content_hash.as_deref()) {
            Some(cached_hash) => cached_hash != local_hash,
            None => true,
        };

        let remote_changed = match (&remote, cached) {
            (Some(remote), Some(cached)) => fingerprints_differ(remote, cached),
            // A remote file we have never observed counts as changed.
            (Some(_), None) => true,
            (None, _) => false,
        };

        Ok(ChangeReport {
            needs_sync: local_changed || remote_changed,
            local_changed,
            remote_changed,
            remote,
        })
    }

    /// Batch detection over `(file_name, local_content)` pairs, pacing the
    /// remote lookups. A failure on any single file defaults conservatively
    /// to `needs_sync = true` rather than silently assuming it is in sync.
    pub async fn detect_batch(
        &self,
        files: &[(String, String)],
    ) -> HashMap<String, ChangeReport> {
        let mut reports = HashMap::new();
        for (index, (file_name, content)) in files.iter().enumerate() {
            let report = match self.detect(file_name, content).await {
                Ok(report) => report,
                Err(e) => {
                    warn!("change detection failed for '{}': {}", file_name, e);
                    ChangeReport {
                        needs_sync: true,
                        local_changed: false,
                        remote_changed: false,
                        remote: None,
                    }
                }
            };
            reports.insert(file_name.clone(), report);

            if index + 1 < files.len() {
                sleep(BATCH_REQUEST_DELAY).await;
            }
        }
        reports
    }

    /// Records the observed fingerprints after a successful sync.
    pub async fn record(
        &mut self,
        file_name: &str,
        local_content: &str,
        remote: Option<FileFingerprint>,
    ) {
        let mut fingerprint = remote.unwrap_or_default();
        fingerprint.content_hash = Some(Self::content_hash(local_content));
        self.cache.insert(file_name.to_string(), fingerprint);
        self.save().await;
    }

    /// Drops cache entries for files no longer present locally. Purging is
    /// only for bounded storage, never required for correctness.
    pub async fn purge(&mut self, active_files: &HashSet<String>) {
        let before = self.cache.len();
        self.cache.retain(|file_name, _| active_files.contains(file_name));
        if self.cache.len() != before {
            debug!("purged {} stale fingerprints", before - self.cache.len());
            self.save().await;
        }
    }

    pub fn cached(&self, file_name: &str) -> Option<&FileFingerprint> {
        self.cache.get(file_name)
    }

    fn remote_path(&self, file_name: &str) -> String {
        format!("{}/{}", self.base_path.trim_end_matches('/'), file_name)
    }

    async fn save(&self) {
        let serialized = match serde_json::to_string_pretty(&self.cache) {
            Ok(serialized) => serialized,
            Err(e) => {
                warn!("could not serialize fingerprint cache: {}", e);
                return;
            }
        };
        if let Err(e) = tokio::fs::write(&self.cache_path, serialized).await {
            warn!("could not persist fingerprint cache: {}", e);
        }
    }
}

fn fingerprints_differ(remote: &FileFingerprint, cached: &FileFingerprint) -> bool {
    match (&remote.etag, &cached.etag) {
        (Some(remote_etag), Some(cached_etag)) => remote_etag != cached_etag,
        _ => match (remote.last_modified, cached.last_modified) {
            (Some(remote_time), Some(cached_time)) => remote_time > cached_time,
            // Without either signal we cannot tell; assume unchanged and let
            // the content-hash side of the comparison drive the decision.
            _ => false,
        },
    }
}

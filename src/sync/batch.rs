//! Whole-collection sync workflows built on [`SyncClient`].
//!
//! Each workflow is resilient per item: a failure on one document is recorded
//! in the report and the rest of the batch continues. Connection loss is the
//! one fail-fast case, checked once up front.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::models::ResumeDocument;
use crate::storage::DocumentStore;

use super::client::SyncClient;

/// Timestamps closer than this are treated as equal when classifying
/// conflicts; WebDAV servers commonly round mtimes to whole seconds.
const CLOCK_SKEW_TOLERANCE_MS: i64 = 1_000;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushError {
    pub id: String,
    pub title: String,
    pub error: String,
}

/// Outcome of pushing every local document to the remote store.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushReport {
    pub success: usize,
    pub failed: usize,
    pub total: usize,
    pub errors: Vec<PushError>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullError {
    pub file: String,
    pub error: String,
}

/// Outcome of importing remote documents into the local store.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullReport {
    pub imported: usize,
    pub skipped: usize,
    pub total: usize,
    pub errors: Vec<PullError>,
}

/// Combined outcome of a pull-then-push pass.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BidirectionalReport {
    pub pulled: PullReport,
    pub pushed: PushReport,
}

/// Outcome of removing remote files with no local counterpart.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub deleted: usize,
    pub errors: Vec<String>,
}

/// A document present on both sides whose timestamps disagree by more than
/// the skew tolerance.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictEntry {
    pub id: String,
    pub title: String,
    pub local_time: DateTime<Utc>,
    pub remote_time: DateTime<Utc>,
}

/// Read-only classification of every document across both stores.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub local_only: Vec<String>,
    pub remote_only: Vec<String>,
    pub conflicts: Vec<ConflictEntry>,
    pub synced: usize,
}

/// Runs collection-wide workflows against a connected client and a local
/// document store. Borrows both; owns no state of its own.
pub struct BatchOrchestrator<'a> {
    client: &'a SyncClient,
    store: &'a dyn DocumentStore,
}

impl<'a> BatchOrchestrator<'a> {
    pub fn new(client: &'a SyncClient, store: &'a dyn DocumentStore) -> Self {
        Self { client, store }
    }

    fn ensure_ready(&self) -> Result<()> {
        if !self.client.is_connected() {
            bail!("WebDAV client is not connected");
        }
        Ok(())
    }

    /// Force-pushes every local document. Per-document failures are recorded
    /// and the batch continues.
    pub async fn push_all(&self) -> Result<PushReport> {
        self.ensure_ready()?;

        let documents = self.store.list().await?;
        let total = documents.len();
        let mut report = PushReport {
            success: 0,
            failed: 0,
            total,
            errors: Vec::new(),
        };

        for doc in documents.values() {
            match self.client.smart_save(doc, true).await {
                Ok(_) => report.success += 1,
                Err(e) => {
                    warn!("push failed for '{}': {}", doc.title, e);
                    report.failed += 1;
                    report.errors.push(PushError {
                        id: doc.id.clone(),
                        title: doc.title.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "push complete: {}/{} succeeded",
            report.success, report.total
        );
        Ok(report)
    }

    /// Imports remote documents: absent locally means import, strictly newer
    /// remote overwrites, equal or older remote is skipped. `total` counts
    /// every candidate file; an unreadable or malformed file becomes an error
    /// entry rather than quietly shrinking the report.
    pub async fn pull_all(&self) -> Result<PullReport> {
        self.ensure_ready()?;

        let entries = self.client.list_remote_entries().await?;
        let local = self.store.list().await?;
        let total = entries.len();
        let mut report = PullReport {
            imported: 0,
            skipped: 0,
            total,
            errors: Vec::new(),
        };

        for entry in entries {
            let Some(id) = ResumeDocument::id_from_file_name(&entry.name) else {
                continue;
            };

            let remote_doc = match self.client.download_document(id).await {
                Ok(Some(doc)) => doc,
                Ok(None) => {
                    // Deleted between listing and read.
                    report.errors.push(PullError {
                        file: entry.name.clone(),
                        error: "file disappeared during import".to_string(),
                    });
                    continue;
                }
                Err(e) => {
                    warn!("could not import '{}': {}", entry.name, e);
                    report.errors.push(PullError {
                        file: entry.name.clone(),
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            let keep_remote = match local.get(&remote_doc.id) {
                Some(local_doc) => remote_doc.updated_at > local_doc.updated_at,
                None => true,
            };

            if !keep_remote {
                report.skipped += 1;
                continue;
            }

            match self.store.save(&remote_doc).await {
                Ok(()) => report.imported += 1,
                Err(e) => {
                    warn!("import failed for '{}': {}", remote_doc.title, e);
                    report.errors.push(PullError {
                        file: entry.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "pull complete: {} imported, {} skipped of {}",
            report.imported, report.skipped, report.total
        );
        Ok(report)
    }

    /// Pull first so newer remote edits land locally, then push so the
    /// remote gains anything it was missing. After this both sides hold the
    /// union with last-write-wins per document.
    pub async fn bidirectional_sync(&self) -> Result<BidirectionalReport> {
        self.ensure_ready()?;
        let pulled = self.pull_all().await?;
        let pushed = self.push_all().await?;
        Ok(BidirectionalReport { pulled, pushed })
    }

    /// Deletes remote files whose document id has no local counterpart.
    /// Failed deletions are reported; the file stays for the next pass.
    pub async fn cleanup_orphans(&self) -> Result<CleanupReport> {
        self.ensure_ready()?;

        let local = self.store.list().await?;
        let entries = self.client.list_remote_entries().await?;
        let mut report = CleanupReport {
            deleted: 0,
            errors: Vec::new(),
        };

        for entry in entries {
            let Some(id) = ResumeDocument::id_from_file_name(&entry.name) else {
                continue;
            };
            if local.contains_key(id) {
                continue;
            }
            match self.client.delete_document(id).await {
                Ok(()) => {
                    info!("removed orphaned remote file {}", entry.name);
                    report.deleted += 1;
                }
                Err(e) => {
                    warn!("could not remove orphan {}: {}", entry.name, e);
                    report.errors.push(format!("{}: {}", entry.name, e));
                }
            }
        }
        Ok(report)
    }

    /// Classifies every document without modifying either side.
    pub async fn check_status(&self) -> Result<StatusReport> {
        self.ensure_ready()?;

        let local = self.store.list().await?;
        let remote = self.client.list_remote_documents().await?;

        let mut report = StatusReport {
            local_only: Vec::new(),
            remote_only: Vec::new(),
            conflicts: Vec::new(),
            synced: 0,
        };

        for (id, local_doc) in &local {
            match remote.get(id) {
                None => report.local_only.push(local_doc.title.clone()),
                Some(remote_doc) => {
                    let drift = (local_doc.updated_at - remote_doc.updated_at)
                        .num_milliseconds()
                        .abs();
                    if drift > CLOCK_SKEW_TOLERANCE_MS {
                        report.conflicts.push(ConflictEntry {
                            id: id.clone(),
                            title: local_doc.title.clone(),
                            local_time: local_doc.updated_at,
                            remote_time: remote_doc.updated_at,
                        });
                    } else {
                        report.synced += 1;
                    }
                }
            }
        }

        for (id, remote_doc) in &remote {
            if !local.contains_key(id) {
                report.remote_only.push(remote_doc.title.clone());
            }
        }

        Ok(report)
    }
}

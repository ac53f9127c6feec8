//! Filesystem-backed document store: one pretty-printed JSON file per
//! document, named the same way documents are named remotely.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::models::ResumeDocument;

use super::DocumentStore;

pub struct LocalJsonStore {
    root: PathBuf,
}

impl LocalJsonStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(ResumeDocument::remote_file_name(id))
    }
}

#[async_trait]
impl DocumentStore for LocalJsonStore {
    async fn initialize(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("creating document directory {}", self.root.display()))?;
        Ok(())
    }

    async fn list(&self) -> Result<HashMap<String, ResumeDocument>> {
        let mut documents = HashMap::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(documents),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("reading document directory {}", self.root.display())
                })
            }
        };

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if ResumeDocument::id_from_file_name(&name).is_none() {
                continue;
            }
            let content = match tokio::fs::read_to_string(entry.path()).await {
                Ok(content) => content,
                Err(e) => {
                    warn!("skipping unreadable document file '{}': {}", name, e);
                    continue;
                }
            };
            match serde_json::from_str::<ResumeDocument>(&content) {
                Ok(doc) => {
                    documents.insert(doc.id.clone(), doc);
                }
                Err(e) => warn!("skipping malformed document file '{}': {}", name, e),
            }
        }

        debug!("loaded {} local documents", documents.len());
        Ok(documents)
    }

    async fn get(&self, id: &str) -> Result<Option<ResumeDocument>> {
        match tokio::fs::read_to_string(self.path_for(id)).await {
            Ok(content) => {
                let doc = serde_json::from_str(&content)
                    .with_context(|| format!("parsing local document '{}'", id))?;
                Ok(Some(doc))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading local document '{}'", id)),
        }
    }

    async fn save(&self, doc: &ResumeDocument) -> Result<()> {
        let content = serde_json::to_string_pretty(doc)?;
        tokio::fs::write(self.path_for(&doc.id), content)
            .await
            .with_context(|| format!("writing local document '{}'", doc.id))?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("deleting local document '{}'", id)),
        }
    }
}

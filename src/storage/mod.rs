//! Local document persistence behind a trait so sync workflows never care
//! where documents actually live.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::ResumeDocument;

pub mod local;

pub use local::LocalJsonStore;

/// Local store of résumé documents keyed by id.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Prepares the backing storage; safe to call more than once.
    async fn initialize(&self) -> Result<()>;

    /// All documents, keyed by id.
    async fn list(&self) -> Result<HashMap<String, ResumeDocument>>;

    async fn get(&self, id: &str) -> Result<Option<ResumeDocument>>;

    /// Inserts or replaces by id.
    async fn save(&self, doc: &ResumeDocument) -> Result<()>;

    /// Removing an absent document is a no-op success.
    async fn delete(&self, id: &str) -> Result<()>;
}

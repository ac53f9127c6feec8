//! Transport adapter: one WebDAV verb against one path.
//!
//! Two interchangeable implementations satisfy the [`Transport`] contract:
//! [`DirectTransport`] speaks WebDAV natively over HTTP, and [`RelayTransport`]
//! forwards the same logical operation through a same-origin relay to avoid
//! browser cross-origin restrictions. Selection happens once at connection
//! time; callers above this layer never know which one is active.

pub mod direct;
pub mod error;
pub mod relay;
pub mod xml;

pub use direct::{DirectTransport, RetryConfig};
pub use error::WebDavError;
pub use relay::{ProxyRequest, ProxyResponse, RelayTransport};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata for one remote file or collection.
///
/// Serde camelCase so entries survive a trip through the relay wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEntry {
    /// Base name of the entry (last path segment).
    pub name: String,
    /// Server-reported path (href), percent-decoded.
    pub path: String,
    pub is_directory: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// A single WebDAV operation against a single path.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Lists the entries of a collection. Fails with `NotFound` if the
    /// collection does not exist. The collection itself is not included.
    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>, WebDavError>;

    /// Reads a file as text.
    async fn read(&self, path: &str) -> Result<String, WebDavError>;

    /// Creates or replaces a file. Fails with `Conflict` when the parent
    /// collection is missing; callers are expected to pre-create it.
    async fn write(&self, path: &str, content: &str) -> Result<(), WebDavError>;

    /// Deletes a file. Deleting a non-existent path is success.
    async fn delete(&self, path: &str) -> Result<(), WebDavError>;

    /// Fetches metadata for one path. `NotFound` if absent - this is the
    /// primary existence-check primitive.
    async fn stat(&self, path: &str) -> Result<RemoteEntry, WebDavError>;

    /// Creates a collection. "Already exists" is treated as success.
    async fn make_collection(&self, path: &str) -> Result<(), WebDavError>;
}

/// Standardized User-Agent for all outgoing WebDAV requests.
pub fn build_user_agent() -> String {
    format!("resumedav/{} (WebDAV-Sync)", env!("CARGO_PKG_VERSION"))
}

//! WebDAV synchronization for résumé documents: a direct protocol client, a
//! relay for cross-origin deployments, change detection, and batch workflows
//! over a local document store.

pub mod config;
pub mod models;
pub mod routes;
pub mod storage;
pub mod sync;
pub mod transport;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_helpers;

pub use models::{RemoteConfig, ResumeDocument, SyncState, SyncStatus};
pub use storage::{DocumentStore, LocalJsonStore};
pub use sync::{BatchOrchestrator, ChangeDetector, SyncClient};
pub use transport::{DirectTransport, RelayTransport, Transport, WebDavError};

pub mod resume;

pub use resume::{RemoteConfig, ResumeDocument, SyncState, SyncStatus};

//! Synchronization layer: client, change detection, and batch workflows.

pub mod batch;
pub mod client;
pub mod detector;

pub use batch::{
    BatchOrchestrator, BidirectionalReport, CleanupReport, ConflictEntry, PullReport, PushReport,
    StatusReport,
};
pub use client::{ConnectMode, SmartSaveOutcome, SyncClient};
pub use detector::{ChangeDetector, ChangeReport, FileFingerprint};

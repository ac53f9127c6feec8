//! The owned handle representing "my connection to a remote store".

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Result};
use tracing::{debug, info, warn};

use crate::models::{RemoteConfig, ResumeDocument, SyncState};
use crate::transport::{DirectTransport, RelayTransport, RemoteEntry, Transport, WebDavError};

/// How the transport is chosen at connect time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectMode {
    /// Try a direct WebDAV connection first, fall back to the relay.
    Auto,
    /// Direct connection only.
    Direct,
    /// Relay only; avoids the noisy cross-origin failure a browser direct
    /// attempt produces.
    RelayOnly,
}

/// Outcome of a reconciliation-aware save.
#[derive(Debug)]
pub enum SmartSaveOutcome {
    /// The local document was written to the remote store.
    Uploaded,
    /// The remote copy was strictly newer; nothing was overwritten and the
    /// newer remote document is returned for the caller to adopt.
    RemoteNewer(ResumeDocument),
}

/// Sync client owning the connection lifecycle and per-document operations.
///
/// An explicit handle rather than a process-wide singleton: construct one per
/// configuration and drop or [`SyncClient::disconnect`] it when done.
pub struct SyncClient {
    transport: Option<Arc<dyn Transport>>,
    config: Option<RemoteConfig>,
    relay_url: Option<String>,
    state: Arc<RwLock<SyncState>>,
}

impl SyncClient {
    pub fn new() -> Self {
        Self {
            transport: None,
            config: None,
            relay_url: None,
            state: Arc::new(RwLock::new(SyncState::default())),
        }
    }

    /// A client that may fall back to (or be forced onto) the given relay.
    pub fn with_relay(relay_url: impl Into<String>) -> Self {
        let mut client = Self::new();
        client.relay_url = Some(relay_url.into());
        client
    }

    /// A client over an already-selected transport, marked connected.
    /// Useful for embedders with their own transport and for tests.
    pub fn with_transport(config: RemoteConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport: Some(transport),
            config: Some(config),
            relay_url: None,
            state: Arc::new(RwLock::new(SyncState::synced())),
        }
    }

    /// Connects to the remote store: selects a transport, ensures the base
    /// path exists, and marks the connection `synced`.
    ///
    /// Returns `false` (with status `error`) on failure instead of an `Err`,
    /// since callers need a non-exceptional path to display connection
    /// problems. Idempotent: reconnecting with the same config neither
    /// duplicates collections nor corrupts state.
    pub async fn connect(&mut self, config: RemoteConfig, mode: ConnectMode) -> bool {
        if let Err(e) = config.validate() {
            self.set_state(SyncState::error(e.to_string()));
            return false;
        }

        let transport = match self.select_transport(&config, mode).await {
            Ok(transport) => transport,
            Err(e) => {
                warn!("WebDAV connection failed: {}", e);
                self.set_state(SyncState::error(e.to_string()));
                return false;
            }
        };

        // Base-path creation failures are not fatal here; a genuinely
        // missing collection will surface as Conflict on the first write.
        if let Err(e) = ensure_base_path_with(transport.as_ref(), &config).await {
            warn!(
                "could not ensure base path '{}': {}",
                config.normalized_base_path(),
                e
            );
        }

        self.transport = Some(transport);
        self.config = Some(config);
        self.set_state(SyncState::synced());
        info!("WebDAV connection established");
        true
    }

    async fn select_transport(
        &self,
        config: &RemoteConfig,
        mode: ConnectMode,
    ) -> Result<Arc<dyn Transport>> {
        match mode {
            ConnectMode::Direct => self.try_direct(config).await,
            ConnectMode::RelayOnly => self.try_relay(config).await,
            ConnectMode::Auto => match self.try_direct(config).await {
                Ok(transport) => Ok(transport),
                Err(direct_err) => {
                    info!(
                        "direct WebDAV connection failed ({}), trying relay",
                        direct_err
                    );
                    self.try_relay(config)
                        .await
                        .map_err(|relay_err| anyhow!("{}; {}", direct_err, relay_err))
                }
            },
        }
    }

    async fn try_direct(&self, config: &RemoteConfig) -> Result<Arc<dyn Transport>> {
        let transport = DirectTransport::new(config.clone())?;
        // A root PROPFIND proves both reachability and credentials;
        // NotFound still means the server answered.
        match transport.stat("/").await {
            Ok(_) | Err(WebDavError::NotFound(_)) => Ok(Arc::new(transport)),
            Err(e) => Err(anyhow!("direct connection test failed: {}", e)),
        }
    }

    async fn try_relay(&self, config: &RemoteConfig) -> Result<Arc<dyn Transport>> {
        let relay_url = self
            .relay_url
            .as_ref()
            .ok_or_else(|| anyhow!("no relay URL configured"))?;
        let transport = RelayTransport::new(relay_url.clone(), config.clone())?;
        if transport.test_connection().await {
            Ok(Arc::new(transport))
        } else {
            Err(anyhow!("relay connection test failed"))
        }
    }

    /// Creates every missing segment of the configured base path.
    /// Safe to call repeatedly; existing segments are left untouched.
    pub async fn ensure_base_path(&self) -> Result<()> {
        let (transport, config) = self.active()?;
        ensure_base_path_with(transport.as_ref(), config).await?;
        Ok(())
    }

    /// Existence check. `NotFound` becomes `false`; any other failure
    /// propagates so callers don't mistake an outage for absence.
    pub async fn exists(&self, path: &str) -> Result<bool> {
        let (transport, _) = self.active()?;
        match transport.stat(path).await {
            Ok(_) => Ok(true),
            Err(WebDavError::NotFound(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Serializes the document to its canonical remote path and writes it
    /// unconditionally - the last-writer-wins primitive.
    pub async fn upload_document(&self, doc: &ResumeDocument) -> Result<()> {
        let (transport, config) = self.active()?;
        let path = config.document_path(&doc.id);
        let content = serde_json::to_string_pretty(doc)?;
        transport.write(&path, &content).await?;
        debug!("uploaded '{}' to {}", doc.title, path);
        Ok(())
    }

    /// Downloads and deserializes one document. Absence is `None`; malformed
    /// content is an error for this call, never silently swallowed.
    pub async fn download_document(&self, id: &str) -> Result<Option<ResumeDocument>> {
        let (transport, config) = self.active()?;
        let path = config.document_path(id);
        match transport.read(&path).await {
            Ok(content) => {
                let doc = serde_json::from_str(&content)
                    .map_err(|e| anyhow!("malformed remote document '{}': {}", id, e))?;
                Ok(Some(doc))
            }
            Err(WebDavError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Lists the remote file entries that follow the document naming
    /// convention (`resume-*.json`), without reading their contents.
    pub async fn list_remote_entries(&self) -> Result<Vec<RemoteEntry>> {
        let (transport, config) = self.active()?;
        let entries = transport.list(&config.normalized_base_path()).await?;
        Ok(entries
            .into_iter()
            .filter(|entry| {
                !entry.is_directory && ResumeDocument::id_from_file_name(&entry.name).is_some()
            })
            .collect())
    }

    /// Reads and parses every remote document, keyed by the id that
    /// round-trips out of the file contents.
    ///
    /// A parse failure on one file is logged and that file skipped; it must
    /// not abort enumeration of the rest.
    pub async fn list_remote_documents(&self) -> Result<HashMap<String, ResumeDocument>> {
        let (transport, config) = self.active()?;
        let entries = self.list_remote_entries().await?;

        let mut documents = HashMap::new();
        for entry in entries {
            let path = config.file_path(&entry.name);
            match transport.read(&path).await {
                Ok(content) => match serde_json::from_str::<ResumeDocument>(&content) {
                    Ok(doc) => {
                        documents.insert(doc.id.clone(), doc);
                    }
                    Err(e) => warn!("skipping malformed remote file '{}': {}", entry.name, e),
                },
                Err(e) => warn!("skipping unreadable remote file '{}': {}", entry.name, e),
            }
        }
        debug!("enumerated {} remote documents", documents.len());
        Ok(documents)
    }

    /// Reconciliation-aware save.
    ///
    /// Unless `force_sync` is set, the remote copy's `updated_at` is checked
    /// first; a strictly newer remote wins and is returned instead of being
    /// clobbered by the stale local copy. One extra read buys the check -
    /// deliberately cheaper than a version-vector scheme.
    pub async fn smart_save(
        &self,
        doc: &ResumeDocument,
        force_sync: bool,
    ) -> Result<SmartSaveOutcome> {
        self.active()?;
        self.set_state(SyncState::syncing());

        let result = self.smart_save_inner(doc, force_sync).await;
        match &result {
            Ok(SmartSaveOutcome::Uploaded) => {
                info!("résumé '{}' synced to remote", doc.title);
                self.set_state(SyncState::synced());
            }
            Ok(SmartSaveOutcome::RemoteNewer(_)) => {
                info!("résumé '{}' kept newer remote version", doc.title);
                self.set_state(SyncState::synced());
            }
            Err(e) => self.set_state(SyncState::error(e.to_string())),
        }
        result
    }

    async fn smart_save_inner(
        &self,
        doc: &ResumeDocument,
        force_sync: bool,
    ) -> Result<SmartSaveOutcome> {
        if !force_sync {
            if let Some(remote) = self.download_document(&doc.id).await? {
                if remote.updated_at > doc.updated_at {
                    return Ok(SmartSaveOutcome::RemoteNewer(remote));
                }
            }
        }
        self.upload_document(doc).await?;
        Ok(SmartSaveOutcome::Uploaded)
    }

    /// Deletes the remote copy of a document. A file that was never uploaded
    /// is a no-op success.
    pub async fn delete_document(&self, id: &str) -> Result<()> {
        let (transport, config) = self.active()?;
        self.set_state(SyncState::syncing());

        let path = config.document_path(id);
        let result: Result<()> = async {
            if self.exists(&path).await? {
                transport.delete(&path).await?;
                info!("deleted remote document {}", path);
            } else {
                debug!("remote document {} already absent", path);
            }
            Ok(())
        }
        .await;

        match &result {
            Ok(()) => self.set_state(SyncState::synced()),
            Err(e) => self.set_state(SyncState::error(e.to_string())),
        }
        result
    }

    /// Clears all connection state and resets the status to idle.
    /// Safe to call even if never connected.
    pub fn disconnect(&mut self) {
        self.transport = None;
        self.config = None;
        self.set_state(SyncState::default());
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    pub fn config(&self) -> Option<&RemoteConfig> {
        self.config.as_ref()
    }

    /// Snapshot of the current sync state.
    pub fn status(&self) -> SyncState {
        self.state
            .read()
            .map(|state| state.clone())
            .unwrap_or_default()
    }

    /// Shared handle for observers (UI status indicators).
    pub fn state_handle(&self) -> Arc<RwLock<SyncState>> {
        Arc::clone(&self.state)
    }

    fn active(&self) -> Result<(&Arc<dyn Transport>, &RemoteConfig)> {
        match (&self.transport, &self.config) {
            (Some(transport), Some(config)) => Ok((transport, config)),
            _ => Err(anyhow!("WebDAV client is not connected")),
        }
    }

    fn set_state(&self, new_state: SyncState) {
        if let Ok(mut state) = self.state.write() {
            *state = new_state;
        }
    }
}

impl Default for SyncClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Walks the base path segment by segment, creating whatever is missing.
/// Creating an already-existing segment is not an error.
async fn ensure_base_path_with(
    transport: &dyn Transport,
    config: &RemoteConfig,
) -> Result<(), WebDavError> {
    let base = config.normalized_base_path();
    if base.is_empty() {
        return Ok(());
    }

    let mut current = String::new();
    for segment in base.split('/').filter(|s| !s.is_empty()) {
        current.push('/');
        current.push_str(segment);

        let present = match transport.stat(&current).await {
            Ok(_) => true,
            Err(WebDavError::NotFound(_)) => false,
            Err(e) => return Err(e),
        };
        if !present {
            match transport.make_collection(&current).await {
                Ok(()) => debug!("created remote collection {}", current),
                // Lost a race with another client creating the same segment.
                Err(WebDavError::Conflict(_)) => {}
                Err(e) => return Err(e),
            }
        }
    }
    Ok(())
}

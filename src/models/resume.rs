use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A résumé record, the unit of synchronization.
///
/// Serialized with camelCase field names because the same JSON layout is used
/// both in the local store and on the remote WebDAV server. The `id` and
/// `updated_at` fields are load-bearing on the wire: `id` reconstructs the
/// mapping key after a round trip, `updated_at` is the sole input to
/// recency decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeDocument {
    pub id: String,
    pub title: String,
    /// Arbitrary structured content: sections, free-form fields.
    #[serde(default)]
    pub content: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResumeDocument {
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            content: serde_json::Value::Null,
            created_at: now,
            updated_at: now,
        }
    }

    /// Canonical remote file name for a document id: `resume-{id}.json`
    pub fn remote_file_name(id: &str) -> String {
        format!("resume-{}.json", id)
    }

    /// Extracts the document id back out of a remote file name.
    /// Returns `None` for files that don't follow the naming convention.
    pub fn id_from_file_name(file_name: &str) -> Option<&str> {
        file_name
            .strip_prefix("resume-")?
            .strip_suffix(".json")
            .filter(|id| !id.is_empty())
    }

    /// Bumps `updated_at` to now, marking the document as locally edited.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Connection parameters for a remote WebDAV store.
///
/// camelCase serde names match the relay wire format (`serverUrl`, `basePath`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
    pub server_url: String,
    pub username: String,
    pub password: String,
    /// Remote collection under which all document files live.
    #[serde(default = "default_base_path")]
    pub base_path: String,
}

fn default_base_path() -> String {
    "/resumes".to_string()
}

impl RemoteConfig {
    pub fn new(
        server_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            server_url: server_url.into(),
            username: username.into(),
            password: password.into(),
            base_path: default_base_path(),
        }
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server_url.trim().is_empty() {
            anyhow::bail!("WebDAV server URL cannot be empty");
        }
        url::Url::parse(self.server_url.trim())
            .map_err(|e| anyhow::anyhow!("invalid WebDAV server URL '{}': {}", self.server_url, e))?;
        if self.username.trim().is_empty() {
            anyhow::bail!("WebDAV username cannot be empty");
        }
        if self.password.is_empty() {
            anyhow::bail!("WebDAV password cannot be empty");
        }
        Ok(())
    }

    /// Base path with a leading slash and no trailing slash (`"/resumes"`).
    /// An empty or `/` base path normalizes to the empty string (server root).
    pub fn normalized_base_path(&self) -> String {
        let trimmed = self.base_path.trim().trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{}", trimmed)
        }
    }

    /// Full remote path for one document: `{basePath}/resume-{id}.json`
    pub fn document_path(&self, id: &str) -> String {
        format!(
            "{}/{}",
            self.normalized_base_path(),
            ResumeDocument::remote_file_name(id)
        )
    }

    /// Full remote path for an arbitrary file name under the base path.
    pub fn file_path(&self, file_name: &str) -> String {
        format!("{}/{}", self.normalized_base_path(), file_name)
    }
}

/// Connection-wide synchronization status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStatus {
    #[serde(rename = "idle")]
    Idle,
    #[serde(rename = "syncing")]
    Syncing,
    #[serde(rename = "synced")]
    Synced,
    #[serde(rename = "error")]
    Error,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStatus::Idle => write!(f, "idle"),
            SyncStatus::Syncing => write!(f, "syncing"),
            SyncStatus::Synced => write!(f, "synced"),
            SyncStatus::Error => write!(f, "error"),
        }
    }
}

/// Observable sync state: status plus last-sync timestamp and last error.
///
/// Mutated only by the sync client; read by any observer. Two overlapping
/// workflows can interleave transitions (last writer wins) - this is an
/// accepted race for the single-user usage pattern, not a serialized design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    pub status: SyncStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            status: SyncStatus::Idle,
            last_sync: None,
            error: None,
        }
    }
}

impl SyncState {
    pub fn syncing() -> Self {
        Self {
            status: SyncStatus::Syncing,
            last_sync: None,
            error: None,
        }
    }

    pub fn synced() -> Self {
        Self {
            status: SyncStatus::Synced,
            last_sync: Some(Utc::now()),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: SyncStatus::Error,
            last_sync: None,
            error: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_file_name_round_trip() {
        let name = ResumeDocument::remote_file_name("abc-123");
        assert_eq!(name, "resume-abc-123.json");
        assert_eq!(ResumeDocument::id_from_file_name(&name), Some("abc-123"));
    }

    #[test]
    fn test_id_from_file_name_rejects_other_files() {
        assert_eq!(ResumeDocument::id_from_file_name("notes.txt"), None);
        assert_eq!(ResumeDocument::id_from_file_name("resume-.json"), None);
        assert_eq!(ResumeDocument::id_from_file_name("resume-x.json.bak"), None);
        assert_eq!(ResumeDocument::id_from_file_name("backup-resume-x.json"), None);
    }

    #[test]
    fn test_base_path_normalization() {
        let mut config = RemoteConfig::new("https://dav.example.com", "user", "pass");
        assert_eq!(config.normalized_base_path(), "/resumes");

        config.base_path = "resumes/".to_string();
        assert_eq!(config.normalized_base_path(), "/resumes");

        config.base_path = "/".to_string();
        assert_eq!(config.normalized_base_path(), "");

        config.base_path = "/backups/resumes/".to_string();
        assert_eq!(config.document_path("a1"), "/backups/resumes/resume-a1.json");
    }

    #[test]
    fn test_config_validation() {
        let config = RemoteConfig::new("https://dav.example.com", "user", "pass");
        assert!(config.validate().is_ok());

        let bad_url = RemoteConfig::new("not a url", "user", "pass");
        assert!(bad_url.validate().is_err());

        let missing_user = RemoteConfig::new("https://dav.example.com", "", "pass");
        assert!(missing_user.validate().is_err());
    }

    #[test]
    fn test_document_serializes_camel_case() {
        let doc = ResumeDocument::new("My Résumé");
        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.contains("\"updatedAt\""));
        assert!(json.contains("\"createdAt\""));

        let parsed: ResumeDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, doc);
    }

    #[test]
    fn test_sync_status_display_matches_serde() {
        for status in [
            SyncStatus::Idle,
            SyncStatus::Syncing,
            SyncStatus::Synced,
            SyncStatus::Error,
        ] {
            let serialized = serde_json::to_string(&status).unwrap();
            assert_eq!(serialized, format!("\"{}\"", status));
        }
    }
}

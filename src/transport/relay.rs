//! Relay WebDAV client.
//!
//! Forwards each logical operation through a trusted same-origin relay
//! (see [`crate::routes::relay`]) instead of talking to the WebDAV server
//! directly, sidestepping browser cross-origin restrictions.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::RemoteConfig;

use super::{RemoteEntry, Transport, WebDavError};

/// Wire format of one relayed WebDAV operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequest {
    pub config: RemoteConfig,
    pub method: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
}

/// Relay reply: either `data` on success or `error` with an HTTP status
/// inferred by the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// WebDAV transport that forwards operations through the relay endpoint.
pub struct RelayTransport {
    client: Client,
    relay_url: String,
    config: RemoteConfig,
}

impl RelayTransport {
    pub fn new(relay_url: impl Into<String>, config: RemoteConfig) -> Result<Self, WebDavError> {
        config
            .validate()
            .map_err(|e| WebDavError::Transport(e.to_string()))?;
        Ok(Self {
            client: Client::new(),
            relay_url: relay_url.into().trim_end_matches('/').to_string(),
            config,
        })
    }

    async fn proxy(
        &self,
        method: &str,
        path: &str,
        body: Option<String>,
    ) -> Result<ProxyResponse, WebDavError> {
        let request = ProxyRequest {
            config: self.config.clone(),
            method: method.to_string(),
            path: path.to_string(),
            body,
            headers: None,
        };

        debug!("relay {} {}", method, path);
        let response = self
            .client
            .post(format!("{}/api/webdav/proxy-request", self.relay_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| WebDavError::Transport(format!("relay unreachable: {}", e)))?;

        let status = response.status();
        let reply: ProxyResponse = response
            .json()
            .await
            .map_err(|e| WebDavError::Parse(format!("invalid relay response: {}", e)))?;

        if !status.is_success() {
            let message = reply
                .error
                .unwrap_or_else(|| format!("relay returned HTTP {}", status));
            return Err(WebDavError::from_status(status.as_u16(), path, message));
        }
        if !reply.success {
            return Err(WebDavError::Transport(
                reply
                    .error
                    .unwrap_or_else(|| "relay reported failure without detail".to_string()),
            ));
        }
        Ok(reply)
    }

    /// Hits the relay's connectivity-test endpoint, which attempts a
    /// root-directory listing with the given credentials.
    pub async fn test_connection(&self) -> bool {
        let result = self
            .client
            .get(format!("{}/api/webdav/test-connection", self.relay_url))
            .query(&[
                ("serverUrl", self.config.server_url.as_str()),
                ("username", self.config.username.as_str()),
                ("password", self.config.password.as_str()),
            ])
            .send()
            .await;

        match result {
            Ok(response) => {
                let reply: Result<ProxyResponse, _> = response.json().await;
                matches!(reply, Ok(ProxyResponse { success: true, .. }))
            }
            Err(e) => {
                warn!("relay connection test failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl Transport for RelayTransport {
    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>, WebDavError> {
        // The trailing slash tells the relay this GET is a collection listing.
        let collection_path = if path.ends_with('/') {
            path.to_string()
        } else {
            format!("{}/", path)
        };
        let reply = self.proxy("GET", &collection_path, None).await?;
        let data = reply.data.unwrap_or(serde_json::Value::Array(Vec::new()));
        serde_json::from_value(data)
            .map_err(|e| WebDavError::Parse(format!("invalid relay listing: {}", e)))
    }

    async fn read(&self, path: &str) -> Result<String, WebDavError> {
        let reply = self.proxy("GET", path, None).await?;
        match reply.data {
            Some(serde_json::Value::String(content)) => Ok(content),
            Some(other) => Ok(other.to_string()),
            None => Ok(String::new()),
        }
    }

    async fn write(&self, path: &str, content: &str) -> Result<(), WebDavError> {
        self.proxy("PUT", path, Some(content.to_string())).await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), WebDavError> {
        match self.proxy("DELETE", path, None).await {
            Ok(_) => Ok(()),
            // The relay's own transport already treats absent paths as
            // success; tolerate it here as well for older relays.
            Err(WebDavError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn stat(&self, path: &str) -> Result<RemoteEntry, WebDavError> {
        let reply = self.proxy("PROPFIND", path, None).await?;
        let data = reply
            .data
            .ok_or_else(|| WebDavError::Parse(format!("relay stat of '{}' had no data", path)))?;
        serde_json::from_value(data)
            .map_err(|e| WebDavError::Parse(format!("invalid relay stat entry: {}", e)))
    }

    async fn make_collection(&self, path: &str) -> Result<(), WebDavError> {
        self.proxy("MKCOL", path, None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_request_wire_format() {
        let request = ProxyRequest {
            config: RemoteConfig::new("https://dav.example.com", "user", "secret"),
            method: "PROPFIND".to_string(),
            path: "/resumes/resume-a.json".to_string(),
            body: None,
            headers: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"serverUrl\""));
        assert!(json.contains("\"basePath\""));
        assert!(!json.contains("\"body\""));
    }

    #[test]
    fn test_proxy_response_defaults() {
        let reply: ProxyResponse =
            serde_json::from_str(r#"{"success":false,"error":"not found"}"#).unwrap();
        assert!(!reply.success);
        assert_eq!(reply.error.as_deref(), Some("not found"));
        assert!(reply.data.is_none());
    }

    #[test]
    fn test_relay_url_trailing_slash_is_trimmed() {
        let config = RemoteConfig::new("https://dav.example.com", "user", "secret");
        let relay = RelayTransport::new("http://localhost:8000/", config).unwrap();
        assert_eq!(relay.relay_url, "http://localhost:8000");
    }
}

//! Direct WebDAV client speaking the protocol natively over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, Method, StatusCode};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::models::RemoteConfig;

use super::xml::{parse_multistatus, PROPFIND_BODY};
use super::{build_user_agent, RemoteEntry, Transport, WebDavError};

/// Bounded retry with exponential backoff for transient failures.
///
/// Every remote call in the original design was attempted exactly once; a
/// flaky network turned into a hard user-facing failure. Transient transport
/// and server errors are now retried a small number of times.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub timeout_seconds: u64,
    pub rate_limit_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
            timeout_seconds: 30,
            rate_limit_backoff_ms: 5_000,
        }
    }
}

/// WebDAV transport performing verbs directly against the remote server.
pub struct DirectTransport {
    client: Client,
    config: RemoteConfig,
    retry: RetryConfig,
}

impl DirectTransport {
    pub fn new(config: RemoteConfig) -> Result<Self, WebDavError> {
        Self::with_retry(config, RetryConfig::default())
    }

    pub fn with_retry(config: RemoteConfig, retry: RetryConfig) -> Result<Self, WebDavError> {
        config
            .validate()
            .map_err(|e| WebDavError::Transport(e.to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(retry.timeout_seconds))
            .build()
            .map_err(|e| WebDavError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            retry,
        })
    }

    fn url_for(&self, path: &str) -> String {
        let base = self.config.server_url.trim().trim_end_matches('/');
        let clean = path.trim_start_matches('/');
        if clean.is_empty() {
            format!("{}/", base)
        } else {
            format!("{}/{}", base, clean)
        }
    }

    /// delay = initial * multiplier^attempt * (0.9..1.1), capped at max_delay_ms.
    /// The jitter breaks up synchronized retries from concurrent clients.
    fn retry_delay_with_jitter(&self, attempt: u32) -> u64 {
        let exponential = (self.retry.initial_delay_ms as f64
            * self.retry.backoff_multiplier.powi(attempt as i32)) as u64;
        let capped = std::cmp::min(exponential, self.retry.max_delay_ms);
        let jitter = 0.9 + rand::rng().random::<f64>() * 0.2;
        std::cmp::min((capped as f64 * jitter) as u64, self.retry.max_delay_ms)
    }

    /// Sends one authenticated request, retrying transient failures.
    ///
    /// Server errors (5xx) and connection errors retry up to `max_retries`;
    /// 429 waits out the rate-limit backoff; client errors return immediately
    /// so each verb can apply its own status mapping.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&str>,
        headers: &[(&str, &str)],
    ) -> Result<reqwest::Response, WebDavError> {
        let url = self.url_for(path);
        let user_agent = build_user_agent();
        let mut attempt = 0;

        loop {
            let mut request = self
                .client
                .request(method.clone(), &url)
                .basic_auth(&self.config.username, Some(&self.config.password))
                .header("User-Agent", &user_agent);

            for (key, value) in headers {
                request = request.header(*key, *value);
            }
            if let Some(content) = body {
                request = request.body(content.to_string());
            }

            debug!("{} {}", method, url);
            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    // Rate-limit waits count against the retry budget too, so
                    // a persistently throttling server cannot loop forever.
                    if status.as_u16() == 429 && attempt < self.retry.max_retries {
                        warn!(
                            "rate limited by {}, backing off {}ms (attempt {}/{})",
                            self.config.server_url,
                            self.retry.rate_limit_backoff_ms,
                            attempt + 1,
                            self.retry.max_retries
                        );
                        sleep(Duration::from_millis(self.retry.rate_limit_backoff_ms)).await;
                        attempt += 1;
                        continue;
                    }

                    if status.is_server_error() && attempt < self.retry.max_retries {
                        let delay = self.retry_delay_with_jitter(attempt);
                        warn!(
                            "server error {} on {} {}, retrying in {}ms (attempt {}/{})",
                            status,
                            method,
                            url,
                            delay,
                            attempt + 1,
                            self.retry.max_retries
                        );
                        sleep(Duration::from_millis(delay)).await;
                        attempt += 1;
                        continue;
                    }

                    return Ok(response);
                }
                Err(e) => {
                    if attempt < self.retry.max_retries {
                        let delay = self.retry_delay_with_jitter(attempt);
                        warn!(
                            "request error on {} {}: {}, retrying in {}ms (attempt {}/{})",
                            method,
                            url,
                            e,
                            delay,
                            attempt + 1,
                            self.retry.max_retries
                        );
                        sleep(Duration::from_millis(delay)).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(WebDavError::Transport(format!(
                        "request failed after {} attempts: {}",
                        self.retry.max_retries + 1,
                        e
                    )));
                }
            }
        }
    }

    async fn map_failure(response: reqwest::Response, path: &str) -> WebDavError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = if body.trim().is_empty() {
            status.to_string()
        } else {
            body
        };
        WebDavError::from_status(status.as_u16(), path, message)
    }

    fn propfind() -> Result<Method, WebDavError> {
        Method::from_bytes(b"PROPFIND").map_err(|e| WebDavError::Transport(e.to_string()))
    }

    fn mkcol() -> Result<Method, WebDavError> {
        Method::from_bytes(b"MKCOL").map_err(|e| WebDavError::Transport(e.to_string()))
    }
}

fn is_multistatus(status: StatusCode) -> bool {
    status.is_success() || status.as_u16() == 207
}

#[async_trait]
impl Transport for DirectTransport {
    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>, WebDavError> {
        // Collections are requested with a trailing slash; some servers 301
        // the slashless form.
        let collection_path = if path.ends_with('/') {
            path.to_string()
        } else {
            format!("{}/", path)
        };

        let response = self
            .request(
                Self::propfind()?,
                &collection_path,
                Some(PROPFIND_BODY),
                &[("Depth", "1"), ("Content-Type", "application/xml")],
            )
            .await?;

        if !is_multistatus(response.status()) {
            return Err(Self::map_failure(response, path).await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| WebDavError::Transport(e.to_string()))?;
        let mut entries = parse_multistatus(&body)?;

        // Drop the requested collection itself; hrefs may carry a
        // server-side prefix, so match by suffix.
        let requested = path.trim_end_matches('/');
        entries.retain(|entry| {
            if !entry.is_directory {
                return true;
            }
            let entry_path = entry.path.trim_end_matches('/');
            if requested.is_empty() {
                !entry_path.is_empty()
            } else {
                !entry_path.ends_with(requested)
            }
        });

        debug!("listed {} entries under {}", entries.len(), path);
        Ok(entries)
    }

    async fn read(&self, path: &str) -> Result<String, WebDavError> {
        let response = self.request(Method::GET, path, None, &[]).await?;
        if !response.status().is_success() {
            return Err(Self::map_failure(response, path).await);
        }
        response
            .text()
            .await
            .map_err(|e| WebDavError::Transport(e.to_string()))
    }

    async fn write(&self, path: &str, content: &str) -> Result<(), WebDavError> {
        let response = self
            .request(Method::PUT, path, Some(content), &[])
            .await?;
        if !response.status().is_success() {
            return Err(Self::map_failure(response, path).await);
        }
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), WebDavError> {
        let response = self.request(Method::DELETE, path, None, &[]).await?;
        let status = response.status();
        // Idempotent: deleting something that is already gone is fine.
        if status.is_success() || status.as_u16() == 404 {
            return Ok(());
        }
        Err(Self::map_failure(response, path).await)
    }

    async fn stat(&self, path: &str) -> Result<RemoteEntry, WebDavError> {
        let response = self
            .request(
                Self::propfind()?,
                path,
                Some(PROPFIND_BODY),
                &[("Depth", "0"), ("Content-Type", "application/xml")],
            )
            .await?;

        if !is_multistatus(response.status()) {
            return Err(Self::map_failure(response, path).await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| WebDavError::Transport(e.to_string()))?;
        parse_multistatus(&body)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                WebDavError::Parse(format!("empty multistatus response for '{}'", path))
            })
    }

    async fn make_collection(&self, path: &str) -> Result<(), WebDavError> {
        let response = self.request(Self::mkcol()?, path, None, &[]).await?;
        let status = response.status();
        // 405 means the collection already exists.
        if status.is_success() || status.as_u16() == 405 {
            return Ok(());
        }
        Err(Self::map_failure(response, path).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_transport() -> DirectTransport {
        let config = RemoteConfig::new("https://dav.example.com/remote", "user", "secret");
        DirectTransport::new(config).expect("transport should build")
    }

    #[test]
    fn test_url_construction() {
        let transport = test_transport();
        assert_eq!(
            transport.url_for("/resumes/resume-a.json"),
            "https://dav.example.com/remote/resumes/resume-a.json"
        );
        assert_eq!(
            transport.url_for("resumes/"),
            "https://dav.example.com/remote/resumes/"
        );
        assert_eq!(transport.url_for("/"), "https://dav.example.com/remote/");
    }

    #[test]
    fn test_retry_delay_stays_within_jitter_bounds() {
        let transport = test_transport();
        for attempt in 0..5 {
            let delay = transport.retry_delay_with_jitter(attempt);
            let base = (500.0 * 2.0_f64.powi(attempt as i32)) as u64;
            let capped = std::cmp::min(base, 10_000);
            assert!(delay >= (capped as f64 * 0.9) as u64);
            assert!(delay <= 10_000);
        }
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = RemoteConfig::new("not a url", "user", "secret");
        assert!(DirectTransport::new(config).is_err());
    }
}

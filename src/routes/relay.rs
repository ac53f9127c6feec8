//! Relay endpoints that perform WebDAV operations server-side on behalf of
//! browser clients, which cannot reach cross-origin WebDAV servers directly.
//!
//! The relay is stateless: every request carries the full remote
//! configuration and a fresh transport is built per call. Credentials are
//! used for the one operation and never persisted or logged.

use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::models::RemoteConfig;
use crate::transport::relay::{ProxyRequest, ProxyResponse};
use crate::transport::{DirectTransport, Transport, WebDavError};

const SUPPORTED_METHODS: &[&str] = &["GET", "PUT", "DELETE", "POST", "PROPFIND", "MKCOL"];

/// `POST /api/webdav/proxy-request`: executes one WebDAV operation against
/// the server named in the request body.
pub async fn proxy_request(Json(payload): Json<Value>) -> Response {
    let request: ProxyRequest = match serde_json::from_value(payload) {
        Ok(request) => request,
        Err(e) => {
            return failure(
                StatusCode::BAD_REQUEST,
                format!("invalid proxy request: {}", e),
                None,
                None,
            );
        }
    };

    let method = request.method.to_uppercase();
    let path = request.path.clone();

    if let Err(message) = validate_config(&request.config) {
        return failure(StatusCode::BAD_REQUEST, message, Some(&method), Some(&path));
    }
    if !SUPPORTED_METHODS.contains(&method.as_str()) {
        return failure(
            StatusCode::METHOD_NOT_ALLOWED,
            format!("unsupported WebDAV method '{}'", method),
            Some(&method),
            Some(&path),
        );
    }

    let transport = match DirectTransport::new(request.config.clone()) {
        Ok(transport) => transport,
        Err(e) => {
            return failure(
                StatusCode::BAD_REQUEST,
                e.to_string(),
                Some(&method),
                Some(&path),
            );
        }
    };

    debug!("relaying {} {}", method, path);
    let outcome = dispatch(&transport, &method, &path, request.body.as_deref()).await;

    match outcome {
        Ok(data) => success(data, &method, &path),
        Err(Dispatch::Unimplemented) => failure(
            StatusCode::NOT_IMPLEMENTED,
            format!("method '{}' is accepted but not implemented", method),
            Some(&method),
            Some(&path),
        ),
        Err(Dispatch::Dav(e)) => {
            warn!("relayed {} {} failed: {}", method, path, e);
            failure(error_status(&e), e.to_string(), Some(&method), Some(&path))
        }
    }
}

enum Dispatch {
    Dav(WebDavError),
    Unimplemented,
}

impl From<WebDavError> for Dispatch {
    fn from(e: WebDavError) -> Self {
        Dispatch::Dav(e)
    }
}

async fn dispatch(
    transport: &DirectTransport,
    method: &str,
    path: &str,
    body: Option<&str>,
) -> Result<Value, Dispatch> {
    match method {
        "GET" => {
            if is_collection_path(path) {
                let entries = transport.list(path).await?;
                Ok(serde_json::to_value(entries).map_err(parse_error)?)
            } else {
                let content = transport.read(path).await?;
                Ok(Value::String(content))
            }
        }
        "PUT" => {
            transport.write(path, body.unwrap_or("")).await?;
            Ok(Value::Null)
        }
        "DELETE" => {
            transport.delete(path).await?;
            Ok(Value::Null)
        }
        "PROPFIND" => {
            let entry = transport.stat(path).await?;
            Ok(serde_json::to_value(entry).map_err(parse_error)?)
        }
        "MKCOL" => {
            transport.make_collection(path).await?;
            Ok(Value::Null)
        }
        // Accepted so clients get a stable answer, but no WebDAV verb maps
        // onto plain POST.
        "POST" => Err(Dispatch::Unimplemented),
        _ => Err(Dispatch::Dav(WebDavError::Transport(format!(
            "unsupported method '{}'",
            method
        )))),
    }
}

fn parse_error(e: serde_json::Error) -> Dispatch {
    Dispatch::Dav(WebDavError::Parse(e.to_string()))
}

/// A trailing slash always means a collection; otherwise a final segment
/// without an extension is assumed to be one.
fn is_collection_path(path: &str) -> bool {
    if path.ends_with('/') {
        return true;
    }
    match path.rsplit('/').next() {
        Some(last) => !last.contains('.'),
        None => true,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestConnectionParams {
    pub server_url: String,
    pub username: String,
    pub password: String,
}

/// `GET /api/webdav/test-connection`: verifies the given credentials by
/// listing the server root.
pub async fn test_connection(Query(params): Query<TestConnectionParams>) -> Response {
    let config = RemoteConfig::new(params.server_url, params.username, params.password);
    if let Err(message) = validate_config(&config) {
        return failure(StatusCode::BAD_REQUEST, message, None, None);
    }

    let transport = match DirectTransport::new(config) {
        Ok(transport) => transport,
        Err(e) => return failure(StatusCode::BAD_REQUEST, e.to_string(), None, None),
    };

    match transport.list("/").await {
        Ok(entries) => success(
            Value::String(format!("connected; {} entries at root", entries.len())),
            "GET",
            "/",
        ),
        Err(e) => {
            warn!("connection test failed: {}", e);
            failure(error_status(&e), e.to_string(), None, None)
        }
    }
}

fn validate_config(config: &RemoteConfig) -> Result<(), String> {
    if config.server_url.trim().is_empty()
        || config.username.trim().is_empty()
        || config.password.is_empty()
    {
        return Err("serverUrl, username and password are required".to_string());
    }
    config.validate().map_err(|e| e.to_string())
}

/// Maps a transport failure to the relay's own response status.
pub fn error_status(error: &WebDavError) -> StatusCode {
    match error {
        WebDavError::Unauthorized => StatusCode::UNAUTHORIZED,
        WebDavError::Forbidden => StatusCode::FORBIDDEN,
        WebDavError::NotFound(_) => StatusCode::NOT_FOUND,
        WebDavError::Conflict(_) => StatusCode::CONFLICT,
        WebDavError::Transport(message) => infer_status_from_message(message),
        WebDavError::Parse(_) => StatusCode::INTERNAL_SERVER_ERROR,
        WebDavError::Http { status, .. } => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Fallback status inference for errors that only carry prose, matching on
/// well-known substrings.
pub fn infer_status_from_message(message: &str) -> StatusCode {
    let lowered = message.to_lowercase();
    if lowered.contains("unauthorized") || lowered.contains("401") {
        StatusCode::UNAUTHORIZED
    } else if lowered.contains("forbidden") || lowered.contains("403") {
        StatusCode::FORBIDDEN
    } else if lowered.contains("not found") || lowered.contains("404") {
        StatusCode::NOT_FOUND
    } else if lowered.contains("conflict") || lowered.contains("409") {
        StatusCode::CONFLICT
    } else if lowered.contains("network") || lowered.contains("connection") {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn success(data: Value, method: &str, path: &str) -> Response {
    let body = ProxyResponse {
        success: true,
        data: if data.is_null() { None } else { Some(data) },
        error: None,
        method: Some(method.to_string()),
        path: Some(path.to_string()),
    };
    (StatusCode::OK, Json(body)).into_response()
}

fn failure(status: StatusCode, error: String, method: Option<&str>, path: Option<&str>) -> Response {
    let body = ProxyResponse {
        success: false,
        data: None,
        error: Some(error),
        method: method.map(str::to_string),
        path: path.map(str::to_string),
    };
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_path_heuristic() {
        assert!(is_collection_path("/resumes/"));
        assert!(is_collection_path("/resumes"));
        assert!(is_collection_path("/"));
        assert!(!is_collection_path("/resumes/resume-a.json"));
        assert!(!is_collection_path("/backup.tar.gz"));
    }

    #[test]
    fn test_error_status_variant_mapping() {
        assert_eq!(
            error_status(&WebDavError::NotFound("/x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            error_status(&WebDavError::Unauthorized),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            error_status(&WebDavError::Conflict("/x".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            error_status(&WebDavError::Http {
                status: 418,
                message: "teapot".into()
            }),
            StatusCode::IM_A_TEAPOT
        );
    }

    #[test]
    fn test_status_inference_from_prose() {
        assert_eq!(
            infer_status_from_message("401 Unauthorized"),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            infer_status_from_message("resource not found"),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            infer_status_from_message("connection refused"),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            infer_status_from_message("network timeout"),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            infer_status_from_message("something exploded"),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_config_validation_rejects_blank_fields() {
        let config = RemoteConfig::new("", "user", "secret");
        assert!(validate_config(&config).is_err());

        let config = RemoteConfig::new("https://dav.example.com", "user", "");
        assert!(validate_config(&config).is_err());

        let config = RemoteConfig::new("https://dav.example.com", "user", "secret");
        assert!(validate_config(&config).is_ok());
    }
}

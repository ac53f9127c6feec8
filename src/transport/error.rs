use thiserror::Error;

/// Error taxonomy for WebDAV operations.
///
/// `NotFound` is often an expected outcome (existence checks translate it to
/// `false`) and must stay distinguishable from real failures.
#[derive(Debug, Error)]
pub enum WebDavError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("unauthorized: WebDAV credentials were rejected")]
    Unauthorized,

    #[error("forbidden: the server refused the operation")]
    Forbidden,

    #[error("conflict: parent collection is missing for '{0}'")]
    Conflict(String),

    #[error("network error: {0}")]
    Transport(String),

    #[error("malformed server response: {0}")]
    Parse(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
}

impl WebDavError {
    /// Maps an HTTP status to the matching taxonomy variant.
    /// Statuses without a dedicated variant keep the raw status code.
    pub fn from_status(status: u16, path: &str, message: impl Into<String>) -> Self {
        match status {
            401 => WebDavError::Unauthorized,
            403 => WebDavError::Forbidden,
            404 => WebDavError::NotFound(path.to_string()),
            409 => WebDavError::Conflict(path.to_string()),
            502 | 503 | 504 => WebDavError::Transport(message.into()),
            _ => WebDavError::Http {
                status,
                message: message.into(),
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, WebDavError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_maps_taxonomy() {
        assert!(matches!(
            WebDavError::from_status(401, "/p", "denied"),
            WebDavError::Unauthorized
        ));
        assert!(matches!(
            WebDavError::from_status(403, "/p", "nope"),
            WebDavError::Forbidden
        ));
        assert!(WebDavError::from_status(404, "/p", "gone").is_not_found());
        assert!(matches!(
            WebDavError::from_status(409, "/p", "conflict"),
            WebDavError::Conflict(_)
        ));
        assert!(matches!(
            WebDavError::from_status(502, "/p", "bad gateway"),
            WebDavError::Transport(_)
        ));
        assert!(matches!(
            WebDavError::from_status(418, "/p", "teapot"),
            WebDavError::Http { status: 418, .. }
        ));
    }
}

//! HTTP surface of the relay server.

use axum::routing::{get, post};
use axum::Router;

pub mod relay;

pub fn router() -> Router {
    Router::new()
        .route("/api/webdav/proxy-request", post(relay::proxy_request))
        .route("/api/webdav/test-connection", get(relay::test_connection))
}

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use resumedav::routes;
use resumedav::transport::{ProxyRequest, ProxyResponse};
use resumedav::RemoteConfig;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn send_proxy(payload: serde_json::Value) -> (StatusCode, ProxyResponse) {
    let request = Request::builder()
        .method("POST")
        .uri("/api/webdav/proxy-request")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&payload).unwrap()))
        .unwrap();

    let response = routes::router().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap();
    (status, body)
}

fn proxy_payload(server: &MockServer, http_method: &str, dav_path: &str) -> serde_json::Value {
    let request = ProxyRequest {
        config: RemoteConfig::new(server.uri(), "user", "secret"),
        method: http_method.to_string(),
        path: dav_path.to_string(),
        body: None,
        headers: None,
    };
    serde_json::to_value(request).unwrap()
}

#[tokio::test]
async fn test_rejects_incomplete_config() {
    let payload = serde_json::json!({
        "config": {"serverUrl": "https://dav.example.com", "username": "user"},
        "method": "GET",
        "path": "/resumes/"
    });
    let (status, body) = send_proxy(payload).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!body.success);
    assert!(body.error.is_some());
}

#[tokio::test]
async fn test_rejects_blank_credentials() {
    let payload = serde_json::json!({
        "config": {"serverUrl": "https://dav.example.com", "username": "user", "password": ""},
        "method": "GET",
        "path": "/resumes/"
    });
    let (status, body) = send_proxy(payload).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!body.success);
}

#[tokio::test]
async fn test_rejects_unsupported_method() {
    let server = MockServer::start().await;
    let (status, body) = send_proxy(proxy_payload(&server, "PATCH", "/resumes/")).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert!(!body.success);
}

#[tokio::test]
async fn test_post_is_accepted_but_unimplemented() {
    let server = MockServer::start().await;
    let (status, body) = send_proxy(proxy_payload(&server, "POST", "/resumes/")).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert!(!body.success);
}

#[tokio::test]
async fn test_put_then_get_through_relay() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/resumes/resume-a.json"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/resumes/resume-a.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"id\":\"a\"}"))
        .mount(&server)
        .await;

    let mut payload = proxy_payload(&server, "PUT", "/resumes/resume-a.json");
    payload["body"] = serde_json::Value::String("{\"id\":\"a\"}".to_string());
    let (status, body) = send_proxy(payload).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.success);
    assert_eq!(body.method.as_deref(), Some("PUT"));

    let (status, body) = send_proxy(proxy_payload(&server, "GET", "/resumes/resume-a.json")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body.data,
        Some(serde_json::Value::String("{\"id\":\"a\"}".to_string()))
    );
}

#[tokio::test]
async fn test_backend_not_found_maps_to_404() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let (status, body) =
        send_proxy(proxy_payload(&server, "GET", "/resumes/resume-gone.json")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(!body.success);
}

#[tokio::test]
async fn test_backend_unauthorized_maps_to_401() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let (status, body) =
        send_proxy(proxy_payload(&server, "PUT", "/resumes/resume-a.json")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(!body.success);
}

#[tokio::test]
async fn test_test_connection_succeeds_against_live_server() {
    let server = MockServer::start().await;
    Mock::given(method("PROPFIND"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(207).set_body_string(
            r#"<?xml version="1.0"?>
<D:multistatus xmlns:D="DAV:">
  <D:response>
    <D:href>/</D:href>
    <D:propstat>
      <D:prop><D:resourcetype><D:collection/></D:resourcetype></D:prop>
      <D:status>HTTP/1.1 200 OK</D:status>
    </D:propstat>
  </D:response>
</D:multistatus>"#,
        ))
        .mount(&server)
        .await;

    let uri = format!(
        "/api/webdav/test-connection?serverUrl={}&username=user&password=secret",
        urlencoding::encode(&server.uri())
    );
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = routes::router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: ProxyResponse = serde_json::from_slice(&bytes).unwrap();
    assert!(body.success);
}

#[tokio::test]
async fn test_test_connection_requires_credentials() {
    let request = Request::builder()
        .uri("/api/webdav/test-connection?serverUrl=https%3A%2F%2Fdav.example.com&username=user")
        .body(Body::empty())
        .unwrap();
    let response = routes::router().oneshot(request).await.unwrap();
    // Missing query fields are rejected before any WebDAV traffic happens.
    assert!(response.status().is_client_error());
}

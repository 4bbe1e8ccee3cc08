//! Integration tests for the REST API

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use poller::{DeadlineStore, MetricsRegistry, ServiceList, Status, StoreHandle};
use poller_server::api::{ApiState, router};
use poller_server::DEFAULT_WEB_ROOT;
use poller_server::types::AddServiceResponse;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn setup() -> (Router, StoreHandle) {
    let store = StoreHandle::new(DeadlineStore::new(Duration::from_secs(60)));
    let metrics = Some(Arc::new(MetricsRegistry::new()));
    let app = router(ApiState::new(store.clone(), metrics), None);
    (app, store)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

fn post_service(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/service")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_add_and_list_service() {
    let (app, store) = setup();

    let (status, body) = send(
        &app,
        post_service(r#"{"name": "bing", "url": "https://www.bing.com"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let res: AddServiceResponse = serde_json::from_slice(&body).unwrap();
    assert!(!res.id.is_empty());
    assert!(store.get(&res.id).await.is_some());

    let (status, body) = send(&app, get("/service")).await;
    assert_eq!(status, StatusCode::OK);

    let list: ServiceList = serde_json::from_slice(&body).unwrap();
    assert_eq!(list.services.len(), 1);
    assert_eq!(list.services[0].id, res.id);
    assert_eq!(list.services[0].name, "bing");
    assert_eq!(list.services[0].url, "https://www.bing.com");
    assert_eq!(list.services[0].status, Status::Unknown);

    // Wire format uses the minute timestamp and upper case status
    let raw: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(raw["services"][0]["status"], "UNKNOWN");
    assert_eq!(raw["services"][0]["lastCheck"], "1970-01-01 00:00");
}

#[tokio::test]
async fn test_list_keeps_insertion_order() {
    let (app, store) = setup();
    for name in ["one", "two", "three"] {
        store.add(name, format!("http://{name}.example")).await;
    }

    let (_, body) = send(&app, get("/service")).await;
    let list: ServiceList = serde_json::from_slice(&body).unwrap();
    let names: Vec<_> = list.services.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["one", "two", "three"]);
}

#[tokio::test]
async fn test_list_empty() {
    let (app, _store) = setup();

    let (status, body) = send(&app, get("/service")).await;
    assert_eq!(status, StatusCode::OK);

    let raw: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(raw, serde_json::json!({ "services": [] }));
}

#[tokio::test]
async fn test_delete_service() {
    let (app, store) = setup();
    let id = store.add("bing", "https://www.bing.com").await;

    let (status, _) = send(&app, delete(&format!("/service/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(store.is_empty().await);

    // Second delete finds nothing
    let (status, _) = send(&app, delete(&format!("/service/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_nonexistent_service() {
    let (app, store) = setup();
    store.add("bing", "https://www.bing.com").await;

    let (status, body) = send(&app, delete("/service/nonexistent-id")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(store.len().await, 1);

    let raw: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(raw["error"].as_str().unwrap().contains("nonexistent-id"));
}

#[tokio::test]
async fn test_invalid_bodies_are_rejected() {
    let (app, store) = setup();

    let bodies = [
        "not json",
        r#"{"name": "bing"}"#,
        r#"{"name": "", "url": "https://www.bing.com"}"#,
        r#"{"name": "bing", "url": "www.bing.com"}"#,
        r#"{"name": "bing", "url": "ftp://www.bing.com"}"#,
    ];

    for body in bodies {
        let (status, response) = send(&app, post_service(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");

        let raw: serde_json::Value = serde_json::from_slice(&response).unwrap();
        assert!(raw["error"].is_string(), "body: {body}");
    }

    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_missing_content_type_is_rejected() {
    let (app, _store) = setup();

    let request = Request::builder()
        .method("POST")
        .uri("/service")
        .body(Body::from(r#"{"name": "bing", "url": "https://www.bing.com"}"#))
        .unwrap();

    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _store) = setup();

    send(
        &app,
        post_service(r#"{"name": "bing", "url": "https://www.bing.com"}"#),
    )
    .await;
    send(&app, delete("/service/nonexistent-id")).await;

    let (status, body) = send(&app, get("/metrics")).await;
    assert_eq!(status, StatusCode::OK);

    let text = String::from_utf8(body).unwrap();
    assert!(text.contains(r#"poller_api_requests_total{operation="add",code="200"} 1"#));
    assert!(text.contains(r#"poller_api_requests_total{operation="delete",code="404"} 1"#));
    assert!(text.contains("poller_services_tracked 1"));
}

#[tokio::test]
async fn test_metrics_disabled() {
    let store = StoreHandle::new(DeadlineStore::new(Duration::from_secs(60)));
    let app = router(ApiState::new(store, None), None);

    let (status, _) = send(&app, get("/metrics")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_static_assets_fallback() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>Poller</h1>").unwrap();

    let store = StoreHandle::new(DeadlineStore::new(Duration::from_secs(60)));
    let app = router(ApiState::new(store, None), Some(dir.path()));

    let (status, body) = send(&app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"<h1>Poller</h1>");

    let (status, _) = send(&app, get("/missing.js")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // API routes still win over static files
    let (status, _) = send(&app, get("/service")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_bundled_web_ui() {
    let store = StoreHandle::new(DeadlineStore::new(Duration::from_secs(60)));
    let app = router(
        ApiState::new(store, None),
        Some(std::path::Path::new(DEFAULT_WEB_ROOT)),
    );

    let (status, body) = send(&app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("<script src=\"app.js\"></script>"));

    let (status, body) = send(&app, get("/app.js")).await;
    assert_eq!(status, StatusCode::OK);
    let script = String::from_utf8(body).unwrap();
    assert!(script.contains(r#"request("GET", "service")"#));
    assert!(script.contains(r#"request("POST", "service""#));
    assert!(script.contains(r#"request("DELETE", "service/""#));
}

#[tokio::test]
async fn test_unknown_route_without_web_root() {
    let (app, _store) = setup();

    let (status, _) = send(&app, get("/index.html")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

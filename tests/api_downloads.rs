//! Black-box tests for `/api/downloads/*` and the `X-Api-Key` auth gate.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SINGLE_VIDEO_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<response>
  <error>OK</error>
  <status_code>1</status_code>
  <results>
    <video>
      <id>42</id>
      <guid>2300-42</guid>
      <name>Enqueue Me</name>
      <hd_url>https://cdn.example.com/42-hd.mp4</hd_url>
    </video>
  </results>
  <version>1.0</version>
</response>"#;

async fn request(router: axum::Router, method: &str, uri: &str, api_key: Option<&str>, body: Value) -> StatusCode {
    let mut builder = Request::builder().method(method).uri(uri).header("content-type", "application/json");
    if let Some(key) = api_key {
        builder = builder.header("X-Api-Key", key);
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();
    router.oneshot(request).await.unwrap().status()
}

#[tokio::test]
async fn enqueue_download_fetches_entity_then_queues_primary_and_images() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/video/2300-42/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SINGLE_VIDEO_XML))
        .mount(&mock_server)
        .await;

    let (indexer, _temp) = common::spawn_indexer(&mock_server.uri()).await;
    let router = media_indexer::api::create_router(indexer.clone());

    let status = request(
        router,
        "POST",
        "/api/downloads/enqueue",
        Some(common::TEST_API_KEY),
        json!({"obj_item_name": "video", "obj_id": 42}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let downloads = indexer.store.list_downloads(10, 0).await.unwrap();
    assert_eq!(downloads.len(), 1);
    assert_eq!(downloads[0].entity_id, 42);
}

#[tokio::test]
async fn enqueue_rejects_non_video_entity_kinds() {
    let mock_server = MockServer::start().await;
    let (indexer, _temp) = common::spawn_indexer(&mock_server.uri()).await;
    let router = media_indexer::api::create_router(indexer);

    let status = request(
        router,
        "POST",
        "/api/downloads/enqueue",
        Some(common::TEST_API_KEY),
        json!({"obj_item_name": "video_show", "obj_id": 1}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn mutating_request_without_configured_key_is_rejected() {
    let mock_server = MockServer::start().await;
    let (indexer, _temp) = common::spawn_indexer_with_api_key(&mock_server.uri(), None).await;
    let router = media_indexer::api::create_router(indexer);

    let status = request(router, "POST", "/api/downloads/get", None, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn mutating_request_with_wrong_key_is_unauthorized() {
    let mock_server = MockServer::start().await;
    let (indexer, _temp) = common::spawn_indexer(&mock_server.uri()).await;
    let router = media_indexer::api::create_router(indexer);

    let status = request(router, "POST", "/api/downloads/get", Some("wrong-key"), json!({})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn get_requests_pass_through_without_any_key() {
    let mock_server = MockServer::start().await;
    let (indexer, _temp) = common::spawn_indexer(&mock_server.uri()).await;
    let router = media_indexer::api::create_router(indexer);

    let request = Request::builder().method("GET").uri("/api/system/get-indexer-state").body(Body::empty()).unwrap();
    let status = router.oneshot(request).await.unwrap().status();
    assert_eq!(status, StatusCode::OK);
}

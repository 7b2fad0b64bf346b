//! Black-box tests for `/api/videos/*`, driving the real router with an
//! upstream catalog API stubbed by `wiremock`.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const VIDEO_PAGE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<response>
  <error>OK</error>
  <limit>2</limit>
  <offset>0</offset>
  <number_of_page_results>2</number_of_page_results>
  <number_of_total_results>2</number_of_total_results>
  <status_code>1</status_code>
  <results>
    <video>
      <id>101</id>
      <guid>2300-101</guid>
      <name>First</name>
      <hd_url>https://cdn.example.com/101-hd.mp4</hd_url>
    </video>
    <video>
      <id>102</id>
      <guid>2300-102</guid>
      <name>Second</name>
      <low_url>https://cdn.example.com/102-low.mp4</low_url>
    </video>
  </results>
  <version>1.0</version>
</response>"#;

const SINGLE_VIDEO_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<response>
  <error>OK</error>
  <status_code>1</status_code>
  <results>
    <video>
      <id>101</id>
      <guid>2300-101</guid>
      <name>First</name>
      <hd_url>https://cdn.example.com/101-hd.mp4</hd_url>
    </video>
  </results>
  <version>1.0</version>
</response>"#;

async fn post(router: axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("X-Api-Key", common::TEST_API_KEY)
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
}

#[tokio::test]
async fn browse_videos_fetches_and_merges_a_page() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/videos/"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(VIDEO_PAGE_XML))
        .mount(&mock_server)
        .await;

    let (indexer, _temp) = common::spawn_indexer(&mock_server.uri()).await;
    let router = media_indexer::api::create_router(indexer);

    let (status, body) = post(router, "/api/videos/browse", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["videos"].as_array().unwrap().len(), 2);
    assert_eq!(body["total_results"], 2);
    assert_eq!(body["is_last_page"], true);
    assert!(body["session_id"].is_string());
}

#[tokio::test]
async fn get_one_video_merges_upstream_result_into_store() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/video/2300-101/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SINGLE_VIDEO_XML))
        .mount(&mock_server)
        .await;

    let (indexer, _temp) = common::spawn_indexer(&mock_server.uri()).await;
    let router = media_indexer::api::create_router(indexer);

    let (status, body) = post(router, "/api/videos/get-one", json!({"id": 101})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "First");
    assert_eq!(body["hd_url"], "https://cdn.example.com/101-hd.mp4");
}

#[tokio::test]
async fn get_one_video_propagates_upstream_error_status() {
    let mock_server = MockServer::start().await;
    let not_found_xml = r#"<?xml version="1.0"?><response><error>Not Found</error><status_code>100</status_code><results></results></response>"#;
    Mock::given(method("GET"))
        .and(path("/api/video/2300-999/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(not_found_xml))
        .mount(&mock_server)
        .await;

    let (indexer, _temp) = common::spawn_indexer(&mock_server.uri()).await;
    let router = media_indexer::api::create_router(indexer);

    let (status, _body) = post(router, "/api/videos/get-one", json!({"id": 999})).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn list_videos_reads_local_store_without_hitting_upstream() {
    // No mocks registered: any upstream request would fail the test server's
    // default "no matching mock" behavior, proving the local listing never
    // calls out.
    let mock_server = MockServer::start().await;
    let (indexer, _temp) = common::spawn_indexer(&mock_server.uri()).await;
    let router = media_indexer::api::create_router(indexer);

    let (status, body) = post(router, "/api/videos/get", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 0);
}

//! Black-box tests for `/api/settings/*`.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::MockServer;

#[tokio::test]
async fn modify_then_get_all_round_trips_a_setting() {
    let mock_server = MockServer::start().await;
    let (indexer, _temp) = common::spawn_indexer(&mock_server.uri()).await;
    let router = media_indexer::api::create_router(indexer);

    let request = Request::builder()
        .method("POST")
        .uri("/api/settings/modify")
        .header("content-type", "application/json")
        .header("X-Api-Key", common::TEST_API_KEY)
        .body(Body::from(json!({"key": "quick_lookback_hours", "value": "48"}).to_string()))
        .unwrap();
    let status = router.clone().oneshot(request).await.unwrap().status();
    assert_eq!(status, StatusCode::NO_CONTENT);

    let request = Request::builder().method("GET").uri("/api/settings/get-all").body(Body::empty()).unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["settings"]["quick_lookback_hours"], "48");
}

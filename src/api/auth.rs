//! Authentication middleware for the REST API.
//!
//! Every mutating request (anything but `GET`) requires the server to have
//! an `api.api_key` configured; if not, the request fails closed with `400`
//! rather than silently running unauthenticated. Once a key is configured,
//! the caller must also present a matching `X-Api-Key` header or the
//! request is rejected with `401`. `GET` requests are never gated — they
//! carry no side effects and the spec only calls out mutating endpoints.

use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

use crate::config::Config;
use crate::error::ApiError;

/// Gates mutating requests on a configured, matching `X-Api-Key` header.
pub async fn require_api_key(State(config): State<Arc<Config>>, request: Request, next: Next) -> Response {
    if request.method() == Method::GET {
        return next.run(request).await;
    }

    let configured_key = config.api.api_key.as_deref().filter(|k| !k.is_empty());
    let Some(expected) = configured_key else {
        return missing_key_response();
    };

    let provided = request.headers().get("x-api-key").and_then(|v| v.to_str().ok());

    match provided {
        Some(provided) if constant_time_eq(provided.as_bytes(), expected.as_bytes()) => next.run(request).await,
        Some(_) => unauthorized_response("invalid X-Api-Key header"),
        None => unauthorized_response("missing X-Api-Key header"),
    }
}

/// Constant-time byte comparison to avoid leaking key length/prefix via
/// response-timing side channels.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

fn missing_key_response() -> Response {
    let body = ApiError::new("missing_api_key", "API key is not configured on this server");
    (axum::http::StatusCode::BAD_REQUEST, Json(body)).into_response()
}

fn unauthorized_response(message: &str) -> Response {
    (axum::http::StatusCode::UNAUTHORIZED, Json(ApiError::unauthorized(message))).into_response()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode};
    use axum::middleware;
    use axum::routing::{get, post};
    use axum::Router;
    use tower::ServiceExt;

    fn config_with_key(key: Option<&str>) -> Arc<Config> {
        let mut config = Config::default();
        config.api.api_key = key.map(str::to_string);
        Arc::new(config)
    }

    async fn handler() -> &'static str {
        "ok"
    }

    fn app(config: Arc<Config>) -> Router {
        Router::new()
            .route("/get", get(handler))
            .route("/mutate", post(handler))
            .layer(middleware::from_fn_with_state(config, require_api_key))
    }

    #[tokio::test]
    async fn get_requests_never_gated() {
        let app = app(config_with_key(None));
        let req = HttpRequest::builder().uri("/get").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn mutation_without_configured_key_is_bad_request() {
        let app = app(config_with_key(None));
        let req = HttpRequest::builder()
            .method("POST")
            .uri("/mutate")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn mutation_with_blank_configured_key_is_bad_request() {
        let app = app(config_with_key(Some("")));
        let req = HttpRequest::builder()
            .method("POST")
            .uri("/mutate")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn mutation_with_matching_key_succeeds() {
        let app = app(config_with_key(Some("secret")));
        let req = HttpRequest::builder()
            .method("POST")
            .uri("/mutate")
            .header("X-Api-Key", "secret")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn mutation_with_wrong_key_is_unauthorized() {
        let app = app(config_with_key(Some("secret")));
        let req = HttpRequest::builder()
            .method("POST")
            .uri("/mutate")
            .header("X-Api-Key", "wrong")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn mutation_missing_header_is_unauthorized() {
        let app = app(config_with_key(Some("secret")));
        let req = HttpRequest::builder()
            .method("POST")
            .uri("/mutate")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}

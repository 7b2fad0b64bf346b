//! Wires [`crate::error::Error`] and [`crate::error::ApiError`] into Axum's
//! `IntoResponse`, so route handlers can simply return `Result<T, Error>`
//! and `?` their way out — the status-code and error-code mapping all
//! lives in [`crate::error::ToHttpStatus`].

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::{ApiError, Error, ToHttpStatus};

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body: ApiError = self.into();
        (status, Json(body)).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Used when a handler builds an `ApiError` directly rather than
        // propagating a domain `Error` — no status code travels with it,
        // so this always reports 500. Handlers that need a specific status
        // should return `Error` instead.
        (StatusCode::INTERNAL_SERVER_ERROR, Json(self)).into_response()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DownloadError, PaginatorError};

    #[tokio::test]
    async fn not_found_maps_to_404() {
        let response = Error::NotFound("video 7".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_api_key_maps_to_400() {
        let response = Error::MissingApiKey.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn end_of_results_maps_to_410() {
        let response = Error::Paginator(PaginatorError::EndOfResults).into_response();
        assert_eq!(response.status(), StatusCode::GONE);
    }

    #[tokio::test]
    async fn download_already_in_state_maps_to_409() {
        let response = Error::Download(DownloadError::AlreadyInState {
            id: 1,
            state: "complete".into(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn body_carries_error_code_and_message() {
        let response = Error::NotFound("video 7".into()).into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"]["code"], "not_found");
        assert!(value["error"]["message"].as_str().unwrap().contains("video 7"));
    }
}

//! `GET /media/video/:id/file` — serves a downloaded video's bytes
//! directly off disk, honoring `Range` requests so players can seek.
//!
//! Grounded on the `fs` feature of `tower-http`, already part of this
//! crate's dependency stack: [`tower_http::services::ServeFile`] parses
//! and responds to `Range`/`If-Range` headers on its own, so this handler
//! only needs to resolve which on-disk path belongs to the requested video.

use axum::body::Body;
use axum::extract::{Path, Request, State};
use axum::response::{IntoResponse, Response};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::api::state::AppState;
use crate::error::{Error, Result};
use crate::types::EntityKind;

/// Streams a video's primary media file, if it has been downloaded.
#[utoipa::path(
    get,
    path = "/media/video/{id}/file",
    tag = "media",
    params(("id" = i64, Path, description = "Video id")),
    responses(
        (status = 200, description = "Video bytes (Range-capable)"),
        (status = 404, description = "Video unknown, or not yet downloaded"),
    ),
)]
pub async fn stream_video_file(State(state): State<AppState>, Path(id): Path<i64>, request: Request) -> Result<Response> {
    let video = state
        .indexer
        .store
        .get_video(id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("video {id}")))?;

    let (field, _) = video
        .default_download_url()
        .ok_or_else(|| Error::NotFound(format!("video {id} has no downloadable media field")))?;

    let file = state
        .indexer
        .store
        .get_file(EntityKind::Video, id, field)
        .await?
        .ok_or_else(|| Error::NotFound(format!("video {id} has no file record")))?;

    if !file.downloaded {
        return Err(Error::NotFound(format!("video {id} has not finished downloading")));
    }

    let response = ServeFile::new(&file.path)
        .oneshot(request)
        .await
        .map_err(|_: std::convert::Infallible| Error::Other("file service error".into()))?;

    Ok(response.map(Body::new).into_response())
}

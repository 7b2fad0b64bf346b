//! `/api/downloads/*` — listing and enqueueing of download records.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::state::AppState;
use crate::error::{Error, Result};
use crate::store::downloads::Download;
use crate::types::{DownloadStatus, EntityKind};

/// Query body for `/api/downloads/get`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct DownloadsQuery {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
    /// Filters to one lifecycle status (`queued`, `in_progress`, ...) when set.
    #[serde(default)]
    pub status: Option<String>,
}

/// Body for `/api/downloads/get-one`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct DownloadLookup {
    pub id: i64,
}

/// Body for `/api/downloads/enqueue`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct EnqueueRequest {
    pub obj_item_name: String,
    pub obj_id: i64,
}

/// Response from `/api/downloads/enqueue`.
#[derive(Debug, Serialize, ToSchema)]
pub struct EnqueueResponse {
    pub download_id: i64,
}

fn parse_status(s: &str) -> Option<DownloadStatus> {
    match s {
        "queued" => Some(DownloadStatus::Queued),
        "in_progress" => Some(DownloadStatus::InProgress),
        "paused" => Some(DownloadStatus::Paused),
        "complete" => Some(DownloadStatus::Complete),
        "failed" => Some(DownloadStatus::Failed),
        "cancelled" => Some(DownloadStatus::Cancelled),
        _ => None,
    }
}

/// Filterable listing of downloads.
#[utoipa::path(
    post,
    path = "/api/downloads/get",
    tag = "downloads",
    request_body = DownloadsQuery,
    responses((status = 200, description = "Matching downloads", body = [Download])),
)]
pub async fn list_downloads(State(state): State<AppState>, Json(query): Json<DownloadsQuery>) -> Result<Json<Vec<Download>>> {
    let limit = query.limit.unwrap_or(50);
    let offset = query.offset.unwrap_or(0);

    let downloads = match &query.status {
        None => state.indexer.store.list_downloads(limit, offset).await?,
        Some(status) => {
            let wanted = parse_status(status)
                .ok_or_else(|| Error::InvalidArgument(format!("unknown download status {status}")))?;
            // The store has no status-indexed query; a full unfiltered scan
            // plus an in-process filter is acceptable at queue sizes this
            // service expects (spec.md has no pagination-at-scale goal here).
            state
                .indexer
                .store
                .list_downloads(i64::MAX.min(100_000), 0)
                .await?
                .into_iter()
                .filter(|d| d.status() == wanted)
                .skip(offset.max(0) as usize)
                .take(limit.max(0) as usize)
                .collect()
        }
    };

    Ok(Json(downloads))
}

/// Looks up a single download by id.
#[utoipa::path(
    post,
    path = "/api/downloads/get-one",
    tag = "downloads",
    request_body = DownloadLookup,
    responses(
        (status = 200, description = "The download", body = Download),
        (status = 404, description = "No such download"),
    ),
)]
pub async fn get_one_download(State(state): State<AppState>, Json(body): Json<DownloadLookup>) -> Result<Json<Download>> {
    let download = state
        .indexer
        .store
        .get_download(body.id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("download {}", body.id)))?;
    Ok(Json(download))
}

/// Queues a download for an already-indexed entity.
#[utoipa::path(
    post,
    path = "/api/downloads/enqueue",
    tag = "downloads",
    request_body = EnqueueRequest,
    responses(
        (status = 200, description = "Download queued", body = EnqueueResponse),
        (status = 400, description = "Unsupported entity kind"),
        (status = 404, description = "Entity not yet indexed"),
    ),
)]
pub async fn enqueue_download(State(state): State<AppState>, Json(body): Json<EnqueueRequest>) -> Result<Json<EnqueueResponse>> {
    let kind = EntityKind::from_item_name(&body.obj_item_name)
        .ok_or_else(|| Error::InvalidArgument(format!("unknown entity kind {}", body.obj_item_name)))?;

    let download_id = match kind {
        EntityKind::Video => {
            state.indexer.downloader.ensure_entity_cached(kind, body.obj_id).await?;
            let video = state
                .indexer
                .store
                .get_video(body.obj_id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("video {}", body.obj_id)))?;
            state.indexer.downloader.enqueue_video_with_images(&video).await?
        }
        _ => {
            return Err(Error::InvalidArgument(format!(
                "downloads can only be enqueued for videos, not {kind}"
            )));
        }
    };

    Ok(Json(EnqueueResponse { download_id }))
}

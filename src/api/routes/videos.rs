//! `/api/videos/*` — local listing, upstream-backed single lookup, and a
//! stateful paginated browse over the upstream `videos` collection.

use axum::Json;
use axum::extract::State;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::state::AppState;
use crate::catalog::{self, Filters, ResourceSelect};
use crate::error::{Error, RequesterError, Result};
use crate::store::entities::Video;
use crate::types::{EntityKind, RequestPriority, guid_for};

/// Query body for `/api/videos/get` (local store listing).
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct VideosQuery {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

/// Body for `/api/videos/get-one`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct VideoLookup {
    pub id: i64,
}

/// Body for `/api/videos/browse`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct BrowseRequest {
    /// Resumes a prior browse cursor; omit to start a new one.
    #[serde(default)]
    pub session_id: Option<Uuid>,
    /// Applied only when starting a new session — ignored on resume.
    #[serde(default)]
    pub filters: Option<Filters>,
}

/// Response from `/api/videos/browse`.
#[derive(Debug, Serialize, ToSchema)]
pub struct BrowseResponse {
    pub session_id: Uuid,
    pub videos: Vec<Video>,
    pub total_results: Option<i64>,
    pub current_page: i64,
    pub total_pages: i64,
    pub is_last_page: bool,
}

/// Lists locally indexed videos.
#[utoipa::path(
    post,
    path = "/api/videos/get",
    tag = "videos",
    request_body = VideosQuery,
    responses((status = 200, description = "Locally indexed videos", body = [Video])),
)]
pub async fn list_videos(State(state): State<AppState>, Json(query): Json<VideosQuery>) -> Result<Json<Vec<Video>>> {
    let videos = state
        .indexer
        .store
        .list_videos(query.limit.unwrap_or(50), query.offset.unwrap_or(0))
        .await?;
    Ok(Json(videos))
}

/// Upstream-backed lookup of a single video by id: always refetches from
/// the catalog API and merges the result, rather than trusting whatever is
/// locally cached.
#[utoipa::path(
    post,
    path = "/api/videos/get-one",
    tag = "videos",
    request_body = VideoLookup,
    responses(
        (status = 200, description = "The video", body = Video),
        (status = 404, description = "No such video upstream"),
    ),
)]
pub async fn get_one_video(State(state): State<AppState>, Json(body): Json<VideoLookup>) -> Result<Json<Video>> {
    let config = state.indexer.get_config();
    let guid = guid_for(EntityKind::Video, body.id);
    let url = catalog::build_single_url(&config.catalog, EntityKind::Video, &guid);
    let response = state.indexer.requester.request(url, RequestPriority::Normal).await?;
    let envelope = catalog::xml::parse_single_video(&response)?;

    if !envelope.is_ok() {
        return Err(Error::Requester(RequesterError::ApiError(envelope.error)));
    }

    state.indexer.store.merge_video(&envelope.results, Utc::now().timestamp()).await?;
    let video = state
        .indexer
        .store
        .get_video(body.id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("video {}", body.id)))?;
    Ok(Json(video))
}

/// Fetches one page of the upstream `videos` collection, advancing (or
/// creating) a server-side paginator cursor keyed by `session_id`.
#[utoipa::path(
    post,
    path = "/api/videos/browse",
    tag = "videos",
    request_body = BrowseRequest,
    responses(
        (status = 200, description = "One page of videos plus the advanced cursor", body = BrowseResponse),
        (status = 410, description = "Cursor already exhausted"),
    ),
)]
pub async fn browse_videos(State(state): State<AppState>, Json(body): Json<BrowseRequest>) -> Result<Json<BrowseResponse>> {
    let config = state.indexer.get_config();

    let mut sessions = state.browse_sessions.lock().await;
    let (session_id, mut select) = match body.session_id.and_then(|id| sessions.remove(&id).map(|s| (id, s))) {
        Some(pair) => pair,
        None => {
            let mut select = ResourceSelect::new("videos", config.indexer.page_size, Filters::new());
            select.priority(RequestPriority::Normal);
            for (key, value) in body.filters.unwrap_or_default() {
                select.filter(key, value);
            }
            (Uuid::new_v4(), select)
        }
    };
    drop(sessions);

    let response = select.next(&state.indexer.requester, &config.catalog).await?;
    let envelope = catalog::xml::parse_videos(&response)?;

    if !envelope.is_ok() {
        return Err(Error::Requester(RequesterError::ApiError(envelope.error)));
    }

    let now = Utc::now().timestamp();
    let mut videos = Vec::with_capacity(envelope.results.video.len());
    for xml in &envelope.results.video {
        let id = state.indexer.store.merge_video(xml, now).await?;
        if let Some(video) = state.indexer.store.get_video(id).await? {
            videos.push(video);
        }
    }

    select.record_page(envelope.number_of_total_results, envelope.results.video.len() as i64);

    let response = BrowseResponse {
        session_id,
        videos,
        total_results: select.total_results,
        current_page: select.current_page(),
        total_pages: select.total_pages(),
        is_last_page: select.is_last_page(),
    };

    state.browse_sessions.lock().await.insert(session_id, select);
    Ok(Json(response))
}

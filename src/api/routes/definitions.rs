//! `GET /api/definitions/get` — static enum dictionaries clients can use to
//! render download/job states without hard-coding them.

use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

/// Enum value dictionaries for every client-facing lifecycle enum.
#[derive(Debug, Serialize, ToSchema)]
pub struct Definitions {
    pub entity_kinds: &'static [&'static str],
    pub download_statuses: &'static [&'static str],
    pub job_states: &'static [&'static str],
    pub request_priorities: &'static [&'static str],
    pub message_event_types: &'static [&'static str],
}

/// Returns the static enum dictionaries used across the API.
#[utoipa::path(
    get,
    path = "/api/definitions/get",
    tag = "definitions",
    responses((status = 200, description = "Enum dictionaries", body = Definitions)),
)]
pub async fn get_definitions() -> Json<Definitions> {
    Json(Definitions {
        entity_kinds: &["video", "video_show", "video_category", "image"],
        download_statuses: &["queued", "in_progress", "paused", "complete", "failed", "cancelled"],
        job_states: &["not_started", "running", "paused", "stopped", "complete", "failed"],
        request_priorities: &["low", "normal", "high"],
        message_event_types: &["created", "modified", "deleted"],
    })
}

//! `/api/system/*` — first-time setup, triggering re-index runs, and
//! reporting the live indexer job snapshot.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::state::AppState;
use crate::error::Result;
use crate::indexer::{self, FULL_INDEXER, REFRESH_SHOWS_AND_CATEGORIES};
use crate::store::jobs::BackgroundJobRecord;

/// Response from `/api/system/run-first-time-setup`.
#[derive(Debug, Serialize, ToSchema)]
pub struct FirstTimeSetupResponse {
    pub refresh_job_uuid: String,
    pub indexer_job_uuid: String,
}

/// Runs first-time setup: refreshes shows and categories, then kicks off a
/// full index crawl.
#[utoipa::path(
    post,
    path = "/api/system/run-first-time-setup",
    tag = "system",
    responses(
        (status = 200, description = "Both jobs started", body = FirstTimeSetupResponse),
        (status = 409, description = "An indexer job is already running"),
    ),
)]
pub async fn run_first_time_setup(State(state): State<AppState>) -> Result<Json<FirstTimeSetupResponse>> {
    let refresh_job_uuid = state.indexer.jobs.start(REFRESH_SHOWS_AND_CATEGORIES).await?;
    let indexer_job_uuid = state.indexer.jobs.start(FULL_INDEXER).await?;
    Ok(Json(FirstTimeSetupResponse {
        refresh_job_uuid,
        indexer_job_uuid,
    }))
}

/// Body for `/api/system/update-index`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateIndexRequest {
    pub update_type: UpdateType,
}

/// Which indexer crawl to start.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UpdateType {
    Quick,
    Full,
}

/// Response from `/api/system/update-index`.
#[derive(Debug, Serialize, ToSchema)]
pub struct UpdateIndexResponse {
    pub job_uuid: String,
}

/// Starts a quick or full index crawl, mutually exclusive with any other
/// indexer job already running.
#[utoipa::path(
    post,
    path = "/api/system/update-index",
    tag = "system",
    request_body = UpdateIndexRequest,
    responses(
        (status = 200, description = "Job started", body = UpdateIndexResponse),
        (status = 409, description = "An indexer job is already running"),
    ),
)]
pub async fn update_index(State(state): State<AppState>, Json(body): Json<UpdateIndexRequest>) -> Result<Json<UpdateIndexResponse>> {
    let job_uuid = match body.update_type {
        UpdateType::Full => state.indexer.jobs.start(FULL_INDEXER).await?,
        UpdateType::Quick => indexer::start_quick_or_full(&state.indexer.jobs, &state.indexer.store).await?,
    };
    Ok(Json(UpdateIndexResponse { job_uuid }))
}

/// Snapshot of every live (non-archived) background job.
#[utoipa::path(
    get,
    path = "/api/system/get-indexer-state",
    tag = "system",
    responses((status = 200, description = "Live job records", body = [BackgroundJobRecord])),
)]
pub async fn get_indexer_state(State(state): State<AppState>) -> Result<Json<Vec<BackgroundJobRecord>>> {
    let jobs = state.indexer.store.list_jobs().await?;
    Ok(Json(jobs))
}

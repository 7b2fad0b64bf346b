//! `/api/settings/*` — arbitrary key/value configuration overrides stored
//! alongside the rest of the persisted state.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::api::state::AppState;
use crate::error::Result;

/// Every stored setting, as a flat key/value map.
#[derive(Debug, Serialize, ToSchema)]
pub struct SettingsResponse {
    pub settings: BTreeMap<String, String>,
}

/// Returns every stored setting.
#[utoipa::path(
    get,
    path = "/api/settings/get-all",
    tag = "settings",
    responses((status = 200, description = "All settings", body = SettingsResponse)),
)]
pub async fn get_all_settings(State(state): State<AppState>) -> Result<Json<SettingsResponse>> {
    let settings = state.indexer.store.list_settings().await?.into_iter().collect();
    Ok(Json(SettingsResponse { settings }))
}

/// Body for `/api/settings/modify`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ModifySettingRequest {
    pub key: String,
    pub value: String,
}

/// Upserts a single setting.
#[utoipa::path(
    post,
    path = "/api/settings/modify",
    tag = "settings",
    request_body = ModifySettingRequest,
    responses((status = 204, description = "Setting stored")),
)]
pub async fn modify_setting(State(state): State<AppState>, Json(body): Json<ModifySettingRequest>) -> Result<axum::http::StatusCode> {
    state.indexer.store.set_setting(&body.key, &body.value).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

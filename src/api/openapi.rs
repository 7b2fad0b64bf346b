//! OpenAPI 3 document aggregation for the Swagger UI.

use utoipa::Modify;
use utoipa::OpenApi;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};

use super::routes;

/// Aggregates every `#[utoipa::path(...)]`-annotated handler and
/// `#[derive(ToSchema)]` type exposed by the API into one OpenAPI document.
#[derive(OpenApi)]
#[openapi(
    info(title = "media-indexer API", version = "0.1.0", description = "Media catalog indexer and file downloader service"),
    paths(
        routes::get_definitions,
        routes::list_downloads,
        routes::get_one_download,
        routes::enqueue_download,
        routes::list_videos,
        routes::get_one_video,
        routes::browse_videos,
        routes::run_first_time_setup,
        routes::update_index,
        routes::get_indexer_state,
        routes::subscribe,
        routes::unsubscribe,
        routes::get_messages,
        routes::set_interests,
        routes::get_all_settings,
        routes::modify_setting,
        routes::stream_video_file,
    ),
    components(schemas(
        routes::Definitions,
        routes::DownloadsQuery,
        routes::DownloadLookup,
        routes::EnqueueRequest,
        routes::EnqueueResponse,
        routes::VideosQuery,
        routes::VideoLookup,
        routes::BrowseRequest,
        routes::BrowseResponse,
        routes::FirstTimeSetupResponse,
        routes::UpdateIndexRequest,
        routes::UpdateType,
        routes::UpdateIndexResponse,
        routes::SubscribeResponse,
        routes::SubscriberRequest,
        routes::PollResponse,
        routes::SetInterestsRequest,
        routes::InterestRequest,
        routes::SettingsResponse,
        routes::ModifySettingRequest,
        crate::store::downloads::Download,
        crate::store::entities::Video,
        crate::store::jobs::BackgroundJobRecord,
        crate::messenger::Message,
        crate::catalog::resource::ResourceSelect,
        crate::types::EntityKind,
        crate::types::DownloadStatus,
        crate::types::JobState,
        crate::types::RequestPriority,
        crate::types::MessageEventType,
        crate::types::SubjectType,
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "definitions", description = "Static enum dictionaries"),
        (name = "downloads", description = "Download queue"),
        (name = "videos", description = "Video catalog"),
        (name = "system", description = "Index lifecycle"),
        (name = "subscriptions", description = "Event pub/sub"),
        (name = "settings", description = "Key/value configuration overrides"),
        (name = "media", description = "Downloaded media file streaming"),
    ),
    modifiers(&SecurityAddon),
)]
pub struct ApiDoc;

/// Registers the `X-Api-Key` header as the API's security scheme.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "ApiKey",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-Api-Key"))),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_document_is_valid_json_with_expected_sections() {
        let doc = ApiDoc::openapi();
        let json = doc.to_json().expect("serializes");
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        assert!(value["paths"].as_object().is_some());
        assert!(value["components"]["schemas"].as_object().is_some());
        assert!(value["openapi"].as_str().unwrap().starts_with('3'));
    }
}

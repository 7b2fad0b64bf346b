//! REST API server module.
//!
//! Exposes the route table from spec.md §6: downloads, videos, system,
//! subscriptions, settings, and a Range-capable media file stream, all
//! behind an optional `X-Api-Key` gate on mutating requests.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod auth;
pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

use crate::Indexer;
use crate::Result;

/// Builds the full API router over `indexer`.
///
/// ## Routes
///
/// - `GET /api/definitions/get`
/// - `POST /api/downloads/get`, `/get-one`, `/enqueue`
/// - `POST /api/videos/browse`, `/get`, `/get-one`
/// - `POST /api/system/run-first-time-setup`, `/update-index`
/// - `GET /api/system/get-indexer-state`
/// - `POST /api/subscriptions/subscribe`, `/unsubscribe`, `/get`, `/set-interests`
/// - `GET /api/settings/get-all`; `POST /api/settings/modify`
/// - `GET /media/video/:id/file`
pub fn create_router(indexer: Arc<Indexer>) -> Router {
    let config = indexer.get_config();
    let state = AppState::new(indexer);

    let router = Router::new()
        .route("/api/definitions/get", get(routes::get_definitions))
        .route("/api/downloads/get", post(routes::list_downloads))
        .route("/api/downloads/get-one", post(routes::get_one_download))
        .route("/api/downloads/enqueue", post(routes::enqueue_download))
        .route("/api/videos/browse", post(routes::browse_videos))
        .route("/api/videos/get", post(routes::list_videos))
        .route("/api/videos/get-one", post(routes::get_one_video))
        .route("/api/system/run-first-time-setup", post(routes::run_first_time_setup))
        .route("/api/system/update-index", post(routes::update_index))
        .route("/api/system/get-indexer-state", get(routes::get_indexer_state))
        .route("/api/subscriptions/subscribe", post(routes::subscribe))
        .route("/api/subscriptions/unsubscribe", post(routes::unsubscribe))
        .route("/api/subscriptions/get", post(routes::get_messages))
        .route("/api/subscriptions/set-interests", post(routes::set_interests))
        .route("/api/settings/get-all", get(routes::get_all_settings))
        .route("/api/settings/modify", post(routes::modify_setting))
        .route("/media/video/:id/file", get(routes::stream_video_file));

    let router = if config.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = router.with_state(state);

    // Axum's onion model: the LAST `.layer()` call is OUTERMOST, so it runs
    // FIRST on an incoming request. We want CORS to run before auth, so
    // auth is applied first (innermost) and CORS last (outermost).
    let router = router.layer(middleware::from_fn_with_state(config.clone(), auth::require_api_key));

    if config.api.cors_enabled {
        router.layer(build_cors_layer(&config.api.cors_origins))
    } else {
        router
    }
}

/// Builds a CORS layer from the configured allowed origins (`"*"` or an
/// empty list means any origin).
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.is_empty() || origins.iter().any(|o| o == "*");

    if allow_any {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Binds and serves the API on the configured address. Runs until the
/// listener errors or the process is asked to shut down elsewhere.
pub async fn start_api_server(indexer: Arc<Indexer>) -> Result<()> {
    let bind_address: SocketAddr = indexer.get_config().api.bind_address;
    tracing::info!(address = %bind_address, "starting API server");

    let app = create_router(indexer);
    let listener = TcpListener::bind(bind_address).await?;

    tracing::info!(address = %bind_address, "API server listening");
    axum::serve(listener, app.into_make_service()).await?;

    tracing::info!("API server stopped");
    Ok(())
}

//! Builds a fully wired [`Indexer`] against a temp directory and a caller-
//! supplied upstream base URL (normally a `wiremock::MockServer`'s `uri()`).

use std::sync::Arc;

use media_indexer::config::{ApiConfig, CatalogConfig, Config, IndexerConfig, RequesterConfig, StorageConfig};
use media_indexer::Indexer;
use tempfile::TempDir;

pub const TEST_API_KEY: &str = "test-key";

/// Builds an `Indexer` wired to `upstream_base_url`, with its store and
/// file storage rooted in a fresh temp directory. Keep the returned
/// `TempDir` alive for the test's duration.
pub async fn spawn_indexer(upstream_base_url: &str) -> (Arc<Indexer>, TempDir) {
    spawn_indexer_with_api_key(upstream_base_url, Some(TEST_API_KEY)).await
}

/// Like [`spawn_indexer`], but lets the caller control the API gate's
/// configured key (`None` to exercise the unconfigured-gate behavior).
pub async fn spawn_indexer_with_api_key(upstream_base_url: &str, api_key: Option<&str>) -> (Arc<Indexer>, TempDir) {
    let temp_dir = tempfile::tempdir().expect("create temp dir");

    let config = Config {
        catalog: CatalogConfig {
            base_url: format!("{upstream_base_url}/api/"),
            api_key: Some("upstream-key".to_string()),
            api_key_field: "api_key".to_string(),
            user_agent: "media-indexer-tests".to_string(),
        },
        storage: StorageConfig {
            root_dir: temp_dir.path().to_path_buf(),
            database_dir: "db".into(),
            database_name: "test.db".to_string(),
            files_dir: "files".into(),
        },
        indexer: IndexerConfig {
            quick_lookback_margin_hours: 24,
            page_size: 2,
        },
        requester: RequesterConfig {
            min_dispatch_interval_ms: 1,
            request_timeout_secs: 5,
        },
        api: ApiConfig {
            api_key: api_key.map(str::to_string),
            swagger_ui: false,
            ..Default::default()
        },
        ..Default::default()
    };

    let indexer = Indexer::new(config).await.expect("build indexer");
    (Arc::new(indexer), temp_dir)
}

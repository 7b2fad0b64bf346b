//! Configuration types for media-indexer.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use utoipa::ToSchema;

/// Upstream catalog API configuration (base URL, key, request headers).
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CatalogConfig {
    /// Base URL for the upstream catalog API.
    #[serde(default = "default_api_base_url")]
    pub base_url: String,

    /// API key used to authenticate upstream requests. Required for the
    /// requester and downloader to function; absence is a config error at
    /// startup, not a silent no-op.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Query-string field name the upstream API expects the key under.
    #[serde(default = "default_api_key_field")]
    pub api_key_field: String,

    /// `User-Agent` header sent on every upstream request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            api_key: None,
            api_key_field: default_api_key_field(),
            user_agent: default_user_agent(),
        }
    }
}

/// Storage locations for the SQLite store and downloaded media files.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct StorageConfig {
    /// Root directory for the service's own state (database, etc).
    /// Overridable with the `GBMM_ROOT` environment variable.
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    /// Directory name (relative to `root_dir` unless absolute) for the
    /// SQLite database file.
    #[serde(default = "default_database_dir")]
    pub database_dir: PathBuf,

    /// SQLite database file name.
    #[serde(default = "default_database_name")]
    pub database_name: String,

    /// Root directory files are downloaded into (videos, images).
    /// Overridable with the `GBMM_FILES` environment variable.
    #[serde(default = "default_files_dir")]
    pub files_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            database_dir: default_database_dir(),
            database_name: default_database_name(),
            files_dir: default_files_dir(),
        }
    }
}

impl StorageConfig {
    /// Resolves `database_dir` against `root_dir` if it is relative.
    pub fn database_dir_resolved(&self) -> PathBuf {
        if self.database_dir.is_absolute() {
            self.database_dir.clone()
        } else {
            self.root_dir.join(&self.database_dir)
        }
    }

    /// Full path to the SQLite database file.
    pub fn database_path(&self) -> PathBuf {
        self.database_dir_resolved().join(&self.database_name)
    }

    /// Resolves `files_dir` against `root_dir` if it is relative.
    pub fn files_dir_resolved(&self) -> PathBuf {
        if self.files_dir.is_absolute() {
            self.files_dir.clone()
        } else {
            self.root_dir.join(&self.files_dir)
        }
    }
}

/// Indexer job timing configuration.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct IndexerConfig {
    /// Lookback margin (hours) the quick indexer subtracts from the last
    /// full/quick index timestamp before filtering by `publish_date`, to
    /// tolerate clock skew and late-published entries.
    #[serde(default = "default_quick_lookback_hours")]
    pub quick_lookback_margin_hours: i64,

    /// Page size used when paginating the upstream collection endpoints.
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            quick_lookback_margin_hours: default_quick_lookback_hours(),
            page_size: default_page_size(),
        }
    }
}

/// Requester rate-limiting configuration.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RequesterConfig {
    /// Minimum interval, in milliseconds, between successive upstream
    /// requests dispatched by the requester's single worker.
    #[serde(default = "default_min_dispatch_interval_ms")]
    pub min_dispatch_interval_ms: u64,

    /// Upstream request timeout, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for RequesterConfig {
    fn default() -> Self {
        Self {
            min_dispatch_interval_ms: default_min_dispatch_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Downloader streaming configuration.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloaderConfig {
    /// Chunk size, in bytes, used when streaming a download to disk.
    #[serde(default = "default_chunk_size_bytes")]
    pub chunk_size_bytes: usize,

    /// Download request timeout, in seconds.
    #[serde(default = "default_download_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            chunk_size_bytes: default_chunk_size_bytes(),
            timeout_secs: default_download_timeout_secs(),
        }
    }
}

/// REST API server configuration.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind the HTTP server to.
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Required on every mutating request via the `X-Api-Key` header. `None`
    /// or blank means mutating endpoints are not yet usable: they respond
    /// `400` until an operator configures a key.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Enable CORS for browser access.
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at `/swagger-ui`.
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            api_key: None,
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

/// Top-level configuration for media-indexer, loaded from a YAML file with
/// environment variable overrides applied on top.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub indexer: IndexerConfig,

    #[serde(default)]
    pub requester: RequesterConfig,

    #[serde(default)]
    pub downloader: DownloaderConfig,

    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Loads configuration from `path`, writing out a default file if it
    /// does not exist yet, then applies environment variable overrides.
    ///
    /// Mirrors the upstream project's create-with-defaults-on-missing
    /// loader: a first run with no config file gets a usable one on disk
    /// rather than failing.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            serde_yaml::from_str::<Config>(&raw).map_err(|e| Error::Config {
                message: format!("failed to parse {}: {e}", path.display()),
                key: None,
            })?
        } else {
            let config = Config::default();
            config.save(path)?;
            config
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Writes this configuration to `path` as YAML, creating parent
    /// directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_yaml::to_string(self).map_err(|e| Error::Config {
            message: format!("failed to serialize config: {e}"),
            key: None,
        })?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    /// Applies `GBMM_ROOT` / `GBMM_FILES` overrides, matching the upstream
    /// project's environment-variable convention.
    fn apply_env_overrides(&mut self) {
        if let Ok(root) = std::env::var("GBMM_ROOT") {
            self.storage.root_dir = PathBuf::from(root);
        }
        if let Ok(files) = std::env::var("GBMM_FILES") {
            self.storage.files_dir = PathBuf::from(files);
        }
        if let Ok(key) = std::env::var("GBMM_API_KEY") {
            self.catalog.api_key = Some(key);
        }
    }

    /// Validates invariants that can't be expressed via `serde` defaults.
    fn validate(&self) -> Result<()> {
        if self.catalog.api_key.as_deref().is_some_and(str::is_empty) {
            return Err(Error::Config {
                message: "catalog.api_key must not be blank".into(),
                key: Some("catalog.api_key".into()),
            });
        }
        if self.indexer.page_size <= 0 {
            return Err(Error::Config {
                message: "indexer.page_size must be positive".into(),
                key: Some("indexer.page_size".into()),
            });
        }
        if self.requester.min_dispatch_interval_ms == 0 {
            return Err(Error::Config {
                message: "requester.min_dispatch_interval_ms must be positive".into(),
                key: Some("requester.min_dispatch_interval_ms".into()),
            });
        }
        Ok(())
    }
}

fn default_api_base_url() -> String {
    "https://www.giantbomb.com/api/".to_string()
}

fn default_api_key_field() -> String {
    "api_key".to_string()
}

fn default_user_agent() -> String {
    format!("media-indexer/{}", env!("CARGO_PKG_VERSION"))
}

fn default_root_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_database_dir() -> PathBuf {
    PathBuf::from("db")
}

fn default_database_name() -> String {
    "media-indexer.db".to_string()
}

fn default_files_dir() -> PathBuf {
    PathBuf::from("files")
}

fn default_quick_lookback_hours() -> i64 {
    24
}

fn default_page_size() -> i64 {
    100
}

fn default_min_dispatch_interval_ms() -> u64 {
    1100
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_chunk_size_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_download_timeout_secs() -> u64 {
    300
}

fn default_bind_address() -> SocketAddr {
    "127.0.0.1:6789".parse().unwrap()
}

fn default_true() -> bool {
    true
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn blank_api_key_rejected() {
        let mut config = Config::default();
        config.catalog.api_key = Some(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_writes_defaults_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        assert!(!path.exists());
        let config = Config::load(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.storage.database_name, "media-indexer.db");
    }

    #[test]
    fn env_overrides_applied() {
        // SAFETY: test-only, serialized by the default test harness's
        // single-threaded-per-module execution is not guaranteed, so scope
        // the var strictly to this test's lifetime.
        std::env::set_var("GBMM_ROOT", "/tmp/gbmm-test-root");
        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.storage.root_dir, PathBuf::from("/tmp/gbmm-test-root"));
        std::env::remove_var("GBMM_ROOT");
    }

    #[test]
    fn database_path_resolves_relative_to_root() {
        let mut config = Config::default();
        config.storage.root_dir = PathBuf::from("/srv/gbmm");
        config.storage.database_dir = PathBuf::from("db");
        config.storage.database_name = "gbmm.db".to_string();
        assert_eq!(config.storage.database_path(), PathBuf::from("/srv/gbmm/db/gbmm.db"));
    }
}

//! # media-indexer
//!
//! Media-metadata indexer and file-downloader service for a third-party
//! video catalog API.
//!
//! Four core subsystems, wired together behind a single [`Indexer`] handle:
//! - [`requester`] — rate-limited, priority-queued upstream HTTP client
//! - [`indexer`] (jobs) — paginated crawl of the catalog into the local store
//! - [`downloader`] — single-worker file download queue
//! - [`jobs`] — background-job lifecycle framework shared by indexer jobs
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_indexer::{Config, Indexer, run_with_shutdown};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let indexer = Indexer::new(config).await?;
//!
//!     let mut events = indexer.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("event: {:?}", event);
//!         }
//!     });
//!
//!     run_with_shutdown(indexer).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Upstream catalog resource selection, pagination, and XML decoding
pub mod catalog;
/// CLI argument parsing
pub mod cli;
/// Configuration types
pub mod config;
/// Core downloader implementation
pub mod downloader;
/// Error types
pub mod error;
/// Indexer background jobs (full/quick crawl, first-time setup)
pub mod indexer;
/// Background-job lifecycle framework
pub mod jobs;
/// In-process publish/subscribe notifier
pub mod messenger;
/// Rate-limited upstream requester
pub mod requester;
/// Relational persistence layer
pub mod store;
/// Core types and events
pub mod types;

pub use config::Config;
pub use error::{ApiError, Error, ErrorDetail, Result, ToHttpStatus};
pub use store::Store;
pub use types::{DownloadStatus, EntityKind, JobState, MessageEventType, RequestPriority};

use std::sync::Arc;

use crate::downloader::Downloader;
use crate::jobs::JobRegistry;
use crate::messenger::Messenger;
use crate::requester::Requester;
use crate::types::Event;

/// Root handle composing every subsystem of the service (cloneable — all
/// fields are `Arc`-wrapped).
#[derive(Clone)]
pub struct Indexer {
    /// Persistence layer, shared across every subsystem.
    pub store: Arc<Store>,
    /// Rate-limited upstream requester.
    pub requester: Arc<Requester>,
    /// In-process pub/sub notifier.
    pub messenger: Arc<Messenger>,
    /// Background-job registry and live-job tracker.
    pub jobs: Arc<JobRegistry>,
    /// File download worker.
    pub downloader: Arc<Downloader>,
    /// Static configuration (wrapped in `Arc` for cheap sharing).
    pub(crate) config: Arc<Config>,
    /// Internal event broadcast sender, used by the API layer's
    /// server-sent-events bridge and by tests.
    event_tx: tokio::sync::broadcast::Sender<Event>,
}

impl Indexer {
    /// Builds a new `Indexer`: opens/migrates the store, constructs the
    /// requester, messenger, job registry, and downloader, and registers
    /// the built-in indexer job types.
    pub async fn new(config: Config) -> Result<Self> {
        tokio::fs::create_dir_all(config.storage.database_dir_resolved()).await?;
        tokio::fs::create_dir_all(config.storage.files_dir_resolved()).await?;

        let config = Arc::new(config);

        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);
        let messenger = Arc::new(Messenger::new());

        let store = Arc::new(
            Store::new(&config.storage.database_path(), messenger.clone(), event_tx.clone()).await?,
        );
        let requester = Arc::new(Requester::new(config.clone()));

        let mut job_registry = JobRegistry::new(store.clone(), event_tx.clone());
        crate::indexer::register_builtin_jobs(&mut job_registry, requester.clone(), config.clone())?;
        let jobs = Arc::new(job_registry);
        jobs.recover_on_startup().await?;

        let downloader = Arc::new(Downloader::new(
            store.clone(),
            requester.clone(),
            config.clone(),
            event_tx.clone(),
        ));

        let indexer = Self {
            store,
            requester,
            messenger,
            jobs,
            downloader,
            config,
            event_tx,
        };

        indexer.downloader.clone().spawn_worker();

        Ok(indexer)
    }

    /// Subscribe to the internal broadcast channel carrying download
    /// lifecycle events (distinct from the Messenger's per-client inboxes —
    /// this is the firehose the API's SSE endpoint bridges from).
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Returns a cheap clone of the current configuration.
    pub fn get_config(&self) -> Arc<Config> {
        self.config.clone()
    }

    /// Spawns the REST API server as a background task.
    pub fn spawn_api_server(self: &Arc<Self>) -> tokio::task::JoinHandle<Result<()>> {
        let indexer = self.clone();
        tokio::spawn(async move { crate::api::start_api_server(indexer).await })
    }

    /// Gracefully shuts the service down: stops accepting new downloads,
    /// requests every running job to stop, and waits for the downloader's
    /// worker to drain its current transfer.
    pub async fn shutdown(&self) -> Result<()> {
        self.jobs.stop_all().await?;
        self.downloader.shutdown().await;
        Ok(())
    }
}

/// Runs the service until a termination signal arrives, then shuts down.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal
///   registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_with_shutdown(indexer: Indexer) -> Result<()> {
    wait_for_signal().await;
    indexer.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("received SIGTERM");
                }
                _ = sigint.recv() => {
                    tracing::info!("received SIGINT");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("received SIGINT");
            } else {
                tracing::error!("could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("received SIGTERM");
            } else {
                tracing::error!("could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received Ctrl+C"),
        Err(e) => tracing::error!(error = %e, "failed to listen for Ctrl+C"),
    }
}

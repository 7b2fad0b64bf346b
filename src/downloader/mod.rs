//! Single-worker file download queue (spec.md §4.G).
//!
//! One background worker dequeues the next candidate via
//! `Store::peek_next_download` (any crash-recovery `InProgress` row first,
//! then `Queued` oldest-first) and streams it to disk in fixed-size chunks,
//! the way `downloader/control.rs` and `downloader/lifecycle.rs` in the
//! teacher drive a single cooperative-cancellation worker loop — simplified
//! here to one worker since the spec has no per-download concurrency.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::catalog;
use crate::config::Config;
use crate::error::{DownloadError, Error, Result};
use crate::requester::Requester;
use crate::store::downloads::{Download, NewDownload};
use crate::store::entities::Video;
use crate::store::Store;
use crate::types::{guid_for, DownloadStatus, EntityKind, Event, RequestPriority};

const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Single-worker download queue. Cheap to clone — all state is `Arc`-wrapped.
#[derive(Clone)]
pub struct Downloader {
    store: Arc<Store>,
    requester: Arc<Requester>,
    config: Arc<Config>,
    event_tx: tokio::sync::broadcast::Sender<Event>,
    client: reqwest::Client,
    accepting_new: Arc<AtomicBool>,
    shutdown: CancellationToken,
    wake: Arc<Notify>,
    worker_done: Arc<Notify>,
}

impl Downloader {
    /// Builds a new downloader. Does not spawn its worker — call
    /// `spawn_worker` once wrapped in an `Arc`.
    pub fn new(
        store: Arc<Store>,
        requester: Arc<Requester>,
        config: Arc<Config>,
        event_tx: tokio::sync::broadcast::Sender<Event>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(config.catalog.user_agent.clone())
            .timeout(Duration::from_secs(config.downloader.timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            store,
            requester,
            config,
            event_tx,
            client,
            accepting_new: Arc::new(AtomicBool::new(true)),
            shutdown: CancellationToken::new(),
            wake: Arc::new(Notify::new()),
            worker_done: Arc::new(Notify::new()),
        }
    }

    /// Queues a single download for `(kind, entity_id)`'s `url_field`,
    /// finding-or-creating its `File` row at the deterministic destination
    /// path first (spec.md §4.G).
    pub async fn enqueue(
        &self,
        kind: EntityKind,
        entity_id: i64,
        url_field: &'static str,
        url: &str,
        priority: RequestPriority,
    ) -> Result<i64> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let file = self
            .store
            .get_or_create_file(&self.config.storage.files_dir_resolved(), kind, entity_id, url_field, url)
            .await?;

        let id = self
            .store
            .insert_download(&NewDownload {
                entity_kind: kind,
                entity_id,
                url_field: url_field.to_string(),
                download_url: url.to_string(),
                file_path: file.path,
                priority,
            })
            .await?;

        self.wake.notify_one();
        Ok(id)
    }

    /// Composes the primary video-quality download plus a download for
    /// every present image size variant (spec.md §4.G), returning the
    /// primary video download's id.
    pub async fn enqueue_video_with_images(&self, video: &Video) -> Result<i64> {
        let primary = match video.default_download_url() {
            Some((field, url)) => {
                self.enqueue(EntityKind::Video, video.id, field, url, RequestPriority::Normal).await?
            }
            None => {
                return Err(Error::InvalidArgument(format!(
                    "video {} has no downloadable media url",
                    video.id
                )))
            }
        };

        if let Some(image_id) = video.image_id {
            if let Some(image) = self.store.get_image(image_id).await? {
                for (field, url) in image.present_fields() {
                    self.enqueue(EntityKind::Image, image_id, field, url, RequestPriority::Low).await?;
                }
            }
        }

        Ok(primary)
    }

    /// Spawns the single download worker as a background task.
    pub fn spawn_worker(self: Arc<Self>) {
        tokio::spawn(async move {
            loop {
                if self.shutdown.is_cancelled() {
                    break;
                }

                match self.store.peek_next_download().await {
                    Ok(Some(download)) => {
                        if let Err(error) = self.run_download(&download).await {
                            tracing::warn!(download_id = download.id, %error, "download failed");
                        }
                    }
                    Ok(None) => {
                        tokio::select! {
                            _ = self.wake.notified() => {}
                            _ = tokio::time::sleep(IDLE_POLL_INTERVAL) => {}
                            _ = self.shutdown.cancelled() => break,
                        }
                    }
                    Err(error) => {
                        tracing::error!(%error, "failed to peek next download");
                        tokio::time::sleep(IDLE_POLL_INTERVAL).await;
                    }
                }
            }
            self.worker_done.notify_waiters();
        });
    }

    /// Fetches and merges `(kind, entity_id)` from upstream if it isn't
    /// already cached locally. Only `Video` supports a single-entity
    /// refetch upstream; other kinds are always indexed in bulk first.
    /// Exposed beyond the downloader's internal download flow so API
    /// handlers and the standalone CLI can enqueue a download for an
    /// entity the indexer hasn't crawled yet.
    pub async fn ensure_entity_cached(&self, kind: EntityKind, entity_id: i64) -> Result<()> {
        if kind != EntityKind::Video {
            return Ok(());
        }
        if self.store.get_video(entity_id).await?.is_some() {
            return Ok(());
        }

        let guid = guid_for(kind, entity_id);
        let url = catalog::build_single_url(&self.config.catalog, kind, &guid);
        let body = self.requester.request(url, RequestPriority::High).await?;
        let envelope = catalog::xml::parse_single_video(&body)?;
        if !envelope.is_ok() {
            return Err(Error::NotFound(format!("{kind} {guid}")));
        }
        self.store.merge_video(&envelope.results, chrono::Utc::now().timestamp()).await?;
        Ok(())
    }

    async fn run_download(&self, download: &Download) -> Result<()> {
        let kind = EntityKind::from_item_name(&download.entity_kind)
            .ok_or_else(|| Error::Download(DownloadError::UnexpectedValue(download.entity_kind.clone())))?;
        self.ensure_entity_cached(kind, download.entity_id).await?;

        let mut download = download.clone();
        if download.status() != DownloadStatus::InProgress {
            self.store.set_download_started(download.id).await?;
        } else {
            // Resuming a crash-recovery `InProgress` row: the spec has no
            // partial-file resume, so the transfer restarts from byte 0 and
            // the persisted counter must be reset to match, not left at
            // whatever value a previous attempt left behind.
            self.store.update_download_progress(download.id, 0, download.total_bytes).await?;
            download.bytes_downloaded = 0;
        }

        let result = self.stream_to_disk(&download).await;

        match &result {
            Ok(total_bytes) => {
                if let Some(file) = self.store.get_file(kind, download.entity_id, &download.url_field).await? {
                    self.store.mark_file_downloaded(file.id, *total_bytes).await?;
                }
                self.store.set_download_completed(download.id).await?;
            }
            Err(error) => {
                self.store.set_download_failed(download.id, &error.to_string()).await?;
            }
        }

        result.map(|_| ())
    }

    async fn stream_to_disk(&self, download: &Download) -> Result<i64> {
        let mut request = self.client.get(&download.download_url);
        if let Some(api_key) = &self.config.catalog.api_key {
            request = request.query(&[(self.config.catalog.api_key_field.as_str(), api_key.as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Download(DownloadError::Connection(e.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Download(DownloadError::HttpStatus { status: status.as_u16() }));
        }

        let total_bytes = response.content_length().map(|v| v as i64);
        if total_bytes.is_some() {
            self.store.update_download_progress(download.id, download.bytes_downloaded, total_bytes).await?;
        }

        let path = PathBuf::from(&download.file_path);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| Error::Download(DownloadError::Filesystem(e.to_string())))?;

        let chunk_target = self.config.downloader.chunk_size_bytes;
        let mut buffer: Vec<u8> = Vec::with_capacity(chunk_target);
        let mut downloaded: i64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            if self.shutdown.is_cancelled() {
                break;
            }
            let chunk = chunk.map_err(|e| Error::Download(DownloadError::Connection(e.to_string())))?;
            downloaded += chunk.len() as i64;
            buffer.extend_from_slice(&chunk);

            if buffer.len() >= chunk_target {
                file.write_all(&buffer)
                    .await
                    .map_err(|e| Error::Download(DownloadError::Filesystem(e.to_string())))?;
                buffer.clear();
                self.store.update_download_progress(download.id, downloaded, total_bytes).await?;
            }
        }

        if !buffer.is_empty() {
            file.write_all(&buffer)
                .await
                .map_err(|e| Error::Download(DownloadError::Filesystem(e.to_string())))?;
        }
        file.flush().await.map_err(|e| Error::Download(DownloadError::Filesystem(e.to_string())))?;
        self.store.update_download_progress(download.id, downloaded, total_bytes).await?;

        Ok(downloaded)
    }

    /// Gracefully shuts the downloader down: stops accepting new enqueues,
    /// signals the in-flight transfer to stop between chunks, and waits for
    /// the worker to exit. A download interrupted mid-stream is left
    /// `InProgress` and restarted from zero on the next startup — the spec
    /// has no partial-file resume (see `Store::get_in_progress_downloads`).
    pub async fn shutdown(&self) {
        self.accepting_new.store(false, Ordering::SeqCst);
        self.shutdown.cancel();
        self.wake.notify_one();
        self.worker_done.notified().await;
    }
}

//! Download queue CRUD. Every mutation publishes to the Messenger and
//! broadcasts an [`Event`], from the same function that issues the SQL.

use sqlx::FromRow;
use utoipa::ToSchema;

use super::Store;
use crate::error::{DownloadError, Error, Result};
use crate::messenger::Message;
use crate::types::{DownloadStatus, EntityKind, Event, MessageEventType, RequestPriority, SubjectType};

/// A download not yet assigned an id.
#[derive(Debug, Clone)]
pub struct NewDownload {
    pub entity_kind: EntityKind,
    pub entity_id: i64,
    pub url_field: String,
    pub download_url: String,
    pub file_path: String,
    pub priority: RequestPriority,
}

#[derive(Debug, Clone, FromRow, serde::Serialize, ToSchema)]
pub struct Download {
    pub id: i64,
    pub entity_kind: String,
    pub entity_id: i64,
    pub url_field: String,
    pub download_url: String,
    pub file_path: String,
    pub status: i32,
    pub priority: i32,
    pub bytes_downloaded: i64,
    pub total_bytes: Option<i64>,
    pub error_message: Option<String>,
    pub created_time: i64,
    pub started_time: Option<i64>,
    pub completed_time: Option<i64>,
}

impl Download {
    pub fn status(&self) -> DownloadStatus {
        DownloadStatus::from_i32(self.status)
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

impl Store {
    fn publish_download_event(&self, event_type: MessageEventType, id: i64) {
        self.messenger.publish(Message {
            subject_type: SubjectType::Download,
            event_type,
            subject_id: id,
            payload: None,
        });
    }

    /// Inserts a new queued download and publishes `Created`.
    pub async fn insert_download(&self, download: &NewDownload) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"INSERT INTO downloads
                (entity_kind, entity_id, url_field, download_url, file_path, status, priority, bytes_downloaded, created_time)
               VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?)
               RETURNING id"#,
        )
        .bind(download.entity_kind.item_name())
        .bind(download.entity_id)
        .bind(&download.url_field)
        .bind(&download.download_url)
        .bind(&download.file_path)
        .bind(DownloadStatus::Queued.to_i32())
        .bind(download.priority as i32 as i64)
        .bind(now())
        .fetch_one(&self.pool)
        .await?;

        self.publish_download_event(MessageEventType::Created, id);
        self.event_tx.send(Event::DownloadQueued { download_id: id }).ok();
        Ok(id)
    }

    pub async fn get_download(&self, id: i64) -> Result<Option<Download>> {
        Ok(sqlx::query_as::<_, Download>("SELECT * FROM downloads WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn list_downloads(&self, limit: i64, offset: i64) -> Result<Vec<Download>> {
        Ok(sqlx::query_as::<_, Download>(
            "SELECT * FROM downloads ORDER BY created_time ASC LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Selects the next download to work, per spec: any `InProgress`
    /// download (oldest first — a crash-recovery leftover) takes priority
    /// over the `Queued` set (oldest first, independent of `priority`,
    /// since the download worker itself is single-threaded FIFO).
    pub async fn peek_next_download(&self) -> Result<Option<Download>> {
        if let Some(in_progress) = sqlx::query_as::<_, Download>(
            "SELECT * FROM downloads WHERE status = ? ORDER BY created_time ASC LIMIT 1",
        )
        .bind(DownloadStatus::InProgress.to_i32())
        .fetch_optional(&self.pool)
        .await?
        {
            return Ok(Some(in_progress));
        }

        Ok(sqlx::query_as::<_, Download>(
            "SELECT * FROM downloads WHERE status = ? ORDER BY created_time ASC LIMIT 1",
        )
        .bind(DownloadStatus::Queued.to_i32())
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn set_download_started(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE downloads SET status = ?, started_time = ? WHERE id = ?")
            .bind(DownloadStatus::InProgress.to_i32())
            .bind(now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        self.publish_download_event(MessageEventType::Modified, id);
        self.event_tx.send(Event::DownloadStarted { download_id: id }).ok();
        Ok(())
    }

    pub async fn update_download_progress(&self, id: i64, bytes_downloaded: i64, total_bytes: Option<i64>) -> Result<()> {
        sqlx::query("UPDATE downloads SET bytes_downloaded = ?, total_bytes = ? WHERE id = ?")
            .bind(bytes_downloaded)
            .bind(total_bytes)
            .bind(id)
            .execute(&self.pool)
            .await?;
        self.publish_download_event(MessageEventType::Modified, id);
        self.event_tx
            .send(Event::DownloadProgress {
                download_id: id,
                bytes_downloaded,
                total_bytes,
            })
            .ok();
        Ok(())
    }

    pub async fn set_download_completed(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE downloads SET status = ?, completed_time = ? WHERE id = ?")
            .bind(DownloadStatus::Complete.to_i32())
            .bind(now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        self.publish_download_event(MessageEventType::Modified, id);
        self.event_tx.send(Event::DownloadCompleted { download_id: id }).ok();
        Ok(())
    }

    pub async fn set_download_failed(&self, id: i64, error: &str) -> Result<()> {
        sqlx::query("UPDATE downloads SET status = ?, error_message = ?, completed_time = ? WHERE id = ?")
            .bind(DownloadStatus::Failed.to_i32())
            .bind(error)
            .bind(now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        self.publish_download_event(MessageEventType::Modified, id);
        self.event_tx
            .send(Event::DownloadFailed {
                download_id: id,
                error: error.to_string(),
            })
            .ok();
        Ok(())
    }

    pub async fn delete_download(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM downloads WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::Download(DownloadError::NotFound { id }));
        }
        self.publish_download_event(MessageEventType::Deleted, id);
        Ok(())
    }

    /// Downloads left `InProgress` by an unclean shutdown — the downloader
    /// restarts these from zero rather than attempting to resume a partial
    /// transfer (spec: no partial-file resume).
    pub async fn get_in_progress_downloads(&self) -> Result<Vec<Download>> {
        Ok(sqlx::query_as::<_, Download>("SELECT * FROM downloads WHERE status = ?")
            .bind(DownloadStatus::InProgress.to_i32())
            .fetch_all(&self.pool)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messenger::Messenger;
    use std::sync::Arc;

    async fn test_store() -> Store {
        let (tx, _rx) = tokio::sync::broadcast::channel(16);
        Store::new(&std::path::PathBuf::from(":memory:"), Arc::new(Messenger::new()), tx)
            .await
            .unwrap()
    }

    fn sample() -> NewDownload {
        NewDownload {
            entity_kind: EntityKind::Video,
            entity_id: 1,
            url_field: "hd_url".to_string(),
            download_url: "https://example.com/1.mp4".to_string(),
            file_path: "/files/video/1.mp4".to_string(),
            priority: RequestPriority::Normal,
        }
    }

    #[tokio::test]
    async fn in_progress_takes_priority_over_queued() {
        let store = test_store().await;
        let queued = store.insert_download(&sample()).await.unwrap();
        let to_resume = store.insert_download(&sample()).await.unwrap();
        store.set_download_started(to_resume).await.unwrap();

        let next = store.peek_next_download().await.unwrap().unwrap();
        assert_eq!(next.id, to_resume);
        assert_ne!(next.id, queued);
    }

    #[tokio::test]
    async fn lifecycle_transitions_update_status() {
        let store = test_store().await;
        let id = store.insert_download(&sample()).await.unwrap();
        store.set_download_started(id).await.unwrap();
        store.update_download_progress(id, 100, Some(1000)).await.unwrap();
        store.set_download_completed(id).await.unwrap();

        let download = store.get_download(id).await.unwrap().unwrap();
        assert_eq!(download.status(), DownloadStatus::Complete);
        assert_eq!(download.bytes_downloaded, 100);
    }
}

//! On-disk file bookkeeping and destination path derivation.
//!
//! Paths are deterministic given `(kind, id, field, url)`, sharded the way
//! the upstream project shards large flat directories:
//! `<files_root>/<kind>/<id[0:2]>/<id[0:4]>/<id>/<id>_<field>_<urlfilename>`.

use std::path::{Path, PathBuf};

use sqlx::FromRow;
use utoipa::ToSchema;

use super::Store;
use crate::error::Result;
use crate::types::EntityKind;

#[derive(Debug, Clone, FromRow, serde::Serialize, ToSchema)]
pub struct FileRecord {
    pub id: i64,
    pub entity_kind: String,
    pub entity_id: i64,
    pub field: String,
    pub url: String,
    pub path: String,
    pub downloaded: bool,
    pub size_bytes: Option<i64>,
}

/// Builds the deterministic destination path for a file belonging to
/// `(kind, id)`'s `field`, sourced from `url`.
pub fn build_destination_path(files_root: &Path, kind: EntityKind, id: i64, field: &str, url: &str) -> PathBuf {
    let dir_id = format!("{id:05}");
    let url_filename = url
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("file");

    files_root
        .join(kind.item_name())
        .join(&dir_id[0..2.min(dir_id.len())])
        .join(&dir_id[0..4.min(dir_id.len())])
        .join(&dir_id)
        .join(format!("{dir_id}_{field}_{url_filename}"))
}

impl Store {
    /// Finds an existing file record for `(kind, id, field)`, or creates
    /// one pointing at the deterministic destination path for `url`.
    pub async fn get_or_create_file(
        &self,
        files_root: &Path,
        kind: EntityKind,
        id: i64,
        field: &str,
        url: &str,
    ) -> Result<FileRecord> {
        if let Some(existing) = self.get_file(kind, id, field).await? {
            return Ok(existing);
        }

        let path = build_destination_path(files_root, kind, id, field, url);
        let record_id: i64 = sqlx::query_scalar(
            "INSERT INTO files (entity_kind, entity_id, field, url, path, downloaded) VALUES (?, ?, ?, ?, ?, 0) RETURNING id",
        )
        .bind(kind.item_name())
        .bind(id)
        .bind(field)
        .bind(url)
        .bind(path.to_string_lossy().to_string())
        .fetch_one(&self.pool)
        .await?;

        self.get_file_by_id(record_id)
            .await?
            .ok_or_else(|| crate::error::Error::NotFound(format!("file {record_id}")))
    }

    pub async fn get_file(&self, kind: EntityKind, id: i64, field: &str) -> Result<Option<FileRecord>> {
        Ok(sqlx::query_as::<_, FileRecord>(
            "SELECT * FROM files WHERE entity_kind = ? AND entity_id = ? AND field = ?",
        )
        .bind(kind.item_name())
        .bind(id)
        .bind(field)
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn get_file_by_id(&self, id: i64) -> Result<Option<FileRecord>> {
        Ok(sqlx::query_as::<_, FileRecord>("SELECT * FROM files WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn mark_file_downloaded(&self, id: i64, size_bytes: i64) -> Result<()> {
        sqlx::query("UPDATE files SET downloaded = 1, size_bytes = ? WHERE id = ?")
            .bind(size_bytes)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shards_path_by_zero_padded_id() {
        let path = build_destination_path(
            Path::new("/files"),
            EntityKind::Video,
            42,
            "hd_url",
            "https://example.com/clip.mp4",
        );
        assert_eq!(
            path,
            PathBuf::from("/files/video/00/0004/00042/00042_hd_url_clip.mp4")
        );
    }

    #[test]
    fn falls_back_to_generic_name_when_url_has_no_filename() {
        let path = build_destination_path(Path::new("/files"), EntityKind::Image, 1, "original_url", "https://example.com/");
        assert!(path.ends_with("00001_original_url_file"));
    }
}

//! Entity persistence: videos, shows, categories, and their images.
//!
//! Each upstream XML payload is merged into the store with a static,
//! per-kind function — no dynamic field introspection, unlike the upstream
//! implementation's `hasattr`/`getattr`-based merge.

use sqlx::FromRow;
use utoipa::ToSchema;

use super::Store;
use crate::catalog::xml::{ImageXml, VideoCategoryXml, VideoShowXml, VideoXml};
use crate::error::Result;
use crate::types::{EntityKind, guid_for};

/// An image, identifierless in the upstream API — deduplicated by its tuple
/// of URL fields rather than by id.
#[derive(Debug, Clone, FromRow, serde::Serialize, ToSchema)]
pub struct Image {
    pub id: i64,
    pub icon_url: Option<String>,
    pub medium_url: Option<String>,
    pub original_url: Option<String>,
    pub screen_url: Option<String>,
    pub screen_large_url: Option<String>,
    pub small_url: Option<String>,
    pub super_url: Option<String>,
    pub thumb_url: Option<String>,
    pub tiny_url: Option<String>,
}

impl Image {
    /// Returns the most-preferred non-empty URL field, per
    /// [`crate::types::IMAGE_FIELD_PREFERENCE`].
    pub fn preferred_url(&self) -> Option<&str> {
        self.present_fields().first().map(|(_, url)| *url)
    }

    /// Every non-empty URL field, in [`crate::types::IMAGE_FIELD_PREFERENCE`]
    /// order. Used by `enqueue_video_with_images` to queue a download for
    /// each size variant the upstream API returned, not just the best one.
    pub fn present_fields(&self) -> Vec<(&'static str, &str)> {
        crate::types::IMAGE_FIELD_PREFERENCE
            .iter()
            .filter_map(|field| {
                let value = match *field {
                    "original_url" => &self.original_url,
                    "screen_large_url" => &self.screen_large_url,
                    "super_url" => &self.super_url,
                    "screen_url" => &self.screen_url,
                    "medium_url" => &self.medium_url,
                    "small_url" => &self.small_url,
                    "thumb_url" => &self.thumb_url,
                    "icon_url" => &self.icon_url,
                    "tiny_url" => &self.tiny_url,
                    _ => &None,
                };
                value.as_deref().map(|url| (*field, url))
            })
            .collect()
    }
}

#[derive(Debug, Clone, FromRow, serde::Serialize, ToSchema)]
pub struct Video {
    pub id: i64,
    pub guid: Option<String>,
    pub name: Option<String>,
    pub deck: Option<String>,
    pub publish_date: Option<String>,
    pub length_seconds: Option<i64>,
    pub site_detail_url: Option<String>,
    pub hd_url: Option<String>,
    pub high_url: Option<String>,
    pub low_url: Option<String>,
    pub youtube_id: Option<String>,
    pub premium: Option<bool>,
    pub video_show_id: Option<i64>,
    pub image_id: Option<i64>,
    pub saved_time: i64,
}

impl Video {
    /// The default field to download the video's media from, per the
    /// upstream's `[hd_url, high_url, low_url]` preference order.
    pub fn default_download_url(&self) -> Option<(&'static str, &str)> {
        for field in crate::types::VIDEO_QUALITY_PREFERENCE {
            let value = match *field {
                "hd_url" => &self.hd_url,
                "high_url" => &self.high_url,
                "low_url" => &self.low_url,
                _ => &None,
            };
            if let Some(url) = value {
                return Some((field, url));
            }
        }
        None
    }
}

#[derive(Debug, Clone, FromRow, serde::Serialize, ToSchema)]
pub struct VideoShow {
    pub id: i64,
    pub guid: Option<String>,
    pub title: Option<String>,
    pub deck: Option<String>,
    pub position: Option<i64>,
    pub active: Option<bool>,
    pub site_detail_url: Option<String>,
    pub image_id: Option<i64>,
    pub logo_id: Option<i64>,
    pub saved_time: i64,
}

#[derive(Debug, Clone, FromRow, serde::Serialize, ToSchema)]
pub struct VideoCategory {
    pub id: i64,
    pub name: Option<String>,
    pub deck: Option<String>,
    pub site_detail_url: Option<String>,
    pub image_id: Option<i64>,
    pub saved_time: i64,
}

impl Store {
    /// Finds an existing image matching `xml`'s URLs, or inserts a new one.
    /// Returns `None` if `xml` is `None` or carries no URLs at all.
    pub async fn find_or_create_image(&self, xml: Option<&ImageXml>) -> Result<Option<i64>> {
        let Some(xml) = xml else { return Ok(None) };

        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM images WHERE original_url IS ? AND screen_url IS ? AND icon_url IS ?",
        )
        .bind(&xml.original_url)
        .bind(&xml.screen_url)
        .bind(&xml.icon_url)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(id) = existing {
            return Ok(Some(id));
        }

        let id: i64 = sqlx::query_scalar(
            r#"INSERT INTO images
                (icon_url, medium_url, original_url, screen_url, screen_large_url, small_url, super_url, thumb_url, tiny_url)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
               RETURNING id"#,
        )
        .bind(&xml.icon_url)
        .bind(&xml.medium_url)
        .bind(&xml.original_url)
        .bind(&xml.screen_url)
        .bind(&xml.screen_large_url)
        .bind(&xml.small_url)
        .bind(&xml.super_url)
        .bind(&xml.thumb_url)
        .bind(&xml.tiny_url)
        .fetch_one(&self.pool)
        .await?;

        Ok(Some(id))
    }

    /// Merges one upstream video payload into the store. If a row with this
    /// `id` already exists, it is returned unchanged — the upstream payload
    /// is only used to populate a row the first time it's seen.
    pub async fn merge_video(&self, xml: &VideoXml, now: i64) -> Result<i64> {
        if let Some(existing) = sqlx::query_scalar::<_, i64>("SELECT id FROM videos WHERE id = ?")
            .bind(xml.id)
            .fetch_optional(&self.pool)
            .await?
        {
            return Ok(existing);
        }

        let image_id = self.find_or_create_image(xml.image.as_ref()).await?;
        let guid = xml
            .guid
            .clone()
            .unwrap_or_else(|| guid_for(EntityKind::Video, xml.id));

        sqlx::query(
            r#"INSERT INTO videos
                (id, guid, name, deck, publish_date, length_seconds, site_detail_url,
                 hd_url, high_url, low_url, youtube_id, premium, video_show_id, image_id, saved_time)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(xml.id)
        .bind(&guid)
        .bind(&xml.name)
        .bind(&xml.deck)
        .bind(&xml.publish_date)
        .bind(xml.length_seconds)
        .bind(&xml.site_detail_url)
        .bind(&xml.hd_url)
        .bind(&xml.high_url)
        .bind(&xml.low_url)
        .bind(&xml.youtube_id)
        .bind(xml.premium)
        .bind(xml.video_show.as_ref().map(|s| s.id))
        .bind(image_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(xml.id)
    }

    /// Merges one upstream video-show payload into the store. If a row with
    /// this `id` already exists, it is returned unchanged.
    pub async fn merge_video_show(&self, xml: &VideoShowXml, now: i64) -> Result<i64> {
        if let Some(existing) = sqlx::query_scalar::<_, i64>("SELECT id FROM video_shows WHERE id = ?")
            .bind(xml.id)
            .fetch_optional(&self.pool)
            .await?
        {
            return Ok(existing);
        }

        let image_id = self.find_or_create_image(xml.image.as_ref()).await?;
        let logo_id = self.find_or_create_image(xml.logo.as_ref()).await?;
        let guid = xml
            .guid
            .clone()
            .unwrap_or_else(|| guid_for(EntityKind::VideoShow, xml.id));

        sqlx::query(
            r#"INSERT INTO video_shows
                (id, guid, title, deck, position, active, site_detail_url, image_id, logo_id, saved_time)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(xml.id)
        .bind(&guid)
        .bind(&xml.title)
        .bind(&xml.deck)
        .bind(xml.position)
        .bind(xml.active)
        .bind(&xml.site_detail_url)
        .bind(image_id)
        .bind(logo_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(xml.id)
    }

    /// Merges one upstream video-category payload into the store. If a row
    /// with this `id` already exists, it is returned unchanged. Video
    /// categories carry no `guid` in the upstream schema.
    pub async fn merge_video_category(&self, xml: &VideoCategoryXml, now: i64) -> Result<i64> {
        if let Some(existing) = sqlx::query_scalar::<_, i64>("SELECT id FROM video_categories WHERE id = ?")
            .bind(xml.id)
            .fetch_optional(&self.pool)
            .await?
        {
            return Ok(existing);
        }

        let image_id = self.find_or_create_image(xml.image.as_ref()).await?;

        sqlx::query(
            r#"INSERT INTO video_categories (id, name, deck, site_detail_url, image_id, saved_time)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(xml.id)
        .bind(&xml.name)
        .bind(&xml.deck)
        .bind(&xml.site_detail_url)
        .bind(image_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(xml.id)
    }

    pub async fn get_video(&self, id: i64) -> Result<Option<Video>> {
        Ok(sqlx::query_as::<_, Video>("SELECT * FROM videos WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn list_videos(&self, limit: i64, offset: i64) -> Result<Vec<Video>> {
        Ok(sqlx::query_as::<_, Video>(
            "SELECT * FROM videos ORDER BY id ASC LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn count_videos(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM videos")
            .fetch_one(&self.pool)
            .await?)
    }

    pub async fn get_video_show(&self, id: i64) -> Result<Option<VideoShow>> {
        Ok(sqlx::query_as::<_, VideoShow>("SELECT * FROM video_shows WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn list_video_shows(&self, limit: i64, offset: i64) -> Result<Vec<VideoShow>> {
        Ok(sqlx::query_as::<_, VideoShow>(
            "SELECT * FROM video_shows ORDER BY id ASC LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn get_video_category(&self, id: i64) -> Result<Option<VideoCategory>> {
        Ok(
            sqlx::query_as::<_, VideoCategory>("SELECT * FROM video_categories WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    pub async fn list_video_categories(&self, limit: i64, offset: i64) -> Result<Vec<VideoCategory>> {
        Ok(sqlx::query_as::<_, VideoCategory>(
            "SELECT * FROM video_categories ORDER BY id ASC LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn get_image(&self, id: i64) -> Result<Option<Image>> {
        Ok(sqlx::query_as::<_, Image>("SELECT * FROM images WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Most recent `saved_time` across all videos, used by the quick
    /// indexer to derive its `publish_date` lookback filter.
    pub async fn last_video_saved_time(&self) -> Result<Option<i64>> {
        Ok(sqlx::query_scalar("SELECT MAX(saved_time) FROM videos")
            .fetch_one(&self.pool)
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
        Store::new(
            &std::path::PathBuf::from(":memory:"),
            Arc::new(Messenger::new()),
            tx,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn merges_and_fetches_video() {
        let store = test_store().await;
        let xml = VideoXml {
            id: 1,
            guid: Some("2300-1".to_string()),
            name: Some("Quick Look".to_string()),
            deck: None,
            publish_date: Some("2020-01-01 00:00:00".to_string()),
            length_seconds: Some(3600),
            site_detail_url: None,
            hd_url: Some("https://example.com/hd.mp4".to_string()),
            high_url: None,
            low_url: None,
            youtube_id: None,
            premium: Some(false),
            image: None,
            video_show: None,
        };
        store.merge_video(&xml, 1000).await.unwrap();
        let video = store.get_video(1).await.unwrap().unwrap();
        assert_eq!(video.guid.as_deref(), Some("2300-1"));
        assert_eq!(video.default_download_url(), Some(("hd_url", "https://example.com/hd.mp4")));
    }

    #[tokio::test]
    async fn merging_an_existing_id_leaves_the_first_payload_untouched() {
        let store = test_store().await;
        let first = VideoXml {
            id: 1,
            guid: Some("2300-1".to_string()),
            name: Some("Original Name".to_string()),
            deck: None,
            publish_date: Some("2020-01-01 00:00:00".to_string()),
            length_seconds: Some(3600),
            site_detail_url: None,
            hd_url: Some("https://example.com/original.mp4".to_string()),
            high_url: None,
            low_url: None,
            youtube_id: None,
            premium: Some(false),
            image: None,
            video_show: None,
        };
        store.merge_video(&first, 1000).await.unwrap();

        let second = VideoXml {
            id: 1,
            guid: Some("2300-1-changed".to_string()),
            name: Some("Renamed".to_string()),
            deck: Some("new deck".to_string()),
            publish_date: Some("2021-01-01 00:00:00".to_string()),
            length_seconds: Some(42),
            site_detail_url: None,
            hd_url: Some("https://example.com/changed.mp4".to_string()),
            high_url: None,
            low_url: None,
            youtube_id: None,
            premium: Some(true),
            image: None,
            video_show: None,
        };
        store.merge_video(&second, 2000).await.unwrap();

        let video = store.get_video(1).await.unwrap().unwrap();
        assert_eq!(video.name.as_deref(), Some("Original Name"));
        assert_eq!(video.guid.as_deref(), Some("2300-1"));
        assert_eq!(video.hd_url.as_deref(), Some("https://example.com/original.mp4"));
        assert_eq!(video.saved_time, 1000);
    }

    #[tokio::test]
    async fn image_dedup_by_url_tuple() {
        let store = test_store().await;
        let xml = ImageXml {
            original_url: Some("https://example.com/o.jpg".to_string()),
            ..Default::default()
        };
        let first = store.find_or_create_image(Some(&xml)).await.unwrap();
        let second = store.find_or_create_image(Some(&xml)).await.unwrap();
        assert_eq!(first, second);
    }
}

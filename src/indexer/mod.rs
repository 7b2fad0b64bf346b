//! Indexer jobs built on the background-job framework (spec.md §4.F):
//! `FullIndexer`, `QuickIndexer`, and a one-shot `refresh_shows_and_categories`
//! supplement pulled from `original_source/server/app/system.py`'s
//! first-time-setup flow.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::catalog::{self, Filters, ResourceSelect};
use crate::config::Config;
use crate::error::{Error, RequesterError, Result};
use crate::jobs::{Job, JobContext, JobRegistry};
use crate::requester::Requester;
use crate::store::system_state::{KEY_FULL_INDEX_LAST_UPDATE, KEY_QUICK_INDEX_LAST_UPDATE};
use crate::store::Store;
use crate::types::RequestPriority;

const FULL_INDEXER_TAG: &str = "full_indexer";
const QUICK_INDEXER_TAG: &str = "quick_indexer";
const REFRESH_SHOWS_AND_CATEGORIES_TAG: &str = "refresh_shows_and_categories";

/// Registers the indexer's built-in job types. Called once, before the
/// registry is shared behind an `Arc` (registration needs `&mut self`).
/// Job bodies reach the store through their `JobContext`, not a captured
/// handle, so only `requester`/`config` need cloning into each factory.
pub fn register_builtin_jobs(
    registry: &mut JobRegistry,
    requester: Arc<Requester>,
    config: Arc<Config>,
) -> Result<()> {
    let (r, c) = (requester.clone(), config.clone());
    registry.register(FULL_INDEXER_TAG, true, true, move || {
        Arc::new(FullIndexer {
            requester: r.clone(),
            config: c.clone(),
        }) as Arc<dyn Job>
    })?;

    let (r2, c2) = (requester.clone(), config.clone());
    registry.register(QUICK_INDEXER_TAG, true, true, move || {
        Arc::new(QuickIndexer {
            requester: r2.clone(),
            config: c2.clone(),
        }) as Arc<dyn Job>
    })?;

    registry.register(REFRESH_SHOWS_AND_CATEGORIES_TAG, false, false, move || {
        Arc::new(RefreshShowsAndCategories {
            requester: requester.clone(),
            config: config.clone(),
        }) as Arc<dyn Job>
    })?;

    Ok(())
}

/// Starts `quick_indexer`, degrading to `full_indexer` the first time (no
/// prior full index watermark), per spec.md §4.F.
pub async fn start_quick_or_full(registry: &JobRegistry, store: &Store) -> Result<String> {
    if store.get_system_state_i64(KEY_FULL_INDEX_LAST_UPDATE).await?.is_none() {
        registry.start(FULL_INDEXER_TAG).await
    } else {
        registry.start(QUICK_INDEXER_TAG).await
    }
}

/// Runs one page-fetch-and-merge loop over the `videos` collection,
/// checkpointing the paginator's position on pause/stop, shared by
/// `FullIndexer` and `QuickIndexer` (they differ only in their starting
/// filters and which system-state watermark they update).
async fn crawl_videos(
    requester: &Requester,
    config: &Config,
    ctx: JobContext,
    initial_filters: Filters,
    watermark_key: &str,
) -> Result<()> {
    let mut select = match &ctx.session_data {
        Some(data) => ResourceSelect::from_session_data(data)?,
        None => {
            let mut select = ResourceSelect::new("videos", config.indexer.page_size, initial_filters);
            select.priority(RequestPriority::Low);
            select
        }
    };

    loop {
        if ctx.control.should_stop() {
            ctx.store
                .update_job_state(
                    &ctx.uuid,
                    crate::types::JobState::Stopped,
                    select.count_from_beginning(),
                    select.total_results.unwrap_or(0),
                    None,
                )
                .await?;
            return Ok(());
        }
        if ctx.control.should_pause() {
            let session_data = select.to_session_data()?;
            ctx.checkpoint_pause(
                select.count_from_beginning(),
                select.total_results.unwrap_or(0),
                &session_data,
            )
            .await?;
            return Ok(());
        }
        if select.check_not_exhausted().is_err() {
            break;
        }

        let body = select.next(requester, &config.catalog).await?;
        let envelope = catalog::xml::parse_videos(&body)?;
        if !envelope.is_ok() {
            return Err(Error::Requester(RequesterError::ApiError(envelope.error)));
        }

        let now = Utc::now().timestamp();
        for video in &envelope.results.video {
            ctx.store.merge_video(video, now).await?;
        }
        select.record_page(envelope.number_of_total_results, envelope.results.video.len() as i64);
        ctx.report_progress(select.count_from_beginning(), select.total_results.unwrap_or(0)).await?;
    }

    ctx.store.set_system_state_i64(watermark_key, Utc::now().timestamp()).await?;
    Ok(())
}

/// Crawls every video, `id ASC`, 100 per page, at `Low` priority (spec.md
/// §4.F) so it never starves interactive download/lookup requests.
struct FullIndexer {
    requester: Arc<Requester>,
    config: Arc<Config>,
}

#[async_trait]
impl Job for FullIndexer {
    fn tag(&self) -> &'static str {
        FULL_INDEXER_TAG
    }

    async fn run(&self, ctx: JobContext) -> Result<()> {
        let mut filters = Filters::new();
        filters.insert("sort".to_string(), "id:asc".to_string());
        crawl_videos(&self.requester, &self.config, ctx, filters, KEY_FULL_INDEX_LAST_UPDATE).await
    }

    async fn resume(&self, ctx: JobContext) -> Result<()> {
        crawl_videos(&self.requester, &self.config, ctx, Filters::new(), KEY_FULL_INDEX_LAST_UPDATE).await
    }

    async fn recover(&self, ctx: JobContext) -> Result<()> {
        crawl_videos(&self.requester, &self.config, ctx, Filters::new(), KEY_FULL_INDEX_LAST_UPDATE).await
    }
}

/// Same shape as `FullIndexer`, restricted to videos published since the
/// last index run minus a margin (spec.md §4.F rationale: upstream
/// publish-date indexing lags wall-clock; merges are idempotent on `id` so
/// overlap is safer than a gap).
struct QuickIndexer {
    requester: Arc<Requester>,
    config: Arc<Config>,
}

impl QuickIndexer {
    async fn initial_filters(&self, store: &Store) -> Result<Filters> {
        let last_quick = store.get_system_state_i64(KEY_QUICK_INDEX_LAST_UPDATE).await?;
        let last_full = store.get_system_state_i64(KEY_FULL_INDEX_LAST_UPDATE).await?;
        let watermark = last_quick.max(last_full).unwrap_or(0);
        let margin_secs = self.config.indexer.quick_lookback_margin_hours * 3600;
        let start = watermark - margin_secs;
        let end = Utc::now().timestamp();

        let mut filters = Filters::new();
        filters.insert(
            "publish_date".to_string(),
            format!("{}|{}", format_timestamp(start), format_timestamp(end)),
        );
        filters.insert("sort".to_string(), "id:asc".to_string());
        Ok(filters)
    }
}

fn format_timestamp(secs: i64) -> String {
    Utc.timestamp_opt(secs, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "1970-01-01 00:00:00".to_string())
}

#[async_trait]
impl Job for QuickIndexer {
    fn tag(&self) -> &'static str {
        QUICK_INDEXER_TAG
    }

    async fn run(&self, ctx: JobContext) -> Result<()> {
        let filters = self.initial_filters(&ctx.store).await?;
        crawl_videos(&self.requester, &self.config, ctx, filters, KEY_QUICK_INDEX_LAST_UPDATE).await
    }

    async fn resume(&self, ctx: JobContext) -> Result<()> {
        crawl_videos(&self.requester, &self.config, ctx, Filters::new(), KEY_QUICK_INDEX_LAST_UPDATE).await
    }

    async fn recover(&self, ctx: JobContext) -> Result<()> {
        crawl_videos(&self.requester, &self.config, ctx, Filters::new(), KEY_QUICK_INDEX_LAST_UPDATE).await
    }
}

/// One-shot job, not pauseable or recoverable: a cheap handful of pages
/// through `video_shows` and `video_categories`, run once during first-time
/// setup before the full video indexer starts (supplemented from
/// `original_source/server/app/system.py`).
struct RefreshShowsAndCategories {
    requester: Arc<Requester>,
    config: Arc<Config>,
}

#[async_trait]
impl Job for RefreshShowsAndCategories {
    fn tag(&self) -> &'static str {
        REFRESH_SHOWS_AND_CATEGORIES_TAG
    }

    async fn run(&self, ctx: JobContext) -> Result<()> {
        self.refresh_video_shows(&ctx).await?;
        self.refresh_video_categories(&ctx).await?;
        Ok(())
    }
}

impl RefreshShowsAndCategories {
    async fn refresh_video_shows(&self, ctx: &JobContext) -> Result<()> {
        let mut select = ResourceSelect::new("video_shows", self.config.indexer.page_size, Filters::new());
        select.priority(RequestPriority::Low);
        loop {
            if ctx.control.should_stop() {
                return Ok(());
            }
            if select.check_not_exhausted().is_err() {
                break;
            }
            let body = select.next(&self.requester, &self.config.catalog).await?;
            let envelope = catalog::xml::parse_video_shows(&body)?;
            if !envelope.is_ok() {
                return Err(Error::Requester(RequesterError::ApiError(envelope.error)));
            }
            let now = Utc::now().timestamp();
            for show in &envelope.results.video_show {
                ctx.store.merge_video_show(show, now).await?;
            }
            select.record_page(envelope.number_of_total_results, envelope.results.video_show.len() as i64);
            ctx.report_progress(select.count_from_beginning(), select.total_results.unwrap_or(0)).await?;
        }
        Ok(())
    }

    async fn refresh_video_categories(&self, ctx: &JobContext) -> Result<()> {
        let mut select = ResourceSelect::new("video_categories", self.config.indexer.page_size, Filters::new());
        select.priority(RequestPriority::Low);
        loop {
            if ctx.control.should_stop() {
                return Ok(());
            }
            if select.check_not_exhausted().is_err() {
                break;
            }
            let body = select.next(&self.requester, &self.config.catalog).await?;
            let envelope = catalog::xml::parse_video_categories(&body)?;
            if !envelope.is_ok() {
                return Err(Error::Requester(RequesterError::ApiError(envelope.error)));
            }
            let now = Utc::now().timestamp();
            for category in &envelope.results.video_category {
                ctx.store.merge_video_category(category, now).await?;
            }
            select.record_page(
                envelope.number_of_total_results,
                envelope.results.video_category.len() as i64,
            );
            ctx.report_progress(select.count_from_beginning(), select.total_results.unwrap_or(0)).await?;
        }
        Ok(())
    }
}

pub const FULL_INDEXER: &str = FULL_INDEXER_TAG;
pub const QUICK_INDEXER: &str = QUICK_INDEXER_TAG;
pub const REFRESH_SHOWS_AND_CATEGORIES: &str = REFRESH_SHOWS_AND_CATEGORIES_TAG;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messenger::Messenger;

    fn test_config(base_url: String) -> Arc<Config> {
        let mut config = Config::default();
        config.catalog.base_url = base_url;
        config.catalog.api_key = Some("test-key".into());
        config.requester.min_dispatch_interval_ms = 1;
        config.indexer.page_size = 2;
        Arc::new(config)
    }

    async fn test_store() -> Arc<Store> {
        let (tx, _rx) = tokio::sync::broadcast::channel(16);
        Arc::new(
            Store::new(&std::path::PathBuf::from(":memory:"), Arc::new(Messenger::new()), tx)
                .await
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn full_indexer_pages_until_exhausted_and_merges_every_video() {
        let server = wiremock::MockServer::start().await;
        let page_one = r#"<?xml version="1.0"?>
<response>
  <error>OK</error>
  <number_of_page_results>2</number_of_page_results>
  <number_of_total_results>3</number_of_total_results>
  <status_code>1</status_code>
  <results>
    <video><id>1</id><guid>2300-1</guid><name>A</name></video>
    <video><id>2</id><guid>2300-2</guid><name>B</name></video>
  </results>
</response>"#;
        let page_two = r#"<?xml version="1.0"?>
<response>
  <error>OK</error>
  <number_of_page_results>1</number_of_page_results>
  <number_of_total_results>3</number_of_total_results>
  <status_code>1</status_code>
  <results>
    <video><id>3</id><guid>2300-3</guid><name>C</name></video>
  </results>
</response>"#;

        wiremock::Mock::given(wiremock::matchers::query_param("offset", "0"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(page_one))
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::query_param("offset", "2"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(page_two))
            .mount(&server)
            .await;

        let config = test_config(server.uri() + "/");
        let store = test_store().await;
        let requester = Arc::new(Requester::new(config.clone()));

        let indexer = FullIndexer {
            requester: requester.clone(),
            config: config.clone(),
        };
        let ctx = JobContext {
            uuid: "job-1".to_string(),
            store: store.clone(),
            control: crate::jobs::JobControl::new(),
            session_data: None,
        };
        store.create_job_record("job-1", FULL_INDEXER_TAG, "full", true, true).await.unwrap();

        indexer.run(ctx).await.unwrap();

        assert_eq!(store.count_videos().await.unwrap(), 3);
        assert!(store.get_system_state_i64(KEY_FULL_INDEX_LAST_UPDATE).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn quick_indexer_degrades_to_full_when_no_watermark() {
        let (tx, _rx) = tokio::sync::broadcast::channel(16);
        let store = test_store().await;
        let config = test_config("http://127.0.0.1:1".to_string());
        let requester = Arc::new(Requester::new(config.clone()));
        let mut registry = JobRegistry::new(store.clone(), tx);
        register_builtin_jobs(&mut registry, requester, config).unwrap();

        let uuid = start_quick_or_full(&registry, &store).await.unwrap();
        let record = store.get_job(&uuid).await.unwrap().unwrap();
        assert_eq!(record.tag, FULL_INDEXER_TAG);
    }
}

//! `ResourceSelect` — the paginator over a collection endpoint of the
//! upstream catalog API.

use crate::config::CatalogConfig;
use crate::error::{Error, PaginatorError, RequesterError, Result};
use crate::requester::Requester;
use crate::types::RequestPriority;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// A single applied query-string filter (e.g. `publish_date > 2020-01-01`,
/// `sort=id:asc`).
pub type Filters = BTreeMap<String, String>;

/// Direction for the [`ResourceSelect::sort`] chainable setter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// Tracks offset/limit/total across a paginated crawl of a collection
/// endpoint, mirroring the upstream `MultipleResultResource`'s metadata
/// bookkeeping (`count_from_beginning`, `total_pages`, `is_last_page`) and
/// its chainable `filter`/`sort`/`field_list` query-building operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ResourceSelect {
    /// Collection name (`videos`, `video_shows`, `video_categories`).
    pub collection: String,
    /// Filters applied to every request this paginator issues, excluding
    /// `offset`/`limit`, which are tracked separately below.
    pub filters: Filters,
    /// Number of results requested per page.
    pub limit: i64,
    /// Current offset into the collection.
    pub offset: i64,
    /// Total number of results in the collection, `None` until the first
    /// page has been fetched (mirrors the upstream's "not yet started").
    pub total_results: Option<i64>,
    /// Number of results returned in the most recently fetched page.
    pub last_page_results: i64,
    /// Dispatch priority used by [`ResourceSelect::next`]/[`ResourceSelect::page`].
    #[serde(default)]
    pub priority: RequestPriority,
}

impl ResourceSelect {
    /// Builds a new paginator over `collection`, starting at offset 0.
    pub fn new(collection: impl Into<String>, limit: i64, filters: Filters) -> Self {
        Self {
            collection: collection.into(),
            filters,
            limit,
            offset: 0,
            total_results: None,
            last_page_results: 0,
            priority: RequestPriority::default(),
        }
    }

    /// Adds or replaces a single query-string filter.
    pub fn filter(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    /// Removes a previously applied filter, if present.
    pub fn clear_filter(&mut self, key: &str) -> &mut Self {
        self.filters.remove(key);
        self
    }

    /// Sets the `sort` filter, e.g. `sort("id", SortDirection::Asc)` applies
    /// `sort=id:asc`.
    pub fn sort(&mut self, field: impl Into<String>, dir: SortDirection) -> &mut Self {
        self.filter("sort", format!("{}:{}", field.into(), dir.as_str()))
    }

    /// Restricts the response to the given fields via the upstream's
    /// `field_list` filter.
    pub fn field_list(&mut self, fields: &[&str]) -> &mut Self {
        self.filter("field_list", fields.join(","))
    }

    /// Sets the dispatch priority `next()`/`page()` requests are issued at.
    pub fn priority(&mut self, priority: RequestPriority) -> &mut Self {
        self.priority = priority;
        self
    }

    /// Number of results seen from the beginning of the collection through
    /// the end of the last fetched page.
    pub fn count_from_beginning(&self) -> i64 {
        self.offset + self.last_page_results
    }

    /// Total page count, given the current limit, once `total_results` is
    /// known.
    pub fn total_pages(&self) -> i64 {
        match self.total_results {
            Some(total) if self.limit > 0 => total.div_ceil(self.limit),
            _ => 0,
        }
    }

    /// Current 1-indexed page number.
    pub fn current_page(&self) -> i64 {
        if self.limit > 0 {
            self.count_from_beginning().div_ceil(self.limit)
        } else {
            0
        }
    }

    /// Whether the last fetched page was the final page of results.
    ///
    /// Before the first page is fetched (`total_results` is `None`), this
    /// is `false` — matching the upstream's default of "not yet known".
    pub fn is_last_page(&self) -> bool {
        match self.total_results {
            Some(total) => self.count_from_beginning() >= total,
            None => false,
        }
    }

    /// Records the metadata from a just-fetched page, then advances the
    /// offset by `limit` so the next `next()` call fetches the following
    /// page.
    pub fn record_page(&mut self, total_results: i64, page_results: i64) {
        self.total_results = Some(total_results);
        self.last_page_results = page_results;
        self.offset += self.limit;
    }

    /// Jumps directly to page `page_num` (1-indexed). Requires that
    /// `total_results` is already known (call after at least one `next()`,
    /// or use [`ResourceSelect::page`], which probes for it first) — returns
    /// `InvalidPage` otherwise, rather than silently accepting any page.
    pub fn seek_page(&mut self, page_num: i64) -> Result<()> {
        if page_num < 1 {
            return Err(Error::Paginator(PaginatorError::InvalidPage {
                page: page_num,
                reason: "page numbers start at 1".into(),
            }));
        }
        let Some(_) = self.total_results else {
            return Err(Error::Paginator(PaginatorError::InvalidPage {
                page: page_num,
                reason: "total_results is not yet known; call page() to probe first".into(),
            }));
        };
        let total_pages = self.total_pages();
        if page_num > total_pages {
            return Err(Error::Paginator(PaginatorError::InvalidPage {
                page: page_num,
                reason: format!("larger than total page count of {total_pages}"),
            }));
        }
        self.offset = (page_num - 1) * self.limit;
        self.last_page_results = 0;
        Ok(())
    }

    /// Fetches the page at the paginator's current offset, at its
    /// configured `priority`. Returns the raw response body; the caller
    /// parses it with the collection-appropriate `catalog::xml::parse_*`
    /// function and calls [`ResourceSelect::record_page`] with the result.
    pub async fn next(&mut self, requester: &Requester, config: &CatalogConfig) -> Result<String> {
        self.check_not_exhausted()?;
        let url = crate::catalog::build_collection_url(config, self);
        requester.request(url, self.priority).await
    }

    /// Jumps to page `page_num` (1-indexed) and fetches it, probing the
    /// collection first with a zero-result request to learn `total_results`
    /// if this paginator hasn't fetched a page yet — mirroring the upstream
    /// `MultipleResultResource`'s "zero-field probe" before an out-of-band
    /// page jump. Returns the raw response body, same contract as `next()`.
    pub async fn page(&mut self, requester: &Requester, config: &CatalogConfig, page_num: i64) -> Result<String> {
        if self.total_results.is_none() {
            let mut probe = self.clone();
            probe.limit = 0;
            probe.offset = 0;
            let probe_url = crate::catalog::build_collection_url(config, &probe);
            let body = requester.request(probe_url, self.priority).await?;
            let meta = crate::catalog::xml::parse_envelope_meta(&body)?;
            if !meta.is_ok() {
                return Err(Error::Requester(RequesterError::ApiError(meta.error)));
            }
            self.total_results = Some(meta.number_of_total_results);
        }
        self.seek_page(page_num)?;
        self.next(requester, config).await
    }

    /// Returns `Err(EndOfResults)` if the paginator has already consumed
    /// the last page; callers use this to guard a call to `next()`-style
    /// fetch-and-`record_page()`.
    pub fn check_not_exhausted(&self) -> Result<()> {
        if self.is_last_page() {
            Err(Error::Paginator(PaginatorError::EndOfResults))
        } else {
            Ok(())
        }
    }

    /// Serializes this paginator's position to an opaque session blob, so a
    /// pauseable indexer job can checkpoint and later resume exactly where
    /// it left off.
    pub fn to_session_data(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Error::Serialization)
    }

    /// Restores a paginator from a blob produced by `to_session_data`.
    pub fn from_session_data(data: &str) -> Result<Self> {
        serde_json::from_str(data).map_err(Error::Serialization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paginates_until_last_page() {
        let mut r = ResourceSelect::new("videos", 100, Filters::new());
        assert!(!r.is_last_page());
        r.record_page(250, 100);
        assert_eq!(r.offset, 100);
        assert!(!r.is_last_page());
        r.record_page(250, 100);
        assert_eq!(r.offset, 200);
        assert!(!r.is_last_page());
        r.record_page(250, 50);
        assert!(r.is_last_page());
        assert_eq!(r.total_pages(), 3);
        assert_eq!(r.current_page(), 3);
    }

    #[test]
    fn round_trips_session_data() {
        let mut r = ResourceSelect::new("videos", 100, Filters::new());
        r.record_page(500, 100);
        let blob = r.to_session_data().unwrap();
        let restored = ResourceSelect::from_session_data(&blob).unwrap();
        assert_eq!(restored.offset, r.offset);
        assert_eq!(restored.total_results, r.total_results);
    }

    #[test]
    fn seek_rejects_out_of_range_page() {
        let mut r = ResourceSelect::new("videos", 100, Filters::new());
        r.record_page(250, 100);
        assert!(r.seek_page(0).is_err());
        assert!(r.seek_page(10).is_err());
        assert!(r.seek_page(2).is_ok());
    }

    #[test]
    fn seek_rejects_any_page_when_total_is_unknown() {
        let mut r = ResourceSelect::new("videos", 100, Filters::new());
        assert!(r.seek_page(1).is_err());
    }

    #[test]
    fn filter_sort_and_field_list_compose_into_query_filters() {
        let mut r = ResourceSelect::new("videos", 50, Filters::new());
        r.filter("publish_date", "2020-01-01|2020-02-01")
            .sort("id", SortDirection::Asc)
            .field_list(&["id", "name"]);
        assert_eq!(r.filters.get("publish_date").map(String::as_str), Some("2020-01-01|2020-02-01"));
        assert_eq!(r.filters.get("sort").map(String::as_str), Some("id:asc"));
        assert_eq!(r.filters.get("field_list").map(String::as_str), Some("id,name"));

        r.clear_filter("sort");
        assert!(!r.filters.contains_key("sort"));
    }

    #[tokio::test]
    async fn next_fetches_the_page_at_the_current_offset() {
        let server = wiremock::MockServer::start().await;
        let page = r#"<?xml version="1.0"?>
<response>
  <error>OK</error>
  <number_of_page_results>1</number_of_page_results>
  <number_of_total_results>1</number_of_total_results>
  <status_code>1</status_code>
  <results><video><id>9</id></video></results>
</response>"#;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(page))
            .mount(&server)
            .await;

        let mut config = crate::config::Config::default();
        config.catalog.base_url = server.uri() + "/";
        config.catalog.api_key = Some("test-key".into());
        config.requester.min_dispatch_interval_ms = 1;
        let requester = Requester::new(std::sync::Arc::new(config.clone()));

        let mut r = ResourceSelect::new("videos", 50, Filters::new());
        let body = r.next(&requester, &config.catalog).await.unwrap();
        assert!(body.contains("<id>9</id>"));
    }

    #[tokio::test]
    async fn page_probes_total_results_before_seeking_when_unknown() {
        let server = wiremock::MockServer::start().await;
        let probe_body = r#"<?xml version="1.0"?>
<response>
  <error>OK</error>
  <number_of_page_results>0</number_of_page_results>
  <number_of_total_results>5</number_of_total_results>
  <status_code>1</status_code>
  <results></results>
</response>"#;
        let page_body = r#"<?xml version="1.0"?>
<response>
  <error>OK</error>
  <number_of_page_results>1</number_of_page_results>
  <number_of_total_results>5</number_of_total_results>
  <status_code>1</status_code>
  <results><video><id>3</id></video></results>
</response>"#;

        wiremock::Mock::given(wiremock::matchers::query_param("limit", "0"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(probe_body))
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::query_param("offset", "2"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(page_body))
            .mount(&server)
            .await;

        let mut config = crate::config::Config::default();
        config.catalog.base_url = server.uri() + "/";
        config.catalog.api_key = Some("test-key".into());
        config.requester.min_dispatch_interval_ms = 1;
        let requester = Requester::new(std::sync::Arc::new(config.clone()));

        let mut r = ResourceSelect::new("videos", 1, Filters::new());
        assert!(r.total_results.is_none());

        let body = r.page(&requester, &config.catalog, 3).await.unwrap();
        assert!(body.contains("<id>3</id>"));
        assert_eq!(r.total_results, Some(5));
        assert_eq!(r.offset, 2);
    }
}

//! Upstream catalog API surface: URL construction, pagination, and XML
//! response decoding.

pub mod resource;
pub mod xml;

pub use resource::{Filters, ResourceSelect};

use crate::config::CatalogConfig;
use crate::types::EntityKind;

/// Builds the URL for a single-result request (`GET .../video/<guid>/`).
pub fn build_single_url(config: &CatalogConfig, kind: EntityKind, guid: &str) -> String {
    format!(
        "{}{}/{}/?{}={}",
        config.base_url,
        kind.item_name(),
        guid,
        config.api_key_field,
        config.api_key.as_deref().unwrap_or_default(),
    )
}

/// Builds the URL for a collection request (`GET .../videos/?...`),
/// appending `offset`/`limit` and any caller-supplied filters.
pub fn build_collection_url(config: &CatalogConfig, select: &ResourceSelect) -> String {
    let mut query = String::new();
    for (name, value) in &select.filters {
        query.push_str(name);
        query.push('=');
        query.push_str(&urlencoding::encode(value));
        query.push('&');
    }
    query.push_str(&format!("offset={}&limit={}&", select.offset, select.limit));
    query.push_str(&format!("{}={}", config.api_key_field, config.api_key.as_deref().unwrap_or_default()));

    format!("{}{}/?{}", config.base_url, select.collection, query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn config() -> CatalogConfig {
        CatalogConfig {
            base_url: "https://example.com/api/".to_string(),
            api_key: Some("deadbeef".to_string()),
            api_key_field: "api_key".to_string(),
            user_agent: "test".to_string(),
        }
    }

    #[test]
    fn builds_single_url() {
        let url = build_single_url(&config(), EntityKind::Video, "2300-1");
        assert_eq!(url, "https://example.com/api/video/2300-1/?api_key=deadbeef");
    }

    #[test]
    fn builds_collection_url_with_filters() {
        let mut filters = BTreeMap::new();
        filters.insert("sort".to_string(), "id:asc".to_string());
        let select = ResourceSelect::new("videos", 100, filters);
        let url = build_collection_url(&config(), &select);
        assert!(url.starts_with("https://example.com/api/videos/?sort=id%3Aasc&"));
        assert!(url.ends_with("offset=0&limit=100&api_key=deadbeef"));
    }
}

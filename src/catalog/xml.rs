//! Wire format for the upstream catalog API's XML responses.
//!
//! The upstream API wraps every result (single or paginated) in the same
//! envelope; only the shape of `results` differs. Field names below mirror
//! the upstream schema, not Rust naming conventions.

use serde::Deserialize;

/// Common envelope fields present on every response, regardless of the
/// shape of `results`.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<R> {
    pub error: String,
    #[serde(default)]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub number_of_page_results: i64,
    #[serde(default)]
    pub number_of_total_results: i64,
    pub status_code: i32,
    #[serde(default)]
    pub version: String,
    pub results: R,
}

impl<R> Envelope<R> {
    /// Whether `status_code` indicates success (`1` per the upstream API).
    pub fn is_ok(&self) -> bool {
        self.status_code == 1
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageXml {
    #[serde(default)]
    pub icon_url: Option<String>,
    #[serde(default)]
    pub medium_url: Option<String>,
    #[serde(default)]
    pub original_url: Option<String>,
    #[serde(default)]
    pub screen_url: Option<String>,
    #[serde(default)]
    pub screen_large_url: Option<String>,
    #[serde(default)]
    pub small_url: Option<String>,
    #[serde(default)]
    pub super_url: Option<String>,
    #[serde(default)]
    pub thumb_url: Option<String>,
    #[serde(default)]
    pub tiny_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoRefXml {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoXml {
    pub id: i64,
    #[serde(default)]
    pub guid: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub deck: Option<String>,
    #[serde(default)]
    pub publish_date: Option<String>,
    #[serde(default)]
    pub length_seconds: Option<i64>,
    #[serde(default)]
    pub site_detail_url: Option<String>,
    #[serde(default)]
    pub hd_url: Option<String>,
    #[serde(default)]
    pub high_url: Option<String>,
    #[serde(default)]
    pub low_url: Option<String>,
    #[serde(default)]
    pub youtube_id: Option<String>,
    #[serde(default)]
    pub premium: Option<bool>,
    #[serde(default)]
    pub image: Option<ImageXml>,
    #[serde(default)]
    pub video_show: Option<VideoRefXml>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoResultsXml {
    #[serde(default, rename = "video")]
    pub video: Vec<VideoXml>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoShowXml {
    pub id: i64,
    #[serde(default)]
    pub guid: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub deck: Option<String>,
    #[serde(default)]
    pub position: Option<i64>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub site_detail_url: Option<String>,
    #[serde(default)]
    pub image: Option<ImageXml>,
    #[serde(default)]
    pub logo: Option<ImageXml>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoShowResultsXml {
    #[serde(default, rename = "video_show")]
    pub video_show: Vec<VideoShowXml>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoCategoryXml {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub deck: Option<String>,
    #[serde(default)]
    pub site_detail_url: Option<String>,
    #[serde(default)]
    pub image: Option<ImageXml>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoCategoryResultsXml {
    #[serde(default, rename = "video_category")]
    pub video_category: Vec<VideoCategoryXml>,
}

/// Parses a collection-endpoint response for the given entity kind.
pub fn parse_videos(body: &str) -> crate::error::Result<Envelope<VideoResultsXml>> {
    quick_xml::de::from_str(body)
        .map_err(|e| crate::error::Error::Xml(format!("failed to parse video list: {e}")))
}

pub fn parse_video_shows(body: &str) -> crate::error::Result<Envelope<VideoShowResultsXml>> {
    quick_xml::de::from_str(body)
        .map_err(|e| crate::error::Error::Xml(format!("failed to parse video show list: {e}")))
}

pub fn parse_video_categories(body: &str) -> crate::error::Result<Envelope<VideoCategoryResultsXml>> {
    quick_xml::de::from_str(body)
        .map_err(|e| crate::error::Error::Xml(format!("failed to parse video category list: {e}")))
}

/// Parses a single-result endpoint response (`GET .../video/<guid>/`).
pub fn parse_single_video(body: &str) -> crate::error::Result<Envelope<VideoXml>> {
    quick_xml::de::from_str(body)
        .map_err(|e| crate::error::Error::Xml(format!("failed to parse video: {e}")))
}

/// Envelope metadata only, ignoring the shape of `results` entirely. Used
/// by [`crate::catalog::resource::ResourceSelect::page`]'s zero-field probe,
/// which only needs `number_of_total_results`/`status_code` and must work
/// across every collection's distinct `results` shape.
#[derive(Debug, Clone, Deserialize)]
pub struct EnvelopeMeta {
    pub error: String,
    #[serde(default)]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub number_of_page_results: i64,
    #[serde(default)]
    pub number_of_total_results: i64,
    pub status_code: i32,
    #[serde(default)]
    pub version: String,
    pub results: serde::de::IgnoredAny,
}

impl EnvelopeMeta {
    pub fn is_ok(&self) -> bool {
        self.status_code == 1
    }
}

pub fn parse_envelope_meta(body: &str) -> crate::error::Result<EnvelopeMeta> {
    quick_xml::de::from_str(body)
        .map_err(|e| crate::error::Error::Xml(format!("failed to parse response metadata: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<response>
  <error>OK</error>
  <limit>2</limit>
  <offset>0</offset>
  <number_of_page_results>2</number_of_page_results>
  <number_of_total_results>2</number_of_total_results>
  <status_code>1</status_code>
  <results>
    <video>
      <id>1</id>
      <guid>2300-1</guid>
      <name>First</name>
      <hd_url>https://example.com/1-hd.mp4</hd_url>
    </video>
    <video>
      <id>2</id>
      <guid>2300-2</guid>
      <name>Second</name>
      <low_url>https://example.com/2-low.mp4</low_url>
    </video>
  </results>
  <version>1.0</version>
</response>"#;

    #[test]
    fn parses_envelope_and_video_list() {
        let envelope = parse_videos(SAMPLE).unwrap();
        assert!(envelope.is_ok());
        assert_eq!(envelope.number_of_total_results, 2);
        assert_eq!(envelope.results.video.len(), 2);
        assert_eq!(envelope.results.video[0].name.as_deref(), Some("First"));
        assert_eq!(envelope.results.video[1].low_url.as_deref(), Some("https://example.com/2-low.mp4"));
    }

    #[test]
    fn parses_envelope_meta_ignoring_results_shape() {
        let meta = parse_envelope_meta(SAMPLE).unwrap();
        assert!(meta.is_ok());
        assert_eq!(meta.number_of_total_results, 2);
    }
}

//! Core types shared across the crate: entity identity, download/job
//! lifecycle enums, and the event types the Messenger fans out.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Stable numeric identifier for an entity kind, assigned by the upstream
/// catalog API. Used to build `guid` strings (`<type_id>-<id>`) and to key
/// the cross-kind entity registry described in spec.md §9.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A single video (`type_id = 2300`).
    Video,
    /// A video show / series (`type_id = 2340`).
    VideoShow,
    /// A video category (`type_id = 2320`, guidless).
    VideoCategory,
    /// An image (`type_id = 990000`, identifierless — dedup'd by URL tuple,
    /// never crawled as its own collection). Used as a `File`/`Download`
    /// entity kind when an image field is downloaded to disk.
    Image,
}

impl EntityKind {
    /// The upstream `type_id` for this kind, used to build `guid`s.
    pub fn type_id(self) -> i64 {
        match self {
            EntityKind::Video => 2300,
            EntityKind::VideoShow => 2340,
            EntityKind::VideoCategory => 2320,
            EntityKind::Image => 990000,
        }
    }

    /// The singular item name used in upstream URLs and `Download.obj_item_name`.
    pub fn item_name(self) -> &'static str {
        match self {
            EntityKind::Video => "video",
            EntityKind::VideoShow => "video_show",
            EntityKind::VideoCategory => "video_category",
            EntityKind::Image => "image",
        }
    }

    /// The plural collection name used for the upstream list endpoint.
    pub fn collection_name(self) -> &'static str {
        match self {
            EntityKind::Video => "videos",
            EntityKind::VideoShow => "video_shows",
            EntityKind::VideoCategory => "video_categories",
            EntityKind::Image => "images",
        }
    }

    /// Whether this kind carries a `guid` (video categories and images do
    /// not, per the upstream API — they're addressed purely by numeric id
    /// or, for images, not addressed individually at all).
    pub fn has_guid(self) -> bool {
        matches!(self, EntityKind::Video | EntityKind::VideoShow)
    }

    pub fn from_item_name(name: &str) -> Option<Self> {
        match name {
            "video" => Some(EntityKind::Video),
            "video_show" => Some(EntityKind::VideoShow),
            "video_category" => Some(EntityKind::VideoCategory),
            "image" => Some(EntityKind::Image),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.item_name())
    }
}

/// Builds the derived `guid` for an entity of the given kind and id.
pub fn guid_for(kind: EntityKind, id: i64) -> String {
    format!("{}-{}", kind.type_id(), id)
}

/// Request priority for the upstream Requester. Ordering matters: higher
/// variants are dispatched before lower ones (see `requester` module).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RequestPriority {
    Low,
    #[default]
    Normal,
    High,
}

/// Lifecycle state of a `Download` row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Queued,
    InProgress,
    /// Reserved per spec.md §4.G — not triggered by the current flow.
    Paused,
    Complete,
    Failed,
    Cancelled,
}

impl DownloadStatus {
    pub fn from_i32(v: i32) -> Self {
        match v {
            0 => DownloadStatus::Queued,
            1 => DownloadStatus::InProgress,
            2 => DownloadStatus::Paused,
            3 => DownloadStatus::Complete,
            4 => DownloadStatus::Failed,
            5 => DownloadStatus::Cancelled,
            _ => DownloadStatus::Failed,
        }
    }

    pub fn to_i32(self) -> i32 {
        match self {
            DownloadStatus::Queued => 0,
            DownloadStatus::InProgress => 1,
            DownloadStatus::Paused => 2,
            DownloadStatus::Complete => 3,
            DownloadStatus::Failed => 4,
            DownloadStatus::Cancelled => 5,
        }
    }
}

/// Lifecycle state of a live `BackgroundJobRecord`.
///
/// Live records only ever hold `NotStarted`, `Running`, or `Paused` — the
/// framework moves a record to the archive table the instant it reaches
/// `Stopped`, `Complete`, or `Failed` (see `jobs` module).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    NotStarted,
    Running,
    Paused,
    Stopped,
    Complete,
    Failed,
}

impl JobState {
    pub fn from_i32(v: i32) -> Self {
        match v {
            0 => JobState::NotStarted,
            1 => JobState::Running,
            2 => JobState::Paused,
            3 => JobState::Stopped,
            4 => JobState::Complete,
            5 => JobState::Failed,
            _ => JobState::Failed,
        }
    }

    pub fn to_i32(self) -> i32 {
        match self {
            JobState::NotStarted => 0,
            JobState::Running => 1,
            JobState::Paused => 2,
            JobState::Stopped => 3,
            JobState::Complete => 4,
            JobState::Failed => 5,
        }
    }

    /// Whether this is one of the terminal states archival moves records into.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Stopped | JobState::Complete | JobState::Failed)
    }
}

/// Event type recognized by the Messenger's interest matching.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MessageEventType {
    Created,
    Modified,
    Deleted,
}

impl MessageEventType {
    pub fn all() -> std::collections::HashSet<MessageEventType> {
        [
            MessageEventType::Created,
            MessageEventType::Modified,
            MessageEventType::Deleted,
        ]
        .into_iter()
        .collect()
    }
}

/// The subject kind a published message concerns. Only `Download` is wired
/// up by the core Store today (spec.md §4.D); the variant list stays open
/// for future subject kinds the messenger contract already supports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubjectType {
    Download,
}

/// Image field preference order used by `enqueue_video_with_images`
/// (spec.md §4.G), from most to least preferred.
pub const IMAGE_FIELD_PREFERENCE: &[&str] = &[
    "original_url",
    "screen_large_url",
    "super_url",
    "screen_url",
    "medium_url",
    "small_url",
    "thumb_url",
    "icon_url",
    "tiny_url",
];

/// Video quality field preference order used by `enqueue_video_with_images`.
pub const VIDEO_QUALITY_PREFERENCE: &[&str] = &["hd_url", "high_url", "low_url"];

/// Internal broadcast event, fanned out to every subscriber of
/// [`crate::Indexer::subscribe`] (distinct from the Messenger's per-client
/// inboxes — this is the firehose the API's SSE endpoint bridges from).
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    DownloadQueued {
        download_id: i64,
    },
    DownloadStarted {
        download_id: i64,
    },
    DownloadProgress {
        download_id: i64,
        bytes_downloaded: i64,
        total_bytes: Option<i64>,
    },
    DownloadCompleted {
        download_id: i64,
    },
    DownloadFailed {
        download_id: i64,
        error: String,
    },
    JobStateChanged {
        job_uuid: String,
        state: JobState,
    },
    JobProgress {
        job_uuid: String,
        current: i64,
        denominator: i64,
    },
}

//! Relational persistence layer.
//!
//! Methods on [`Store`] are organized by domain:
//! - [`migrations`] — schema lifecycle
//! - [`entities`] — video/show/category/image CRUD and upstream merge
//! - [`files`] — on-disk file bookkeeping and destination path derivation
//! - [`downloads`] — download queue CRUD, publishing mutation events
//! - [`jobs`] — background-job record CRUD and archival
//! - [`system_state`] — singleton key/value runtime state
//! - [`settings`] — user-facing key/value settings

pub mod downloads;
pub mod entities;
pub mod files;
pub mod jobs;
pub mod migrations;
pub mod settings;
pub mod system_state;

use std::sync::Arc;

use sqlx::sqlite::SqlitePool;

use crate::messenger::Messenger;
use crate::types::Event;

pub use downloads::{Download, NewDownload};
pub use entities::{Image, Video, VideoCategory, VideoShow};
pub use files::FileRecord;
pub use jobs::{BackgroundJobArchive, BackgroundJobRecord};

/// Persistence handle. Cheap to clone via `Arc`; every caller shares one
/// `SqlitePool`.
pub struct Store {
    pub(crate) pool: SqlitePool,
    pub(crate) messenger: Arc<Messenger>,
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
}

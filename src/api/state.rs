//! Application state for the API server.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::Indexer;
use crate::catalog::ResourceSelect;

/// Shared application state accessible to every route handler.
///
/// Cloned per request (cheap: an `Arc` clone plus a second `Arc` clone for
/// the browse-session table).
#[derive(Clone)]
pub struct AppState {
    /// The composed service handle: store, requester, messenger, jobs,
    /// downloader, and config all hang off this.
    pub indexer: Arc<Indexer>,
    /// Live `/api/videos/browse` paginator cursors, keyed by the session id
    /// handed back to the caller on the first request. Held in memory only
    /// — a restart loses in-progress browse sessions, which is acceptable
    /// since a fresh `session_id` just starts the paginator over.
    pub browse_sessions: Arc<Mutex<HashMap<Uuid, ResourceSelect>>>,
}

impl AppState {
    /// Creates a new `AppState` wrapping `indexer`.
    pub fn new(indexer: Arc<Indexer>) -> Self {
        Self {
            indexer,
            browse_sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

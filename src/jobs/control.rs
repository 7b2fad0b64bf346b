//! Cooperative pause/stop signaling for a running job worker.
//!
//! `tokio_util::sync::CancellationToken` is one-shot and undifferentiated
//! (the teacher uses it for cancel-only, e.g. `QueueState.active_downloads`
//! in `downloader/control.rs`). The job framework needs to distinguish a
//! pause request from a stop request and let the worker acknowledge each
//! independently, so this wraps two tokens rather than reusing one.

use tokio_util::sync::CancellationToken;

/// Handed to a running job's worker task; checked between pages/chunks.
#[derive(Clone, Default)]
pub struct JobControl {
    pause: CancellationToken,
    stop: CancellationToken,
}

impl JobControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn should_pause(&self) -> bool {
        self.pause.is_cancelled()
    }

    pub fn should_stop(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Requests a pause. A subsequent `request_stop` overrides it (the
    /// worker observes `should_stop` first in its checkpoints).
    pub fn request_pause(&self) {
        self.pause.cancel();
    }

    pub fn request_stop(&self) {
        self.stop.cancel();
    }

    /// Resets the pause flag once the worker has honored it and the job
    /// has been resumed — a fresh `JobControl` is handed to the next run.
    pub fn fresh() -> Self {
        Self::new()
    }
}

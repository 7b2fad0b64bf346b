//! Error types for media-indexer.
//!
//! One crate-wide [`Error`] enum with nested domain error enums
//! (`StoreError`, `RequesterError`, `JobError`, `DownloadError`) converted
//! with `#[from]`, plus HTTP-status mapping for the API layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for media-indexer.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid.
    #[error("configuration error: {message}")]
    Config {
        message: String,
        key: Option<String>,
    },

    /// Database operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// SQLx error surfaced directly (query build failures, pool errors).
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Upstream catalog API request failed.
    #[error("requester error: {0}")]
    Requester(#[from] RequesterError),

    /// Background job lifecycle violation.
    #[error("job error: {0}")]
    Job(#[from] JobError),

    /// Download-related error.
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// Paginator error (`ResourceSelect`).
    #[error("paginator error: {0}")]
    Paginator(#[from] PaginatorError),

    /// Messenger error (subscriber lifecycle).
    #[error("messenger error: {0}")]
    Messenger(#[from] MessengerError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error talking to the upstream API or a download URL.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// XML parse error from an upstream response.
    #[error("XML parse error: {0}")]
    Xml(String),

    /// Requested entity/record not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// API key missing or blank where one is required (spec.md §4.H).
    #[error("API key not configured")]
    MissingApiKey,

    /// Shutdown in progress — not accepting new work.
    #[error("shutdown in progress")]
    ShuttingDown,

    /// Invalid argument supplied by a caller.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Catch-all for conditions not otherwise classified.
    #[error("{0}")]
    Other(String),
}

/// Store (persistence) errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to connect to store: {0}")]
    ConnectionFailed(String),

    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    #[error("query failed: {0}")]
    QueryFailed(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("transaction aborted: {0}")]
    TransactionAborted(String),
}

/// Upstream requester errors (spec.md §4.B).
#[derive(Debug, Error)]
pub enum RequesterError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("upstream returned non-success status {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("upstream returned an error envelope: {0}")]
    ApiError(String),

    #[error("response body could not be parsed: {0}")]
    InvalidResponse(String),
}

/// Background-job framework violations (spec.md §4.E). These never reach
/// the persisted record — they are raised directly to the caller.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("job {uuid} is not pauseable")]
    NotPauseable { uuid: String },

    #[error("job {uuid} is not recoverable")]
    NotRecoverable { uuid: String },

    #[error("illegal transition for job {uuid}: cannot {action} while {current_state}")]
    IllegalTransition {
        uuid: String,
        action: String,
        current_state: String,
    },

    #[error("job {uuid} has already been archived")]
    AlreadyArchived { uuid: String },

    #[error("no job registered under tag {tag}")]
    UnknownTag { tag: String },

    #[error("duplicate job tag registered: {tag}")]
    DuplicateTag { tag: String },

    #[error("an indexer job is already running")]
    IndexerAlreadyRunning,
}

/// Download worker errors (spec.md §4.G, §7 failure taxonomy).
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("download {id} not found")]
    NotFound { id: i64 },

    #[error("download {id} is already {state}")]
    AlreadyInState { id: i64, state: String },

    #[error("connection error: {0}")]
    Connection(String),

    #[error("upstream returned HTTP status {status}")]
    HttpStatus { status: u16 },

    #[error("timeout reached")]
    Timeout,

    #[error("too many redirects")]
    TooManyRedirects,

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("unexpected value: {0}")]
    UnexpectedValue(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("other failure: {0}")]
    Other(String),
}

/// `ResourceSelect` / paginator errors (spec.md §4.C).
#[derive(Debug, Error)]
pub enum PaginatorError {
    #[error("end of results reached")]
    EndOfResults,

    #[error("invalid page number {page}: {reason}")]
    InvalidPage { page: i64, reason: String },
}

/// Messenger subscriber errors (spec.md §4.D).
#[derive(Debug, Error)]
pub enum MessengerError {
    #[error("subscriber {0} not found")]
    SubscriberNotFound(String),
}

/// API error response envelope returned by HTTP handlers.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    pub error: ErrorDetail,
}

/// Detailed error information for API responses.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("conflict", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("unauthorized", message)
    }
}

/// Maps domain errors to HTTP status codes for the API layer.
pub trait ToHttpStatus {
    fn status_code(&self) -> u16;
    fn error_code(&self) -> &'static str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            Error::Config { .. } => 400,
            Error::InvalidArgument(_) => 400,
            Error::MissingApiKey => 400,
            Error::Paginator(PaginatorError::InvalidPage { .. }) => 400,
            Error::NotFound(_) => 404,
            Error::Download(DownloadError::NotFound { .. }) => 404,
            Error::Messenger(MessengerError::SubscriberNotFound(_)) => 404,
            Error::Download(DownloadError::AlreadyInState { .. }) => 409,
            Error::Job(JobError::IllegalTransition { .. }) => 409,
            Error::Job(JobError::IndexerAlreadyRunning) => 409,
            Error::Job(JobError::AlreadyArchived { .. }) => 409,
            Error::Paginator(PaginatorError::EndOfResults) => 410,
            Error::ShuttingDown => 503,
            Error::Requester(_) => 502,
            Error::Network(_) => 502,
            _ => 500,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::InvalidArgument(_) => "invalid_argument",
            Error::MissingApiKey => "missing_api_key",
            Error::NotFound(_) | Error::Download(DownloadError::NotFound { .. }) => "not_found",
            Error::Messenger(MessengerError::SubscriberNotFound(_)) => "subscriber_not_found",
            Error::Download(DownloadError::AlreadyInState { .. }) => "already_in_state",
            Error::Job(JobError::IllegalTransition { .. }) => "illegal_transition",
            Error::Job(JobError::IndexerAlreadyRunning) => "indexer_already_running",
            Error::Job(JobError::AlreadyArchived { .. }) => "job_archived",
            Error::Paginator(PaginatorError::EndOfResults) => "end_of_results",
            Error::Paginator(PaginatorError::InvalidPage { .. }) => "invalid_page",
            Error::ShuttingDown => "shutting_down",
            Error::Requester(_) | Error::Network(_) => "upstream_error",
            _ => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError::new(e.error_code(), e.to_string())
    }
}

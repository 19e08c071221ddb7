use std::path::PathBuf;

/// Core error type.
///
/// Only setup-level failures (configuration, input/output files) surface as
/// this type. Per-chat fetch problems are [`FetchError`] and never abort a run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid path: {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Why signals for a single chat could not be collected.
///
/// Adapters map their transport errors into one of these; the orchestrator
/// routes the chat to the inactive list and keeps going.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("unsupported entity kind: {0}")]
    UnsupportedKind(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected response: {0}")]
    Parse(String),
}

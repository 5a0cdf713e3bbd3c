use std::path::PathBuf;

use thiserror::Error;

/// Failures from the local `git` binary.
#[derive(Debug, Error)]
pub enum GitError {
    #[error("mirror clone of `{remote}` failed: {detail}")]
    CloneFailed { remote: String, detail: String },

    #[error("mirror push to `{remote}` failed: {detail}")]
    PushFailed { remote: String, detail: String },

    #[error("cannot (re)create working copy path `{path}`: {detail}")]
    PathUnwritable { path: PathBuf, detail: String },

    #[error("inspection of `{path}` failed: {detail}")]
    Inspect { path: PathBuf, detail: String },
}

/// Failures from either platform's REST API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected status {status}: {detail}")]
    Unexpected { status: u16, detail: String },
}

impl ApiError {
    /// Only rate limits and transport failures are worth another attempt;
    /// plain 4xx responses will not change on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::RateLimited(_) | ApiError::Network(_))
    }
}

/// Failures detected before any side effect happens.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("mapping file `{0}` is missing or unreadable")]
    MissingFile(PathBuf),

    #[error("malformed mapping file: {0}")]
    MalformedMapping(String),

    #[error("invalid repository reference `{0}`, expected owner/name")]
    InvalidRepoRef(String),

    #[error("logger setup failed: {0}")]
    Logger(String),
}

/// Union of the ways a single orchestrator step can fail.
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("step timed out after {0}s (treated as a network failure)")]
    Timeout(u64),
}

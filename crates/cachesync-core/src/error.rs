//! Error taxonomy for verification, fetching and task execution.
//!
//! Verification problems are usually absorbed into a boolean or an
//! [`Outcome`](crate::sync::Outcome); transfer and write failures are not.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Local file could not be read while computing its digest.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("failed to read {} for digest", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A fetch could not bring the local copy up to date.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid remote location {remote:?}")]
    InvalidRemote {
        remote: String,
        #[source]
        source: url::ParseError,
    },

    #[error("transfer from {url} failed")]
    Transfer {
        url: String,
        #[source]
        source: curl::Error,
    },

    #[error("GET {url} returned HTTP {status}")]
    Http { url: String, status: u32 },

    #[error("failed to write {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("transfer from {url} was cancelled")]
    Cancelled { url: String },
}

impl SyncError {
    pub(crate) fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SyncError::Write {
            path: path.into(),
            source,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::Cancelled { .. })
    }
}

/// Malformed `algorithm:hex` checksum string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DigestParseError {
    #[error("unknown checksum algorithm {0:?}")]
    UnknownAlgorithm(String),

    #[error("checksum {0:?} is missing the `algorithm:` prefix")]
    MissingAlgorithm(String),

    #[error("{algorithm} checksum must be {expected} hex characters, got {actual:?}")]
    BadValue {
        algorithm: &'static str,
        expected: usize,
        actual: String,
    },
}

/// Failure observed through a task handle.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task {index} failed: {error:#}")]
    Failed { index: usize, error: anyhow::Error },

    #[error("task {index} was cancelled")]
    Cancelled { index: usize },

    #[error("task {index} panicked: {message}")]
    Panicked { index: usize, message: String },

    /// The handle already gave out its result through `wait_timeout`.
    #[error("result of task {index} was already taken")]
    Taken { index: usize },
}

impl TaskError {
    /// Position of the failing task in the manager's task list.
    pub fn index(&self) -> usize {
        match self {
            TaskError::Failed { index, .. }
            | TaskError::Cancelled { index }
            | TaskError::Panicked { index, .. }
            | TaskError::Taken { index } => *index,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskError::Cancelled { .. })
    }
}

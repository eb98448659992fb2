use std::path::PathBuf;

use thiserror::Error;

/// Library error type for browser operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The folder handed to the browser is missing or not a directory.
    #[error("invalid folder: {}", .0.display())]
    InvalidFolder(PathBuf),

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A thumbnail could not be produced for one file.
///
/// The message is cut to a display-sized prefix when the error is built, so
/// it can be shown inside a grid cell as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DecodeError {
    pub path: PathBuf,
    pub message: String,
}

impl DecodeError {
    pub fn new(path: impl Into<PathBuf>, cause: impl ToString, limit: usize) -> Self {
        Self {
            path: path.into(),
            message: truncate_chars(&cause.to_string(), limit),
        }
    }
}

/// Failure reported by a host scene integration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// No host application is attached.
    #[error("host integration unavailable")]
    Unavailable,

    /// A parent path or entity no longer exists in the host.
    #[error("host entity not found: {0}")]
    NotFound(String),

    /// The entity exists but has no parameter with that name.
    #[error("entity {entity} has no parameter {param}")]
    MissingParam { entity: String, param: String },

    /// The host refused the call for another reason.
    #[error("host rejected call: {0}")]
    Rejected(String),
}

/// Keep at most `limit` characters of `s`, on a char boundary.
#[must_use]
pub fn truncate_chars(s: &str, limit: usize) -> String {
    match s.char_indices().nth(limit) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

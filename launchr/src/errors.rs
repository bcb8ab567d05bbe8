//! Error types for the search core.
//!
//! Most failures inside a query are not surfaced as errors at all: an
//! unreadable directory is skipped, an unmappable file is a non-match, and a
//! malformed query simply ends that one backend. `SearchError` covers the
//! places where a caller actually receives a `Result`: loading configuration,
//! opening a memory map, compiling a query, spawning a worker.
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for search operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Errors that can occur during search operations
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("Cannot map file {path}: {source}")]
    MapFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Failed to spawn worker thread: {0}")]
    ThreadSpawn(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl SearchError {
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound(path.into())
    }

    pub fn permission_denied(path: impl Into<PathBuf>) -> Self {
        Self::PermissionDenied(path.into())
    }

    pub fn invalid_pattern(pattern: impl Into<String>) -> Self {
        Self::InvalidPattern(pattern.into())
    }

    pub fn map_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::MapFailed {
            path: path.into(),
            source,
        }
    }

    pub fn thread_spawn(msg: impl Into<String>) -> Self {
        Self::ThreadSpawn(msg.into())
    }

    /// Classifies an I/O error raised while opening `path`.
    pub fn from_open(path: &Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::file_not_found(path),
            std::io::ErrorKind::PermissionDenied => Self::permission_denied(path),
            _ => Self::IoError(err),
        }
    }
}

impl From<config::ConfigError> for SearchError {
    fn from(err: config::ConfigError) -> Self {
        Self::ConfigError(err.to_string())
    }
}

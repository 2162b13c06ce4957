//! Error types for trawl.
//!
//! Library crates use [`TrawlError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//! Search backends report bulk-write failures through [`BackendError`], which
//! the index writer inspects to pick a continuation policy.

use std::path::PathBuf;

/// Top-level error type for all trawl operations.
#[derive(Debug, thiserror::Error)]
pub enum TrawlError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Search backend rejected or could not take a write.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Data validation error (invalid setting, malformed record, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TrawlError>;

impl TrawlError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Whole-batch failure reported by a search backend.
///
/// Per-document failures are not errors; they travel in
/// [`BulkSaveReport`](crate::BulkSaveReport).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The backend cannot be reached or refused the whole request.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The write path ran out of memory or space.
    #[error("backend resources exhausted: {0}")]
    ResourceExhausted(String),
}

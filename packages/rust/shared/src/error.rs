//! Error types for Curator.
//!
//! Library crates use [`CuratorError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which half of the dual write an archive failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveStage {
    /// The vector index write.
    Index,
    /// The flat-file write.
    File,
}

impl fmt::Display for ArchiveStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index => f.write_str("index"),
            Self::File => f.write_str("file"),
        }
    }
}

/// Top-level error type for all Curator operations.
#[derive(Debug, thiserror::Error)]
pub enum CuratorError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to a page or the rewrite service.
    #[error("network error: {0}")]
    Network(String),

    /// HTML parsing or content extraction error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Vector index or journal storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad path, malformed record, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The fetch stage could not produce a document.
    #[error("failed to fetch {url}: {cause}")]
    Fetch { url: String, cause: String },

    /// The rewrite stage failed, timed out, or returned nothing usable.
    #[error("rewrite failed: {cause}")]
    Rewrite { cause: String },

    /// Nothing usable was left after sanitizing a title or id override.
    #[error("invalid identity: {input:?} is empty after sanitization")]
    InvalidIdentity { input: String },

    /// Persisting a document failed; `index_written` flags a partial archive.
    #[error("archive failed at {stage} write (index written: {index_written}): {cause}")]
    Archive {
        stage: ArchiveStage,
        index_written: bool,
        cause: String,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CuratorError>;

impl CuratorError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
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

    pub fn fetch(url: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            cause: cause.to_string(),
        }
    }

    pub fn rewrite(cause: impl fmt::Display) -> Self {
        Self::Rewrite {
            cause: cause.to_string(),
        }
    }

    /// Index write failed; nothing was persisted.
    pub fn archive_index(cause: impl fmt::Display) -> Self {
        Self::Archive {
            stage: ArchiveStage::Index,
            index_written: false,
            cause: cause.to_string(),
        }
    }

    /// Index write succeeded but the file write did not.
    pub fn archive_file(cause: impl fmt::Display) -> Self {
        Self::Archive {
            stage: ArchiveStage::File,
            index_written: true,
            cause: cause.to_string(),
        }
    }

    /// True when the index holds the document but the file store does not.
    pub fn is_partial_archive(&self) -> bool {
        matches!(
            self,
            Self::Archive {
                index_written: true,
                ..
            }
        )
    }
}

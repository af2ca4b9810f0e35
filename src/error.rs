//! Error types for auto-unzip
//!
//! Every failure inside a per-archive pipeline is recovered at the pipeline boundary:
//! it is logged with the originating path and ends only that archive's processing.
//! [`Error::Config`] is the single fatal kind and is raised before the watch loop starts.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for auto-unzip operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for auto-unzip
#[derive(Debug, Error)]
pub enum Error {
    /// The candidate file vanished (deleted or moved away) while it was being processed
    #[error("file not found: {}", path.display())]
    NotFound {
        /// Path that could no longer be found
        path: PathBuf,
    },

    /// The file is not a readable ZIP container
    #[error("{} is not a valid archive: {reason}", path.display())]
    InvalidArchive {
        /// Archive that failed validation
        path: PathBuf,
        /// Reason reported by the archive reader
        reason: String,
    },

    /// A permission or lock failure while writing extracted files or deleting the source
    #[error("permission denied for {}: {source}", path.display())]
    PermissionDenied {
        /// Path that could not be accessed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// An archive entry would be written outside the extraction directory
    #[error("entry {entry:?} in {} escapes the extraction directory", archive.display())]
    TraversalRejected {
        /// Archive containing the offending entry
        archive: PathBuf,
        /// Entry name exactly as declared in the archive
        entry: String,
    },

    /// The source archive could not be removed after extraction
    #[error("failed to delete {} after {attempts} attempt(s): {source}", path.display())]
    DeleteFailed {
        /// Archive that is still on disk
        path: PathBuf,
        /// Number of deletion attempts made
        attempts: u32,
        /// Error from the last attempt
        #[source]
        source: std::io::Error,
    },

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "watch_dir")
        key: Option<String>,
    },

    /// Folder watching error
    #[error("folder watch error: {0}")]
    FolderWatch(String),

    /// Processing was abandoned because shutdown was requested
    #[error("processing cancelled by shutdown")]
    Cancelled,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Coarse classification of an [`Error`], used in events and log fields
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Path vanished during processing
    NotFound,
    /// Container signature check failed
    InvalidArchive,
    /// Lock or permission failure during extraction or deletion
    PermissionDenied,
    /// Archive entry attempted to escape the target directory
    TraversalRejected,
    /// Startup configuration is unusable
    ConfigurationError,
    /// Shutdown interrupted the pipeline
    Cancelled,
    /// Anything else
    Unexpected,
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::InvalidArchive { .. } => ErrorKind::InvalidArchive,
            Error::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Error::DeleteFailed { source, .. } => match source.kind() {
                std::io::ErrorKind::PermissionDenied | std::io::ErrorKind::ResourceBusy => {
                    ErrorKind::PermissionDenied
                }
                std::io::ErrorKind::NotFound => ErrorKind::NotFound,
                _ => ErrorKind::Unexpected,
            },
            Error::TraversalRejected { .. } => ErrorKind::TraversalRejected,
            Error::Config { .. } => ErrorKind::ConfigurationError,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => ErrorKind::NotFound,
                std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
                _ => ErrorKind::Unexpected,
            },
            Error::FolderWatch(_) | Error::Serialization(_) | Error::Other(_) => {
                ErrorKind::Unexpected
            }
        }
    }

    /// Whether this error should stop the process rather than a single pipeline
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config { .. })
    }

    /// Attach a path to a raw I/O error, mapping not-found and permission kinds
    /// to their dedicated variants
    pub(crate) fn from_io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound { path },
            std::io::ErrorKind::PermissionDenied | std::io::ErrorKind::ResourceBusy => {
                Error::PermissionDenied { path, source: err }
            }
            _ => Error::Io(err),
        }
    }
}

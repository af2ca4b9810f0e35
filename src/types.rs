//! Core types and events

use crate::error::ErrorKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Pipeline stage of a single archive
///
/// Stages advance strictly in order. The outcome is reported separately as
/// [`Event::Completed`] or as [`Event::Failed`] carrying the stage that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Event accepted, waiting out the debounce delay
    Detected,
    /// Polling until the file size stops changing
    Stabilizing,
    /// Unpacking into the extraction directory
    Extracting,
    /// Removing the source archive
    Cleaning,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Detected => "detected",
            Stage::Stabilizing => "stabilizing",
            Stage::Extracting => "extracting",
            Stage::Cleaning => "cleaning",
        };
        f.write_str(name)
    }
}

/// Kind of filesystem notification delivered by the event source
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchEventKind {
    /// A new entry appeared in the watched directory
    Created,
    /// An entry was renamed or moved into the watched directory
    RenamedInto,
    /// Any other notification (modification, removal, access)
    Other,
}

/// Filesystem notification for one path
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchEvent {
    /// What happened
    pub kind: WatchEventKind,
    /// Resulting absolute path (the destination for renames)
    pub path: PathBuf,
    /// Whether the path refers to a directory
    pub is_dir: bool,
}

impl WatchEvent {
    /// Notification for a newly created file
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: WatchEventKind::Created,
            path: path.into(),
            is_dir: false,
        }
    }

    /// Notification for a file renamed into the watched directory
    pub fn renamed_into(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: WatchEventKind::RenamedInto,
            path: path.into(),
            is_dir: false,
        }
    }
}

/// Result of unpacking one archive
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionSummary {
    /// Directory the archive was unpacked into
    pub target: PathBuf,
    /// Number of entries declared by the archive
    pub entries: usize,
    /// Regular files written to disk
    pub files: Vec<PathBuf>,
}

/// Event emitted during an archive's intake lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A matching archive was accepted for processing
    Detected {
        /// Archive path
        path: PathBuf,
    },

    /// Size polling started
    Stabilizing {
        /// Archive path
        path: PathBuf,
    },

    /// Two consecutive size samples agreed
    Stable {
        /// Archive path
        path: PathBuf,
        /// Final size in bytes
        size: u64,
    },

    /// Unpacking started
    Extracting {
        /// Archive path
        path: PathBuf,
        /// Extraction directory
        target: PathBuf,
    },

    /// All entries were written
    Extracted {
        /// Archive path
        path: PathBuf,
        /// Extraction directory
        target: PathBuf,
        /// Number of entries declared by the archive
        entries: usize,
    },

    /// Source removal started
    Cleaning {
        /// Archive path
        path: PathBuf,
    },

    /// A lock-style deletion failure that will be retried
    DeleteRetry {
        /// Archive path
        path: PathBuf,
        /// Attempt that failed (1-based)
        attempt: u32,
        /// Configured attempt limit
        max_attempts: u32,
    },

    /// Archive extracted and removed
    Completed {
        /// Archive path (no longer on disk)
        path: PathBuf,
        /// Extraction directory
        target: PathBuf,
    },

    /// Pipeline ended without completing
    Failed {
        /// Archive path
        path: PathBuf,
        /// Stage that failed
        stage: Stage,
        /// Error classification
        kind: ErrorKind,
        /// Error message
        error: String,
    },

    /// Event for an archive that is already being processed was ignored
    Duplicate {
        /// Archive path
        path: PathBuf,
    },
}

impl Event {
    /// Archive path this event refers to
    pub fn path(&self) -> &std::path::Path {
        match self {
            Event::Detected { path }
            | Event::Stabilizing { path }
            | Event::Stable { path, .. }
            | Event::Extracting { path, .. }
            | Event::Extracted { path, .. }
            | Event::Cleaning { path }
            | Event::DeleteRetry { path, .. }
            | Event::Completed { path, .. }
            | Event::Failed { path, .. }
            | Event::Duplicate { path } => path,
        }
    }

    /// Whether this event ends an archive's pipeline
    pub fn is_terminal(&self) -> bool {
        matches!(self, Event::Completed { .. } | Event::Failed { .. })
    }
}

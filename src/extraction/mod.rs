//! Archive extraction
//!
//! Unpacks a single ZIP archive into a sibling directory named after the archive
//! without its extension (`DIR/name.zip` → `DIR/name/`). Archives are validated
//! before the destination is touched, and entries that would escape the
//! destination reject the whole archive.

mod zip;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use zip::ZipExtractor;

use crate::error::{Error, Result};
use crate::types::ExtractionSummary;
use std::path::{Path, PathBuf};
use tokio::task::spawn_blocking;
use tracing::info;

/// Check whether `path` carries the archive extension (case-insensitive)
pub fn has_archive_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

/// Directory an archive is extracted into: the archive path minus its extension
///
/// # Errors
/// Returns [`Error::Other`] if the path has no file stem or no parent directory.
pub fn extraction_target(archive_path: &Path) -> Result<PathBuf> {
    let stem = archive_path
        .file_stem()
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| Error::Other(format!("{} has no file name", archive_path.display())))?;
    let parent = archive_path.parent().ok_or_else(|| {
        Error::Other(format!("{} has no parent directory", archive_path.display()))
    })?;
    Ok(parent.join(stem))
}

/// Validates and extracts archives off the async runtime
#[derive(Clone, Debug, Default)]
pub struct ArchiveExtractor;

impl ArchiveExtractor {
    /// Create an extractor
    pub fn new() -> Self {
        Self
    }

    /// Extract `archive_path` into its [`extraction_target`]
    ///
    /// Re-running on an existing target directory is not an error; existing
    /// files with the same names are overwritten. The archive handle is closed
    /// before this returns.
    ///
    /// # Errors
    /// - [`Error::InvalidArchive`] if the file is not a ZIP container
    /// - [`Error::TraversalRejected`] if an entry would escape the target
    /// - [`Error::PermissionDenied`] / [`Error::NotFound`] / [`Error::Io`] on filesystem failures
    pub async fn extract(&self, archive_path: &Path) -> Result<ExtractionSummary> {
        let target = extraction_target(archive_path)?;
        self.extract_to(archive_path, &target).await
    }

    /// Extract `archive_path` into an explicit destination directory
    pub async fn extract_to(&self, archive_path: &Path, dest_path: &Path) -> Result<ExtractionSummary> {
        info!(?archive_path, ?dest_path, "extracting archive");

        // ZIP decoding is synchronous; keep it off the runtime workers
        let archive_owned = archive_path.to_path_buf();
        let dest_owned = dest_path.to_path_buf();
        let extracted = spawn_blocking(move || ZipExtractor::extract(&archive_owned, &dest_owned))
            .await
            .map_err(|e| Error::Other(format!("extraction task panicked: {}", e)))??;

        Ok(ExtractionSummary {
            target: dest_path.to_path_buf(),
            entries: extracted.entries,
            files: extracted.files,
        })
    }
}

use crate::error::{Error, Result};
use std::fs::File;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

/// Archive extractor for ZIP files
pub struct ZipExtractor;

/// Entries and written files of a finished extraction
#[derive(Debug)]
pub(crate) struct Extracted {
    pub(crate) entries: usize,
    pub(crate) files: Vec<PathBuf>,
}

impl ZipExtractor {
    /// Resolve an entry name to a path relative to the extraction directory
    ///
    /// Returns `None` for names that would land outside it: parent-directory
    /// segments, absolute paths, drive or UNC prefixes, and embedded NULs.
    pub fn sanitize_entry_name(name: &str) -> Option<PathBuf> {
        if name.contains('\0') {
            return None;
        }

        let mut relative = PathBuf::new();
        for component in Path::new(name).components() {
            match component {
                Component::Normal(part) => relative.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
        }
        Some(relative)
    }

    /// Open and validate an archive
    ///
    /// Checks the container structure and every entry name before anything is
    /// written, so a rejected archive leaves the filesystem untouched.
    fn open_validated(archive_path: &Path) -> Result<zip::ZipArchive<File>> {
        let file = File::open(archive_path).map_err(|e| Error::from_io(archive_path, e))?;

        let archive = zip::ZipArchive::new(file).map_err(|e| match e {
            zip::result::ZipError::Io(io) => Error::from_io(archive_path, io),
            other => Error::InvalidArchive {
                path: archive_path.to_path_buf(),
                reason: other.to_string(),
            },
        })?;

        if let Some(entry) = archive
            .file_names()
            .find(|name| Self::sanitize_entry_name(name).is_none())
        {
            warn!(?archive_path, entry, "rejecting archive with unsafe entry path");
            return Err(Error::TraversalRejected {
                archive: archive_path.to_path_buf(),
                entry: entry.to_string(),
            });
        }

        Ok(archive)
    }

    /// Refuse entries that would pass through a symlink already present in the
    /// destination
    ///
    /// Only components beneath `dest_path` are checked; the first one that does
    /// not exist yet ends the walk, since nothing below it can exist either.
    fn reject_symlinks(
        archive_path: &Path,
        dest_path: &Path,
        relative: &Path,
        entry: &str,
    ) -> Result<()> {
        let mut current = dest_path.to_path_buf();
        for component in relative.components() {
            current.push(component);
            match std::fs::symlink_metadata(&current) {
                Ok(meta) if meta.file_type().is_symlink() => {
                    warn!(?archive_path, entry, link = ?current, "refusing to extract through symlink");
                    return Err(Error::TraversalRejected {
                        archive: archive_path.to_path_buf(),
                        entry: entry.to_string(),
                    });
                }
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
                Err(e) => return Err(Error::from_io(&current, e)),
            }
        }
        Ok(())
    }

    /// Check that `dir` resolves to a location inside the canonical extraction root
    fn ensure_contained(archive_path: &Path, root: &Path, dir: &Path, entry: &str) -> Result<()> {
        let resolved = dir.canonicalize().map_err(|e| Error::from_io(dir, e))?;
        if resolved.starts_with(root) {
            return Ok(());
        }

        warn!(?archive_path, entry, ?resolved, "entry resolves outside extraction directory");
        Err(Error::TraversalRejected {
            archive: archive_path.to_path_buf(),
            entry: entry.to_string(),
        })
    }

    /// Write a single entry beneath `dest_path`
    fn extract_entry(
        archive: &mut zip::ZipArchive<File>,
        index: usize,
        archive_path: &Path,
        dest_path: &Path,
        root: &Path,
    ) -> Result<Option<PathBuf>> {
        let mut entry = archive.by_index(index).map_err(|e| match e {
            zip::result::ZipError::Io(io) => Error::from_io(archive_path, io),
            other => Error::InvalidArchive {
                path: archive_path.to_path_buf(),
                reason: format!("failed to read entry {}: {}", index, other),
            },
        })?;

        let relative =
            Self::sanitize_entry_name(entry.name()).ok_or_else(|| Error::TraversalRejected {
                archive: archive_path.to_path_buf(),
                entry: entry.name().to_string(),
            })?;
        Self::reject_symlinks(archive_path, dest_path, &relative, entry.name())?;
        let out_path = dest_path.join(&relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|e| Error::from_io(&out_path, e))?;
            Self::ensure_contained(archive_path, root, &out_path, entry.name())?;
            return Ok(None);
        }

        if relative.as_os_str().is_empty() {
            return Err(Error::InvalidArchive {
                path: archive_path.to_path_buf(),
                reason: format!("file entry {:?} has no name", entry.name()),
            });
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::from_io(parent, e))?;
            Self::ensure_contained(archive_path, root, parent, entry.name())?;
        }

        let mut outfile = File::create(&out_path).map_err(|e| Error::from_io(&out_path, e))?;
        std::io::copy(&mut entry, &mut outfile).map_err(|e| Error::from_io(&out_path, e))?;

        Ok(Some(out_path))
    }

    fn extract_entries(
        archive: &mut zip::ZipArchive<File>,
        archive_path: &Path,
        dest_path: &Path,
    ) -> Result<Vec<PathBuf>> {
        let root = dest_path
            .canonicalize()
            .map_err(|e| Error::from_io(dest_path, e))?;

        let mut files = Vec::new();
        for i in 0..archive.len() {
            if let Some(path) = Self::extract_entry(archive, i, archive_path, dest_path, &root)? {
                files.push(path);
            }
        }
        Ok(files)
    }

    /// Extract `archive_path` into `dest_path`
    ///
    /// The destination is created only after validation succeeds. If extraction
    /// then fails while the freshly created destination is still empty, it is
    /// removed again.
    pub(crate) fn extract(archive_path: &Path, dest_path: &Path) -> Result<Extracted> {
        debug!(?archive_path, ?dest_path, "attempting ZIP extraction");

        let mut archive = Self::open_validated(archive_path)?;
        let entries = archive.len();
        info!(?archive_path, entries, "archive contains {} entries", entries);

        // Links left in an existing destination must not redirect any entry
        if dest_path.exists() {
            for name in archive.file_names() {
                if let Some(relative) = Self::sanitize_entry_name(name) {
                    Self::reject_symlinks(archive_path, dest_path, &relative, name)?;
                }
            }
        }

        let created = !dest_path.exists();
        std::fs::create_dir_all(dest_path).map_err(|e| Error::from_io(dest_path, e))?;
        if created {
            info!(?dest_path, "created extraction directory");
        }

        let result = Self::extract_entries(&mut archive, archive_path, dest_path);

        // Release the archive handle before the caller tries to delete the source
        drop(archive);

        let files = match result {
            Ok(files) => files,
            Err(e) => {
                if created {
                    remove_if_empty(dest_path);
                }
                return Err(e);
            }
        };

        info!(
            ?archive_path,
            ?dest_path,
            extracted_count = files.len(),
            "ZIP extraction successful"
        );

        Ok(Extracted { entries, files })
    }
}

fn remove_if_empty(dir: &Path) {
    let is_empty = std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false);
    if is_empty {
        if let Err(e) = std::fs::remove_dir(dir) {
            warn!(?dir, error = %e, "failed to remove empty extraction directory");
        } else {
            debug!(?dir, "removed empty extraction directory after failure");
        }
    }
}

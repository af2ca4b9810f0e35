use crate::error::{Error, ErrorKind};
use crate::extraction::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Create a valid ZIP archive containing the given files
fn create_zip_archive_multi(archive_path: &Path, files: &[(&str, &[u8])]) {
    let file = std::fs::File::create(archive_path).unwrap();
    let mut writer = ::zip::ZipWriter::new(file);
    let options =
        ::zip::write::FileOptions::default().compression_method(::zip::CompressionMethod::Stored);
    for (name, content) in files {
        writer.start_file(*name, options).unwrap();
        std::io::Write::write_all(&mut writer, content).unwrap();
    }
    writer.finish().unwrap();
}

/// Relative paths of every file and directory under `root`, sorted
fn tree(root: &Path) -> Vec<String> {
    let mut entries: Vec<String> = walkdir::WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .map(|e| {
            let e = e.unwrap();
            e.path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    entries.sort();
    entries
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

#[test]
fn test_has_archive_extension_is_case_insensitive() {
    assert!(has_archive_extension(Path::new("/d/report.zip"), "zip"));
    assert!(has_archive_extension(Path::new("/d/REPORT.ZIP"), "zip"));
    assert!(has_archive_extension(Path::new("/d/Report.Zip"), "ZIP"));
    assert!(!has_archive_extension(Path::new("/d/report.zip.part"), "zip"));
    assert!(!has_archive_extension(Path::new("/d/report.7z"), "zip"));
    assert!(!has_archive_extension(Path::new("/d/zip"), "zip"));
}

#[test]
fn test_extraction_target_drops_extension() {
    assert_eq!(
        extraction_target(Path::new("/downloads/report.zip")).unwrap(),
        PathBuf::from("/downloads/report")
    );
    assert_eq!(
        extraction_target(Path::new("/downloads/backup.tar.ZIP")).unwrap(),
        PathBuf::from("/downloads/backup.tar")
    );
}

#[test]
fn test_extraction_target_requires_file_name() {
    assert!(extraction_target(Path::new("/")).is_err());
}

#[test]
fn test_sanitize_entry_name_accepts_relative_paths() {
    assert_eq!(
        ZipExtractor::sanitize_entry_name("sub/b.txt"),
        Some(PathBuf::from("sub").join("b.txt"))
    );
    assert_eq!(
        ZipExtractor::sanitize_entry_name("./a.txt"),
        Some(PathBuf::from("a.txt"))
    );
    assert_eq!(
        ZipExtractor::sanitize_entry_name("dir/"),
        Some(PathBuf::from("dir"))
    );
}

#[test]
fn test_sanitize_entry_name_rejects_escapes() {
    assert_eq!(ZipExtractor::sanitize_entry_name("../evil.txt"), None);
    assert_eq!(ZipExtractor::sanitize_entry_name("sub/../../evil.txt"), None);
    assert_eq!(ZipExtractor::sanitize_entry_name("/etc/passwd"), None);
    assert_eq!(ZipExtractor::sanitize_entry_name("a\0b"), None);
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_extract_preserves_structure() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("report.zip");
    create_zip_archive_multi(
        &archive,
        &[("a.txt", b"alpha"), ("sub/b.txt", b"bravo")],
    );

    let summary = ArchiveExtractor::new().extract(&archive).await.unwrap();

    let target = temp_dir.path().join("report");
    assert_eq!(summary.target, target);
    assert_eq!(summary.entries, 2);
    assert_eq!(summary.files.len(), 2);
    assert_eq!(tree(&target), vec!["a.txt", "sub", "sub/b.txt"]);
    assert_eq!(std::fs::read(target.join("a.txt")).unwrap(), b"alpha");
    assert_eq!(
        std::fs::read(target.join("sub").join("b.txt")).unwrap(),
        b"bravo"
    );

    // Extraction never touches the source archive
    assert!(archive.exists());
}

#[tokio::test]
async fn test_extract_creates_directory_entries() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("dirs.zip");
    {
        let file = std::fs::File::create(&archive).unwrap();
        let mut writer = ::zip::ZipWriter::new(file);
        let options = ::zip::write::FileOptions::default();
        writer.add_directory("empty/", options).unwrap();
        writer.start_file("full/c.txt", options).unwrap();
        std::io::Write::write_all(&mut writer, b"charlie").unwrap();
        writer.finish().unwrap();
    }

    let summary = ArchiveExtractor::new().extract(&archive).await.unwrap();

    assert_eq!(summary.entries, 2);
    assert_eq!(summary.files.len(), 1);
    assert_eq!(
        tree(&temp_dir.path().join("dirs")),
        vec!["empty", "full", "full/c.txt"]
    );
}

#[tokio::test]
async fn test_extract_into_existing_directory_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("again.zip");
    create_zip_archive_multi(&archive, &[("a.txt", b"new contents")]);

    let target = temp_dir.path().join("again");
    std::fs::create_dir(&target).unwrap();
    std::fs::write(target.join("a.txt"), b"old").unwrap();

    let extractor = ArchiveExtractor::new();
    extractor.extract(&archive).await.unwrap();
    extractor.extract(&archive).await.unwrap();

    assert_eq!(std::fs::read(target.join("a.txt")).unwrap(), b"new contents");
    assert_eq!(tree(&target), vec!["a.txt"]);
}

#[tokio::test]
async fn test_invalid_archive_creates_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("broken.zip");
    std::fs::write(&archive, b"this is definitely not a zip file").unwrap();

    let err = ArchiveExtractor::new().extract(&archive).await.unwrap_err();

    assert!(
        matches!(err, Error::InvalidArchive { ref path, .. } if path == &archive),
        "got {err:?}"
    );
    assert_eq!(err.kind(), ErrorKind::InvalidArchive);
    assert!(!temp_dir.path().join("broken").exists());
    assert!(archive.exists());
}

#[tokio::test]
async fn test_traversal_entry_rejects_whole_archive() {
    let temp_dir = TempDir::new().unwrap();
    let watch = temp_dir.path().join("watch");
    std::fs::create_dir(&watch).unwrap();
    let archive = watch.join("evil.zip");
    create_zip_archive_multi(
        &archive,
        &[("innocent.txt", b"ok"), ("../escaped.txt", b"pwned")],
    );

    let err = ArchiveExtractor::new().extract(&archive).await.unwrap_err();

    match &err {
        Error::TraversalRejected { archive: a, entry } => {
            assert_eq!(a, &archive);
            assert_eq!(entry, "../escaped.txt");
        }
        other => panic!("expected TraversalRejected, got {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::TraversalRejected);
    assert!(!watch.join("escaped.txt").exists());
    assert!(!temp_dir.path().join("escaped.txt").exists());
    // Rejected before any write, so not even the safe entry lands
    assert!(!watch.join("evil").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlinked_directory_in_existing_target_is_not_followed() {
    let temp_dir = TempDir::new().unwrap();
    let watch = temp_dir.path().join("watch");
    let outside = temp_dir.path().join("outside");
    std::fs::create_dir_all(watch.join("report")).unwrap();
    std::fs::create_dir(&outside).unwrap();
    std::os::unix::fs::symlink("../../outside", watch.join("report").join("sub")).unwrap();

    let archive = watch.join("report.zip");
    create_zip_archive_multi(&archive, &[("a.txt", b"alpha"), ("sub/b.txt", b"bravo")]);

    let err = ArchiveExtractor::new().extract(&archive).await.unwrap_err();

    match &err {
        Error::TraversalRejected { entry, .. } => assert_eq!(entry, "sub/b.txt"),
        other => panic!("expected TraversalRejected, got {other:?}"),
    }
    assert!(tree(&outside).is_empty(), "nothing may land behind the link");
    // Rejected before any write
    assert!(!watch.join("report").join("a.txt").exists());
    assert!(archive.exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlinked_file_in_existing_target_is_not_overwritten() {
    let temp_dir = TempDir::new().unwrap();
    let watch = temp_dir.path().join("watch");
    std::fs::create_dir_all(watch.join("report")).unwrap();
    let victim = temp_dir.path().join("victim.txt");
    std::fs::write(&victim, b"original").unwrap();
    std::os::unix::fs::symlink(&victim, watch.join("report").join("a.txt")).unwrap();

    let archive = watch.join("report.zip");
    create_zip_archive_multi(&archive, &[("a.txt", b"overwritten")]);

    let err = ArchiveExtractor::new().extract(&archive).await.unwrap_err();

    assert!(
        matches!(&err, Error::TraversalRejected { entry, .. } if entry == "a.txt"),
        "got {err:?}"
    );
    assert_eq!(err.kind(), ErrorKind::TraversalRejected);
    assert_eq!(std::fs::read(&victim).unwrap(), b"original");
}

#[cfg(unix)]
#[tokio::test]
async fn test_unrelated_symlink_in_existing_target_is_left_alone() {
    let temp_dir = TempDir::new().unwrap();
    let watch = temp_dir.path().join("watch");
    let outside = temp_dir.path().join("outside");
    std::fs::create_dir_all(watch.join("report")).unwrap();
    std::fs::create_dir(&outside).unwrap();
    std::os::unix::fs::symlink("../../outside", watch.join("report").join("elsewhere")).unwrap();

    let archive = watch.join("report.zip");
    create_zip_archive_multi(&archive, &[("a.txt", b"alpha"), ("sub/b.txt", b"bravo")]);

    ArchiveExtractor::new().extract(&archive).await.unwrap();

    assert_eq!(
        std::fs::read(watch.join("report").join("sub").join("b.txt")).unwrap(),
        b"bravo"
    );
    assert!(tree(&outside).is_empty());
}

#[tokio::test]
async fn test_absolute_entry_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("abs.zip");
    let outside = temp_dir.path().join("outside.txt");
    let absolute_name = outside.to_string_lossy().into_owned();
    create_zip_archive_multi(&archive, &[(absolute_name.as_str(), b"pwned")]);

    let err = ArchiveExtractor::new().extract(&archive).await.unwrap_err();

    assert!(matches!(err, Error::TraversalRejected { .. }), "got {err:?}");
    assert!(!outside.exists());
}

#[tokio::test]
async fn test_failure_after_validation_leaves_no_empty_directory() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("nameless.zip");
    // "." normalizes to an empty relative path, which cannot be written as a file
    create_zip_archive_multi(&archive, &[(".", b"data")]);

    let err = ArchiveExtractor::new().extract(&archive).await.unwrap_err();

    assert!(matches!(err, Error::InvalidArchive { .. }), "got {err:?}");
    assert!(!temp_dir.path().join("nameless").exists());
}

#[tokio::test]
async fn test_missing_archive_is_not_found() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("missing.zip");

    let err = ArchiveExtractor::new().extract(&archive).await.unwrap_err();

    assert!(matches!(err, Error::NotFound { .. }), "got {err:?}");
    assert!(!temp_dir.path().join("missing").exists());
}

#[tokio::test]
async fn test_archive_handle_released_after_extraction() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("release.zip");
    create_zip_archive_multi(&archive, &[("a.txt", b"alpha")]);

    ArchiveExtractor::new().extract(&archive).await.unwrap();

    std::fs::remove_file(&archive).unwrap();
    assert!(!archive.exists());
}

#[tokio::test]
async fn test_extract_to_explicit_destination() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("report.zip");
    create_zip_archive_multi(&archive, &[("a.txt", b"alpha")]);
    let dest = temp_dir.path().join("elsewhere").join("out");

    let summary = ArchiveExtractor::new()
        .extract_to(&archive, &dest)
        .await
        .unwrap();

    assert_eq!(summary.target, dest);
    assert!(dest.join("a.txt").is_file());
    assert!(!temp_dir.path().join("report").exists());
}

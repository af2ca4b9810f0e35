//! Archive fixtures and filesystem helpers

use auto_unzip::Event;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tokio::sync::broadcast;

/// Build an in-memory ZIP archive containing the given files
pub fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default();
    for (name, content) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Write a ZIP archive to `path`
pub fn write_zip(path: &Path, files: &[(&str, &[u8])]) {
    std::fs::write(path, zip_bytes(files)).unwrap();
}

/// Relative paths of every entry under `root`, sorted, with `/` separators
pub fn tree(root: &Path) -> Vec<String> {
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

/// Wait for the terminal event (completed or failed) of the archive named `file_name`
pub async fn wait_for_outcome(rx: &mut broadcast::Receiver<Event>, file_name: &str) -> Event {
    tokio::time::timeout(Duration::from_secs(15), async {
        loop {
            let event = rx.recv().await.unwrap();
            if event.is_terminal() && event.path().ends_with(file_name) {
                return event;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("no outcome for {file_name} within 15s"))
}

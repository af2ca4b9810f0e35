//! Filesystem event source
//!
//! Wraps a `notify` watcher on a single directory (non-recursive) and forwards
//! every notification as a [`WatchEvent`] on a channel. Filtering is left to the
//! [`IntakeCoordinator`](crate::coordinator::IntakeCoordinator).
//!
//! # Example
//!
//! ```no_run
//! use auto_unzip::{Config, IntakeCoordinator};
//! use auto_unzip::watcher::FolderWatcher;
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::new("/home/me/Downloads");
//! config.validate()?;
//!
//! let (tx, rx) = mpsc::unbounded_channel();
//! let mut watcher = FolderWatcher::new(&config.watch_dir, tx)?;
//! watcher.start()?;
//!
//! let coordinator = IntakeCoordinator::new(&config);
//! coordinator.run(rx).await;
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use crate::types::{WatchEvent, WatchEventKind};
use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{
    Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Watches one directory and forwards its events
pub struct FolderWatcher {
    /// Filesystem watcher instance
    watcher: RecommendedWatcher,

    /// Directory being watched
    watch_dir: PathBuf,
}

impl FolderWatcher {
    /// Create a watcher that sends translated events to `tx`
    ///
    /// # Errors
    /// Returns error if the filesystem watcher cannot be initialized
    pub fn new(watch_dir: &Path, tx: mpsc::UnboundedSender<WatchEvent>) -> Result<Self> {
        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for watch_event in translate_event(&event) {
                        if tx.send(watch_event).is_err() {
                            debug!("event receiver dropped, discarding filesystem event");
                            return;
                        }
                    }
                }
                Err(e) => error!("Filesystem watcher error: {}", e),
            },
            NotifyConfig::default(),
        )
        .map_err(|e| Error::FolderWatch(e.to_string()))?;

        Ok(Self {
            watcher,
            watch_dir: watch_dir.to_path_buf(),
        })
    }

    /// Directory being watched
    pub fn watch_dir(&self) -> &Path {
        &self.watch_dir
    }

    /// Start watching the directory
    ///
    /// # Errors
    /// Returns error if the directory does not exist or cannot be watched
    pub fn start(&mut self) -> Result<()> {
        if !self.watch_dir.is_dir() {
            return Err(Error::FolderWatch(format!(
                "watch directory not found: {}",
                self.watch_dir.display()
            )));
        }

        self.watcher
            .watch(&self.watch_dir, RecursiveMode::NonRecursive)
            .map_err(|e| Error::FolderWatch(format!("Failed to watch folder: {}", e)))?;

        info!("Watching folder: {}", self.watch_dir.display());
        Ok(())
    }

    /// Stop watching
    pub fn stop(self) {
        // Dropping the watcher will automatically stop watching
        drop(self.watcher);
        info!("Folder watcher stopped");
    }
}

/// Convert a `notify` event into intake events
///
/// Creations map to [`WatchEventKind::Created`]. Renames map to
/// [`WatchEventKind::RenamedInto`] using the destination path; a rename with an
/// unknown direction counts only if the path still exists. Everything else is
/// [`WatchEventKind::Other`].
pub fn translate_event(event: &Event) -> Vec<WatchEvent> {
    match event.kind {
        EventKind::Create(kind) => event
            .paths
            .iter()
            .map(|path| WatchEvent {
                kind: WatchEventKind::Created,
                path: path.clone(),
                is_dir: kind == CreateKind::Folder || path.is_dir(),
            })
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            event.paths.iter().map(|path| renamed_into(path)).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            // paths = [from, to]
            event.paths.get(1).map(|to| renamed_into(to)).into_iter().collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => event
            .paths
            .iter()
            .filter(|path| path.exists())
            .map(|path| renamed_into(path))
            .collect(),
        _ => event
            .paths
            .iter()
            .map(|path| WatchEvent {
                kind: WatchEventKind::Other,
                path: path.clone(),
                is_dir: false,
            })
            .collect(),
    }
}

fn renamed_into(path: &Path) -> WatchEvent {
    WatchEvent {
        kind: WatchEventKind::RenamedInto,
        path: path.to_path_buf(),
        is_dir: path.is_dir(),
    }
}

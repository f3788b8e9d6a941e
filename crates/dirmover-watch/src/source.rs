//! Creation-event source
//!
//! Wraps the `notify` crate to watch one directory (non-recursive) and turn
//! file-creation notifications into [`PendingPath`] values on the
//! [`WorkQueue`]. The callback runs on the watcher's own thread; its only job
//! is a non-blocking enqueue.
//!
//! Watcher faults (backend errors, overflowed event queues) are not fatal.
//! They are forwarded as text over an unbounded channel so the worker can
//! record them in the audit trail.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dirmover_core::{MonitorError, PendingPath};
use notify::event::CreateKind;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::queue::WorkQueue;

/// Sender half for watcher faults
pub type FaultSender = mpsc::UnboundedSender<String>;

/// Receiver half for watcher faults
pub type FaultReceiver = mpsc::UnboundedReceiver<String>;

/// Active subscription to creation events of one directory
///
/// Dropping the source releases the OS watch; [`EventSource::close`] does the
/// same with logging.
pub struct EventSource {
    /// The underlying notify watcher instance
    watcher: RecommendedWatcher,
    /// Canonical path of the watched directory
    path: PathBuf,
}

impl std::fmt::Debug for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSource")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl EventSource {
    /// Starts watching `dir` and feeding creation events into `queue`
    ///
    /// # Errors
    /// Returns [`MonitorError::DirectoryUnavailable`] if `dir` is missing,
    /// not a directory, or unreadable, and [`MonitorError::Watch`] if the OS
    /// watcher cannot be created or attached.
    pub fn subscribe(
        dir: &Path,
        queue: Arc<WorkQueue>,
        faults: FaultSender,
    ) -> Result<Self, MonitorError> {
        let unavailable = |source| MonitorError::DirectoryUnavailable {
            path: dir.to_path_buf(),
            source,
        };
        let path = std::fs::canonicalize(dir).map_err(unavailable)?;
        std::fs::read_dir(&path).map_err(unavailable)?;

        info!(path = %path.display(), "Subscribing to creation events");

        let watched = path.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    if event.need_rescan() {
                        warn!(path = %watched.display(), "Watcher requested a rescan");
                        let _ = faults.send(format!(
                            "file watcher lost events for {}; some new files may not be moved",
                            watched.display()
                        ));
                    }
                    if let Some(created) = created_file(&event) {
                        queue.enqueue(PendingPath::new(created));
                    }
                }
                Err(err) => {
                    error!(error = %err, "File watcher error");
                    let _ = faults.send(format!("file watcher error: {err}"));
                }
            },
            notify::Config::default(),
        )
        .map_err(|e| MonitorError::Watch(format!("failed to create watcher: {e}")))?;

        watcher
            .watch(&path, RecursiveMode::NonRecursive)
            .map_err(|e| MonitorError::Watch(format!("failed to watch {}: {e}", path.display())))?;

        Ok(Self { watcher, path })
    }

    /// Canonical path of the watched directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stops watching and releases the OS handle
    pub fn close(mut self) {
        info!(path = %self.path.display(), "Unsubscribing from creation events");
        if let Err(err) = self.watcher.unwatch(&self.path) {
            // The directory may already be gone; dropping the watcher still
            // releases the handle.
            debug!(error = %err, "Unwatch failed");
        }
    }
}

/// Path of a newly created file, or `None` for every other event
///
/// Modifications, renames, removals, access events and directory creation
/// never produce work.
fn created_file(event: &notify::Event) -> Option<PathBuf> {
    match &event.kind {
        EventKind::Create(CreateKind::Folder) => {
            debug!(paths = ?event.paths, "Ignoring directory creation");
            None
        }
        EventKind::Create(_) => {
            let path = event.paths.first()?;
            debug!(path = %path.display(), "Mapped Create event");
            Some(path.clone())
        }
        _ => None,
    }
}

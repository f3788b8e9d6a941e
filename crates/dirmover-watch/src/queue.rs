//! Work queue between the event source and the worker
//!
//! Enqueue is called from the watcher's callback thread and never blocks for
//! longer than a short critical section. The worker is the only consumer.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use dirmover_core::PendingPath;
use tracing::{debug, info, warn};

/// Unbounded FIFO of paths awaiting relocation
///
/// The queue stays unbounded; `warn_threshold` only controls when a backlog
/// warning is emitted. The warning fires once per crossing and re-arms when
/// the depth drops back below the threshold.
#[derive(Debug)]
pub struct WorkQueue {
    entries: Mutex<VecDeque<PendingPath>>,
    warn_threshold: usize,
    backlogged: AtomicBool,
}

impl WorkQueue {
    /// Creates a queue that warns once its depth reaches `warn_threshold`.
    /// A threshold of `0` disables the warning.
    pub fn new(warn_threshold: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            warn_threshold,
            backlogged: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<PendingPath>> {
        // A panic cannot happen while the lock is held, so a poisoned
        // queue still holds consistent data.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a path to the back of the queue
    pub fn enqueue(&self, path: PendingPath) {
        debug!(path = %path, "Enqueuing pending path");
        let depth = {
            let mut entries = self.lock();
            entries.push_back(path);
            entries.len()
        };

        if self.warn_threshold > 0
            && depth >= self.warn_threshold
            && !self.backlogged.swap(true, Ordering::Relaxed)
        {
            warn!(
                depth,
                threshold = self.warn_threshold,
                "Work queue backlog is growing; the worker may be stalled on a file"
            );
        }
    }

    /// Removes and returns the oldest path, or `None` when empty
    pub fn try_dequeue(&self) -> Option<PendingPath> {
        let (path, depth) = {
            let mut entries = self.lock();
            let path = entries.pop_front();
            (path, entries.len())
        };

        if depth < self.warn_threshold && self.backlogged.swap(false, Ordering::Relaxed) {
            info!(depth, "Work queue backlog cleared");
        }

        path
    }

    /// Number of queued paths
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drops every queued path and returns how many were discarded
    pub fn clear(&self) -> usize {
        let mut entries = self.lock();
        let count = entries.len();
        entries.clear();
        count
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new(dirmover_core::config::DEFAULT_QUEUE_WARN_THRESHOLD)
    }
}

//! Domain error types
//!
//! Three families of failure exist in the pipeline:
//! - [`MonitorError`] - fatal to `Monitor::start()`
//! - [`MoveError`] - per-file, recovered by the worker
//! - [`LogWriteError`] - the audit trail itself could not be appended to

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::state::MonitorState;

/// Errors raised while starting or stopping a monitor
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The source directory is missing, not a directory, or unreadable
    #[error("Directory unavailable: {}: {source}", path.display())]
    DirectoryUnavailable {
        /// Directory that could not be watched
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: io::Error,
    },

    /// The OS watch mechanism could not be created or attached
    #[error("Watch error: {0}")]
    Watch(String),

    /// `start()` was called outside a Tokio runtime
    #[error("No Tokio runtime available to run the worker")]
    NoRuntime,

    /// Lifecycle operation attempted from the wrong state
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: MonitorState,
        /// The attempted target state
        to: MonitorState,
    },
}

/// Per-file failures produced by the mover
#[derive(Debug, Error)]
pub enum MoveError {
    /// The file never passed the readiness probe
    #[error("Timed out waiting for exclusive access to {} after {attempts} attempts", path.display())]
    AccessTimeout {
        /// File that stayed busy
        path: PathBuf,
        /// Number of probe attempts made
        attempts: u32,
    },

    /// The file could not be opened for a reason other than contention
    #[error("Cannot access {}: {source}", path.display())]
    Access {
        /// File that could not be opened
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: io::Error,
    },

    /// The rename itself failed after a successful probe
    #[error("Failed to move {} to {}: {source}", path.display(), destination.display())]
    Move {
        /// Source entry, still in place
        path: PathBuf,
        /// Intended destination
        destination: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: io::Error,
    },

    /// The path has no final component to reuse as the destination name
    #[error("Path has no file name: {}", .0.display())]
    InvalidName(PathBuf),

    /// Shutdown was requested while waiting for the file
    #[error("Cancelled")]
    Cancelled,
}

impl MoveError {
    /// Path of the file the error refers to, if any
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            MoveError::AccessTimeout { path, .. } => Some(path),
            MoveError::Access { path, .. } => Some(path),
            MoveError::Move { path, .. } => Some(path),
            MoveError::InvalidName(path) => Some(path),
            MoveError::Cancelled => None,
        }
    }

    /// Returns true when the error only reflects a shutdown request
    pub fn is_cancelled(&self) -> bool {
        matches!(self, MoveError::Cancelled)
    }
}

/// The audit trail could not be appended to
#[derive(Debug, Error)]
#[error("Failed to write audit log {}: {source}", path.display())]
pub struct LogWriteError {
    /// Log destination
    pub path: PathBuf,
    /// Underlying I/O failure
    #[source]
    pub source: io::Error,
}

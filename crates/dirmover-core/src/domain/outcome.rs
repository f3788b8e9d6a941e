//! `MoveOutcome` - tagged result of relocating one file
//!
//! Produced by the mover and consumed immediately by the audit log; never
//! persisted beyond the log line it becomes.

use std::path::PathBuf;

/// Result of processing one pending path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The file now lives at `destination`
    Moved {
        /// Name of the file, unchanged by the move
        file_name: String,
        /// Full destination path
        destination: PathBuf,
    },
    /// The file was left in the source directory
    Failed {
        /// Source path of the file
        path: PathBuf,
        /// Human-readable cause
        reason: String,
    },
}

impl MoveOutcome {
    /// Returns true if the file was relocated
    pub fn is_moved(&self) -> bool {
        matches!(self, MoveOutcome::Moved { .. })
    }

    /// Returns true if the file was left in place
    pub fn is_failed(&self) -> bool {
        matches!(self, MoveOutcome::Failed { .. })
    }
}

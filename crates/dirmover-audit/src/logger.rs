//! AuditLog - serialized append-only writer
//!
//! Every call formats one [`LogEntry`], then opens the destination in append
//! mode, writes the line, flushes and closes the file. No handle is kept
//! between calls, so the file may be rotated or inspected externally.
//!
//! The destination path lives inside the mutex: holding the lock is the only
//! way to reach the file, so lines from concurrent callers never interleave.
//! Unlike most dirmover components, write failures are returned to the
//! caller rather than swallowed.

use std::path::{Path, PathBuf};

use dirmover_core::{LogWriteError, MoveOutcome};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::entry::LogEntry;

/// Append-only audit trail for one monitor instance.
#[derive(Debug)]
pub struct AuditLog {
    destination: Mutex<PathBuf>,
}

impl AuditLog {
    /// Creates an `AuditLog` appending to `path`. The file is created on
    /// first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            destination: Mutex::new(path.into()),
        }
    }

    /// Record a successful relocation.
    pub async fn record_move(
        &self,
        file_name: &str,
        destination: &Path,
    ) -> Result<(), LogWriteError> {
        self.append(LogEntry::moved(file_name, destination)).await
    }

    /// Record a per-file failure.
    pub async fn record_error(&self, path: &Path, message: &str) -> Result<(), LogWriteError> {
        self.append(LogEntry::error(path, message)).await
    }

    /// Record a non-fatal condition such as a watcher fault.
    pub async fn record_warning(&self, message: &str) -> Result<(), LogWriteError> {
        self.append(LogEntry::warning(message)).await
    }

    /// Record the outcome of processing one file.
    pub async fn record(&self, outcome: &MoveOutcome) -> Result<(), LogWriteError> {
        match outcome {
            MoveOutcome::Moved {
                file_name,
                destination,
            } => self.record_move(file_name, destination).await,
            MoveOutcome::Failed { path, reason } => self.record_error(path, reason).await,
        }
    }

    /// Append one entry under the serialization lock.
    pub async fn append(&self, entry: LogEntry) -> Result<(), LogWriteError> {
        let path = self.destination.lock().await;
        let line = format!("{entry}\n");

        let write = async {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&*path)
                .await?;
            file.write_all(line.as_bytes()).await?;
            file.flush().await
        };

        write.await.map_err(|source| LogWriteError {
            path: path.clone(),
            source,
        })?;

        debug!(log = %path.display(), entry = %entry.message(), "Audit entry appended");
        Ok(())
    }
}

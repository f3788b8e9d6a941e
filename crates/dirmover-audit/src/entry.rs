//! LogEntry - one line of the audit trail

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Local};

/// Timestamp layout of every audit line.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// An immutable timestamped audit line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    timestamp: DateTime<Local>,
    message: String,
}

impl LogEntry {
    /// Stamp `message` with the current local time.
    pub fn now(message: impl Into<String>) -> Self {
        Self::at(Local::now(), message)
    }

    /// Build an entry with an explicit timestamp.
    pub fn at(timestamp: DateTime<Local>, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            message: message.into(),
        }
    }

    /// Confirmation that `file_name` was relocated to `destination`.
    pub fn moved(file_name: &str, destination: &Path) -> Self {
        Self::now(format!(
            "File {file_name} moved to {}",
            destination.display()
        ))
    }

    /// Failure while processing `path`.
    pub fn error(path: &Path, message: &str) -> Self {
        Self::now(format!(
            "Error: failed to process {}: {message}",
            path.display()
        ))
    }

    /// Non-fatal condition that does not concern a single file.
    pub fn warning(message: &str) -> Self {
        Self::now(format!("Warning: {message}"))
    }

    pub fn timestamp(&self) -> &DateTime<Local> {
        &self.timestamp
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.message
        )
    }
}

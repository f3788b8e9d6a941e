//! `PendingPath` - a filesystem entry believed to be newly created
//!
//! Carries no identity beyond its path value. Produced by the event source,
//! owned by the work queue until the worker dequeues it.

use std::ffi::OsStr;
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

/// Path of an entry awaiting relocation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PendingPath(PathBuf);

impl PendingPath {
    /// Wrap a path reported by the event source
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Borrow the underlying path
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Final path component, reused unchanged as the destination name
    #[must_use]
    pub fn file_name(&self) -> Option<&OsStr> {
        self.0.file_name()
    }

    /// Consume the wrapper and return the inner path
    #[must_use]
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl Display for PendingPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl AsRef<Path> for PendingPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl From<PathBuf> for PendingPath {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

impl From<&Path> for PendingPath {
    fn from(path: &Path) -> Self {
        Self(path.to_path_buf())
    }
}

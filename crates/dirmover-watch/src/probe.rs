//! Readiness probing
//!
//! A file is considered finished by its producer once it can be opened for
//! exclusive access. This is a heuristic, not a completion signal:
//!
//! - On Windows the probe opens with share mode 0, which fails while any
//!   other handle (reader or writer) is open.
//! - On Linux the probe opens read-only and asks for a write lease, which
//!   the kernel refuses while any other descriptor is open on the file.
//!   Where leases are unavailable (files owned by another user without
//!   `CAP_LEASE`, filesystems such as NFS) it falls back to `flock`.
//! - On other Unix systems only the non-blocking exclusive `flock` is
//!   available, which conflicts with producers that lock while writing.
//!
//! Contention is reported as "busy". Every other failure (missing file,
//! permission denied) is returned as an error for the mover to classify.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{instrument, trace};

/// Checks whether a file is ready to be moved
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    /// Returns `Ok(true)` when exclusive access was obtained, `Ok(false)`
    /// when another handle is in the way, and `Err` for any other failure.
    async fn probe(&self, path: &Path) -> io::Result<bool>;
}

/// Probe that attempts an exclusive open of the file
#[derive(Debug, Clone, Copy, Default)]
pub struct ExclusiveOpenProbe;

impl ExclusiveOpenProbe {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ReadinessProbe for ExclusiveOpenProbe {
    #[instrument(skip(self), fields(path = %path.display()))]
    async fn probe(&self, path: &Path) -> io::Result<bool> {
        let owned: PathBuf = path.to_path_buf();
        let ready = tokio::task::spawn_blocking(move || try_exclusive_open(&owned))
            .await
            .map_err(io::Error::other)??;
        trace!(ready, "Readiness probe finished");
        Ok(ready)
    }
}

#[cfg(target_os = "linux")]
fn try_exclusive_open(path: &Path) -> io::Result<bool> {
    let file = std::fs::File::open(path)?;
    match lease::try_write_lease(&file) {
        Err(err) if matches!(err.raw_os_error(), Some(libc::EACCES) | Some(libc::EINVAL)) => {
            // Not our file, or a filesystem without lease support.
            tracing::debug!(error = %err, "Write lease unavailable, using flock");
            try_flock(&file)
        }
        result => result,
    }
}

#[cfg(all(unix, not(target_os = "linux")))]
fn try_exclusive_open(path: &Path) -> io::Result<bool> {
    let file = std::fs::File::open(path)?;
    try_flock(&file)
}

/// Non-blocking exclusive advisory lock, released immediately
#[cfg(unix)]
fn try_flock(file: &std::fs::File) -> io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    let fd = file.as_raw_fd();

    // SAFETY: `fd` belongs to `file`, which outlives both calls.
    let rc = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
    if rc != 0 {
        let err = io::Error::last_os_error();
        return if err.kind() == io::ErrorKind::WouldBlock {
            Ok(false)
        } else {
            Err(err)
        };
    }

    // SAFETY: as above; the lock is also dropped when `file` closes.
    unsafe { libc::flock(fd, libc::LOCK_UN) };
    Ok(true)
}

/// Write leases: the kernel grants one only when no other descriptor,
/// reader or writer, is open on the file.
#[cfg(target_os = "linux")]
mod lease {
    use std::fs::File;
    use std::io;
    use std::os::unix::io::AsRawFd;

    /// Not exported by `libc` for most targets; identical on every Linux arch.
    const F_SETSIG: libc::c_int = 10;

    pub(super) fn try_write_lease(file: &File) -> io::Result<bool> {
        let fd = file.as_raw_fd();

        // A lease break is signalled to the holder. SIGURG is ignored by
        // default, so a break during the short hold cannot kill the process.
        // SAFETY: `fd` belongs to `file` for the duration of every call.
        if unsafe { libc::fcntl(fd, F_SETSIG, libc::SIGURG) } != 0 {
            return Err(io::Error::last_os_error());
        }

        // SAFETY: as above.
        if unsafe { libc::fcntl(fd, libc::F_SETLEASE, libc::F_WRLCK) } != 0 {
            let err = io::Error::last_os_error();
            return match err.raw_os_error() {
                Some(libc::EAGAIN) | Some(libc::EBUSY) => Ok(false),
                _ => Err(err),
            };
        }

        // SAFETY: as above; closing `file` also drops the lease.
        unsafe { libc::fcntl(fd, libc::F_SETLEASE, libc::F_UNLCK) };
        Ok(true)
    }
}

#[cfg(windows)]
fn try_exclusive_open(path: &Path) -> io::Result<bool> {
    use std::os::windows::fs::OpenOptionsExt;

    const ERROR_SHARING_VIOLATION: i32 = 32;
    const ERROR_LOCK_VIOLATION: i32 = 33;

    match std::fs::OpenOptions::new()
        .read(true)
        .share_mode(0)
        .open(path)
    {
        Ok(_) => Ok(true),
        Err(err)
            if matches!(
                err.raw_os_error(),
                Some(ERROR_SHARING_VIOLATION) | Some(ERROR_LOCK_VIOLATION)
            ) =>
        {
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_closed_file_is_ready() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("done.txt");
        std::fs::write(&path, b"complete").unwrap();

        assert!(ExclusiveOpenProbe::new().probe(&path).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = ExclusiveOpenProbe::new()
            .probe(&dir.path().join("missing.txt"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_locked_file_is_busy() {
        use std::os::unix::io::AsRawFd;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("writing.txt");
        let writer = std::fs::File::create(&path).unwrap();
        let rc = unsafe { libc::flock(writer.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        assert_eq!(rc, 0);

        assert!(!ExclusiveOpenProbe::new().probe(&path).await.unwrap());

        drop(writer);
        assert!(ExclusiveOpenProbe::new().probe(&path).await.unwrap());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_open_writer_without_lock_is_busy() {
        use std::io::Write;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("upload.part");
        let mut writer = std::fs::File::create(&path).unwrap();
        writer.write_all(b"first chunk").unwrap();

        assert!(!ExclusiveOpenProbe::new().probe(&path).await.unwrap());

        drop(writer);
        assert!(ExclusiveOpenProbe::new().probe(&path).await.unwrap());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_open_reader_is_busy() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shared.txt");
        std::fs::write(&path, b"data").unwrap();
        let reader = std::fs::File::open(&path).unwrap();

        assert!(!ExclusiveOpenProbe::new().probe(&path).await.unwrap());
        drop(reader);
    }
}

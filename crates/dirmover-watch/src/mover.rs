//! Readiness wait and relocation of a single file
//!
//! [`Mover::wait_and_move`] probes the file up to `attempts` times,
//! `interval` apart, and only then renames it into the destination
//! directory under its original name. The rename is a single filesystem
//! operation and never replaces an existing destination entry. A failed
//! rename leaves the file in the source directory and is not retried.
//!
//! Logging the outcome is the caller's job.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use dirmover_core::{MonitorConfig, MoveError, MoveOutcome, PendingPath};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::probe::ReadinessProbe;

/// Relocates ready files into one destination directory
#[derive(Clone)]
pub struct Mover {
    destination_dir: PathBuf,
    probe: Arc<dyn ReadinessProbe>,
    attempts: u32,
    interval: Duration,
}

impl std::fmt::Debug for Mover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mover")
            .field("destination_dir", &self.destination_dir)
            .field("attempts", &self.attempts)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl Mover {
    /// Creates a mover with explicit retry settings
    pub fn new(
        destination_dir: impl Into<PathBuf>,
        probe: Arc<dyn ReadinessProbe>,
        attempts: u32,
        interval: Duration,
    ) -> Self {
        Self {
            destination_dir: destination_dir.into(),
            probe,
            attempts,
            interval,
        }
    }

    /// Creates a mover using the destination and retry settings of `config`
    pub fn from_config(config: &MonitorConfig, probe: Arc<dyn ReadinessProbe>) -> Self {
        Self::new(
            &config.destination_dir,
            probe,
            config.probe_attempts,
            config.probe_interval,
        )
    }

    /// Destination path for a file with the same name as `path`
    pub fn destination_for(&self, path: &Path) -> Result<PathBuf, MoveError> {
        let name = path
            .file_name()
            .ok_or_else(|| MoveError::InvalidName(path.to_path_buf()))?;
        Ok(self.destination_dir.join(name))
    }

    /// Waits until `path` passes the readiness probe, then moves it
    ///
    /// Returns [`MoveOutcome::Moved`] on success. `cancel` aborts the wait
    /// between probe attempts with [`MoveError::Cancelled`].
    #[instrument(skip(self, cancel), fields(path = %path))]
    pub async fn wait_and_move(
        &self,
        path: &PendingPath,
        cancel: &CancellationToken,
    ) -> Result<MoveOutcome, MoveError> {
        self.wait_ready(path.as_path(), cancel).await?;
        self.relocate(path.as_path()).await
    }

    /// Probes `path` until it is ready or the attempts are used up
    pub async fn wait_ready(&self, path: &Path, cancel: &CancellationToken) -> Result<(), MoveError> {
        for attempt in 1..=self.attempts {
            if cancel.is_cancelled() {
                return Err(MoveError::Cancelled);
            }

            match self.probe.probe(path).await {
                Ok(true) => {
                    debug!(attempt, "File is ready");
                    return Ok(());
                }
                Ok(false) => debug!(attempt, "File is still in use"),
                Err(source) if source.kind() == io::ErrorKind::PermissionDenied => {
                    return Err(MoveError::Access {
                        path: path.to_path_buf(),
                        source,
                    })
                }
                // Missing or being replaced: counts as a failed attempt.
                Err(err) => debug!(attempt, error = %err, "File not accessible yet"),
            }

            if attempt < self.attempts {
                tokio::select! {
                    _ = tokio::time::sleep(self.interval) => {}
                    _ = cancel.cancelled() => return Err(MoveError::Cancelled),
                }
            }
        }

        Err(MoveError::AccessTimeout {
            path: path.to_path_buf(),
            attempts: self.attempts,
        })
    }

    /// Renames `path` into the destination directory without waiting
    pub async fn relocate(&self, path: &Path) -> Result<MoveOutcome, MoveError> {
        let destination = self.destination_for(path)?;
        let file_name = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let from = path.to_path_buf();
        let to = destination.clone();
        tokio::task::spawn_blocking(move || rename_no_replace(&from, &to))
            .await
            .map_err(io::Error::other)
            .and_then(|r| r)
            .map_err(|source| MoveError::Move {
                path: path.to_path_buf(),
                destination: destination.clone(),
                source,
            })?;

        debug!(destination = %destination.display(), "File moved");
        Ok(MoveOutcome::Moved {
            file_name,
            destination,
        })
    }
}

/// Renames `from` to `to`, failing with `AlreadyExists` instead of replacing
fn rename_no_replace(from: &Path, to: &Path) -> io::Result<()> {
    #[cfg(target_os = "linux")]
    {
        match linux::renameat2_noreplace(from, to) {
            // Filesystem or kernel without RENAME_NOREPLACE support.
            Err(err) if matches!(err.raw_os_error(), Some(libc::EINVAL) | Some(libc::ENOSYS)) => {}
            result => return result,
        }
    }

    if to.symlink_metadata().is_ok() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("destination already exists: {}", to.display()),
        ));
    }
    std::fs::rename(from, to)
}

#[cfg(target_os = "linux")]
mod linux {
    use std::ffi::CString;
    use std::io;
    use std::os::unix::ffi::OsStrExt;
    use std::path::Path;

    const RENAME_NOREPLACE: libc::c_uint = 1;

    fn c_path(path: &Path) -> io::Result<CString> {
        CString::new(path.as_os_str().as_bytes())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
    }

    pub(super) fn renameat2_noreplace(from: &Path, to: &Path) -> io::Result<()> {
        let from = c_path(from)?;
        let to = c_path(to)?;
        // SAFETY: both pointers come from live NUL-terminated CStrings.
        let rc = unsafe {
            libc::syscall(
                libc::SYS_renameat2,
                libc::AT_FDCWD,
                from.as_ptr(),
                libc::AT_FDCWD,
                to.as_ptr(),
                RENAME_NOREPLACE,
            )
        };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::probe::ExclusiveOpenProbe;

    /// Busy for the first `busy_for` probes, ready afterwards
    struct CountingProbe {
        busy_for: u32,
        calls: AtomicU32,
    }

    impl CountingProbe {
        fn new(busy_for: u32) -> Arc<Self> {
            Arc::new(Self {
                busy_for,
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ReadinessProbe for CountingProbe {
        async fn probe(&self, _path: &Path) -> io::Result<bool> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(n >= self.busy_for)
        }
    }

    struct Setup {
        _root: TempDir,
        source: PathBuf,
        destination: PathBuf,
    }

    fn setup() -> Setup {
        let root = TempDir::new().unwrap();
        let source = root.path().join("in");
        let destination = root.path().join("out");
        std::fs::create_dir(&source).unwrap();
        std::fs::create_dir(&destination).unwrap();
        Setup {
            _root: root,
            source,
            destination,
        }
    }

    #[tokio::test]
    async fn test_moves_ready_file() {
        let s = setup();
        let src = s.source.join("report.csv");
        std::fs::write(&src, b"a,b").unwrap();
        let mover = Mover::new(
            &s.destination,
            Arc::new(ExclusiveOpenProbe::new()),
            10,
            Duration::from_millis(10),
        );

        let outcome = mover
            .wait_and_move(&PendingPath::new(&src), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            MoveOutcome::Moved {
                file_name: "report.csv".into(),
                destination: s.destination.join("report.csv"),
            }
        );
        assert!(!src.exists());
        assert_eq!(std::fs::read(s.destination.join("report.csv")).unwrap(), b"a,b");
    }

    #[tokio::test]
    async fn test_retries_until_ready() {
        let s = setup();
        let src = s.source.join("slow.bin");
        std::fs::write(&src, b"x").unwrap();
        let probe = CountingProbe::new(2);
        let mover = Mover::new(&s.destination, probe.clone(), 10, Duration::from_millis(10));

        mover
            .wait_and_move(&PendingPath::new(&src), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(probe.calls(), 3);
        assert!(s.destination.join("slow.bin").exists());
    }

    #[tokio::test]
    async fn test_timeout_after_all_attempts() {
        let s = setup();
        let src = s.source.join("stuck.bin");
        std::fs::write(&src, b"x").unwrap();
        let probe = CountingProbe::new(u32::MAX);
        let interval = Duration::from_millis(20);
        let mover = Mover::new(&s.destination, probe.clone(), 10, interval);

        let started = Instant::now();
        let err = mover
            .wait_and_move(&PendingPath::new(&src), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, MoveError::AccessTimeout { attempts: 10, .. }));
        assert_eq!(probe.calls(), 10);
        assert!(started.elapsed() >= interval * 9);
        assert!(src.exists());
        assert!(!s.destination.join("stuck.bin").exists());
    }

    /// Fails every attempt with the given error kind
    struct FailingProbe {
        kind: io::ErrorKind,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ReadinessProbe for FailingProbe {
        async fn probe(&self, _path: &Path) -> io::Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(io::Error::from(self.kind))
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_retried_until_timeout() {
        let s = setup();
        let interval = Duration::from_millis(10);
        let mover = Mover::new(
            &s.destination,
            Arc::new(ExclusiveOpenProbe::new()),
            10,
            interval,
        );

        let started = Instant::now();
        let err = mover
            .wait_and_move(
                &PendingPath::new(s.source.join("gone.txt")),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, MoveError::AccessTimeout { attempts: 10, .. }));
        assert!(started.elapsed() >= interval * 9);
    }

    #[tokio::test]
    async fn test_transient_errors_use_every_attempt() {
        let s = setup();
        let probe = Arc::new(FailingProbe {
            kind: io::ErrorKind::NotFound,
            calls: AtomicU32::new(0),
        });
        let mover = Mover::new(&s.destination, probe.clone(), 10, Duration::from_millis(1));

        let err = mover
            .wait_ready(&s.source.join("replaced.txt"), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, MoveError::AccessTimeout { attempts: 10, .. }));
        assert_eq!(probe.calls.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_permission_denied_fails_immediately() {
        let s = setup();
        let probe = Arc::new(FailingProbe {
            kind: io::ErrorKind::PermissionDenied,
            calls: AtomicU32::new(0),
        });
        let mover = Mover::new(&s.destination, probe.clone(), 10, Duration::from_millis(200));

        let started = Instant::now();
        let err = mover
            .wait_ready(&s.source.join("secret.txt"), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, MoveError::Access { .. }));
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_existing_destination_is_not_replaced() {
        let s = setup();
        let src = s.source.join("dup.txt");
        std::fs::write(&src, b"new").unwrap();
        std::fs::write(s.destination.join("dup.txt"), b"old").unwrap();
        let mover = Mover::new(
            &s.destination,
            Arc::new(ExclusiveOpenProbe::new()),
            1,
            Duration::from_millis(10),
        );

        let err = mover.relocate(&src).await.unwrap_err();

        match err {
            MoveError::Move { source, .. } => {
                assert_eq!(source.kind(), io::ErrorKind::AlreadyExists)
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(std::fs::read(&src).unwrap(), b"new");
        assert_eq!(std::fs::read(s.destination.join("dup.txt")).unwrap(), b"old");
    }

    #[tokio::test]
    async fn test_missing_destination_directory_fails() {
        let s = setup();
        let src = s.source.join("a.txt");
        std::fs::write(&src, b"x").unwrap();
        let mover = Mover::new(
            s.destination.join("missing"),
            Arc::new(ExclusiveOpenProbe::new()),
            1,
            Duration::from_millis(10),
        );

        let err = mover.relocate(&src).await.unwrap_err();
        assert!(matches!(err, MoveError::Move { .. }));
        assert!(src.exists());
    }

    #[tokio::test]
    async fn test_cancel_interrupts_wait() {
        let s = setup();
        let src = s.source.join("busy.bin");
        std::fs::write(&src, b"x").unwrap();
        let mover = Mover::new(
            &s.destination,
            CountingProbe::new(u32::MAX),
            1000,
            Duration::from_millis(50),
        );
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(120)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = mover
            .wait_and_move(&PendingPath::new(&src), &cancel)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(src.exists());
    }

    #[test]
    fn test_destination_keeps_file_name() {
        let mover = Mover::new(
            "/out",
            Arc::new(ExclusiveOpenProbe::new()),
            1,
            Duration::from_millis(1),
        );
        assert_eq!(
            mover.destination_for(Path::new("/in/report.csv")).unwrap(),
            PathBuf::from("/out/report.csv")
        );
        assert!(matches!(
            mover.destination_for(Path::new("/")),
            Err(MoveError::InvalidName(_))
        ));
    }
}

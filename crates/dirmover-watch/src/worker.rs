//! Background consumer loop
//!
//! A single [`Worker`] drains the [`WorkQueue`] one path at a time: wait for
//! readiness, move, record the outcome. A failing file is logged and skipped;
//! it never stops the loop. Files are handled strictly in dequeue order, so a
//! file that needs many probe attempts delays everything queued behind it.
//!
//! Two tokens control shutdown:
//! - `shutdown` aborts promptly, abandoning whatever is still queued
//! - `drain` lets the worker empty the queue first and then exit

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dirmover_audit::AuditLog;
use dirmover_core::{LogWriteError, MoveError, MoveOutcome, PendingPath};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::mover::Mover;
use crate::queue::WorkQueue;
use crate::source::FaultReceiver;

/// Counters shared between the worker and its owner
#[derive(Debug, Default)]
pub struct WorkerStats {
    moved: AtomicU64,
    failed: AtomicU64,
}

impl WorkerStats {
    /// Files relocated so far
    pub fn moved(&self) -> u64 {
        self.moved.load(Ordering::Relaxed)
    }

    /// Files left in place after an error
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Result of handling one dequeued path
enum Step {
    Done,
    Cancelled,
}

/// Single consumer of the work queue
pub struct Worker {
    queue: Arc<WorkQueue>,
    mover: Mover,
    audit: Arc<AuditLog>,
    faults: Option<FaultReceiver>,
    idle_interval: Duration,
    shutdown: CancellationToken,
    drain: CancellationToken,
    stats: Arc<WorkerStats>,
}

impl Worker {
    /// Creates a worker with fresh cancellation tokens and no fault channel
    pub fn new(
        queue: Arc<WorkQueue>,
        mover: Mover,
        audit: Arc<AuditLog>,
        idle_interval: Duration,
    ) -> Self {
        Self {
            queue,
            mover,
            audit,
            faults: None,
            idle_interval,
            shutdown: CancellationToken::new(),
            drain: CancellationToken::new(),
            stats: Arc::new(WorkerStats::default()),
        }
    }

    /// Records watcher faults received on `faults` as audit warnings
    pub fn with_faults(mut self, faults: FaultReceiver) -> Self {
        self.faults = Some(faults);
        self
    }

    /// Token that stops the worker without draining the queue
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Token that makes the worker exit once the queue is empty
    pub fn with_drain(mut self, drain: CancellationToken) -> Self {
        self.drain = drain;
        self
    }

    /// Shared counters, readable while the worker runs
    pub fn stats(&self) -> Arc<WorkerStats> {
        Arc::clone(&self.stats)
    }

    /// Runs until `shutdown` fires, or until `drain` fires and the queue is
    /// empty
    pub async fn run(mut self) {
        info!(idle_ms = self.idle_interval.as_millis() as u64, "Worker started");

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            self.report_faults().await;

            match self.queue.try_dequeue() {
                Some(path) => match self.process(&path).await {
                    Ok(Step::Done) => {}
                    Ok(Step::Cancelled) => break,
                    Err(err) => {
                        // The audit trail itself is failing; there is no
                        // other channel to report through.
                        error!(path = %path, error = %err, "Could not record outcome");
                    }
                },
                None => {
                    if self.drain.is_cancelled() {
                        debug!("Queue drained");
                        break;
                    }
                    tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        _ = self.drain.cancelled() => {}
                        _ = tokio::time::sleep(self.idle_interval) => {}
                    }
                }
            }
        }

        info!(
            moved = self.stats.moved(),
            failed = self.stats.failed(),
            queued = self.queue.len(),
            "Worker stopped"
        );
    }

    /// Processes one path and records the outcome
    async fn process(&self, path: &PendingPath) -> Result<Step, LogWriteError> {
        let outcome = match self.mover.wait_and_move(path, &self.shutdown).await {
            Ok(outcome) => {
                self.stats.moved.fetch_add(1, Ordering::Relaxed);
                info!(path = %path, "File moved");
                outcome
            }
            Err(MoveError::Cancelled) => {
                debug!(path = %path, "Processing cancelled");
                return Ok(Step::Cancelled);
            }
            Err(err) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                warn!(path = %path, error = %err, "File left in source directory");
                MoveOutcome::Failed {
                    path: path.as_path().to_path_buf(),
                    reason: err.to_string(),
                }
            }
        };

        self.audit.record(&outcome).await?;
        Ok(Step::Done)
    }

    /// Writes every pending watcher fault to the audit trail
    async fn report_faults(&mut self) {
        let Some(faults) = self.faults.as_mut() else {
            return;
        };

        let mut disconnected = false;
        loop {
            match faults.try_recv() {
                Ok(message) => {
                    if let Err(err) = self.audit.record_warning(&message).await {
                        error!(error = %err, fault = %message, "Could not record watcher fault");
                    }
                }
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }

        if disconnected {
            self.faults = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::path::{Path, PathBuf};
    use std::time::Instant;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::probe::{ExclusiveOpenProbe, ReadinessProbe};

    struct NeverReady;

    #[async_trait]
    impl ReadinessProbe for NeverReady {
        async fn probe(&self, _path: &Path) -> io::Result<bool> {
            Ok(false)
        }
    }

    struct Setup {
        root: TempDir,
        source: PathBuf,
        destination: PathBuf,
    }

    impl Setup {
        fn new() -> Self {
            let root = TempDir::new().unwrap();
            let source = root.path().join("in");
            let destination = root.path().join("out");
            std::fs::create_dir(&source).unwrap();
            std::fs::create_dir(&destination).unwrap();
            Self {
                root,
                source,
                destination,
            }
        }

        fn log_path(&self) -> PathBuf {
            self.root.path().join("moves.log")
        }

        fn log_lines(&self) -> Vec<String> {
            std::fs::read_to_string(self.log_path())
                .unwrap_or_default()
                .lines()
                .map(str::to_owned)
                .collect()
        }

        fn worker(&self, queue: &Arc<WorkQueue>, probe: Arc<dyn ReadinessProbe>) -> Worker {
            let mover = Mover::new(&self.destination, probe, 3, Duration::from_millis(10));
            Worker::new(
                Arc::clone(queue),
                mover,
                Arc::new(AuditLog::new(self.log_path())),
                Duration::from_millis(10),
            )
        }
    }

    #[tokio::test]
    async fn test_drain_processes_everything_then_exits() {
        let s = Setup::new();
        let queue = Arc::new(WorkQueue::new(0));
        for name in ["a.txt", "b.txt"] {
            let p = s.source.join(name);
            std::fs::write(&p, name).unwrap();
            queue.enqueue(PendingPath::new(p));
        }

        let drain = CancellationToken::new();
        drain.cancel();
        let worker = s
            .worker(&queue, Arc::new(ExclusiveOpenProbe::new()))
            .with_drain(drain);
        let stats = worker.stats();
        worker.run().await;

        assert_eq!(stats.moved(), 2);
        assert_eq!(stats.failed(), 0);
        assert!(queue.is_empty());
        assert_eq!(s.log_lines().len(), 2);
    }

    #[tokio::test]
    async fn test_failures_are_logged_and_counted() {
        let s = Setup::new();
        let queue = Arc::new(WorkQueue::new(0));
        let p = s.source.join("stuck.bin");
        std::fs::write(&p, b"x").unwrap();
        queue.enqueue(PendingPath::new(&p));

        let drain = CancellationToken::new();
        drain.cancel();
        let worker = s.worker(&queue, Arc::new(NeverReady)).with_drain(drain);
        let stats = worker.stats();
        worker.run().await;

        assert_eq!(stats.failed(), 1);
        let lines = s.log_lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("Error: failed to process"));
        assert!(lines[0].contains("after 3 attempts"));
        assert!(p.exists());
    }

    #[tokio::test]
    async fn test_faults_become_warnings() {
        let s = Setup::new();
        let queue = Arc::new(WorkQueue::new(0));
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send("file watcher error: overflow".to_string()).unwrap();

        let drain = CancellationToken::new();
        drain.cancel();
        s.worker(&queue, Arc::new(ExclusiveOpenProbe::new()))
            .with_faults(rx)
            .with_drain(drain)
            .run()
            .await;

        let lines = s.log_lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with(" - Warning: file watcher error: overflow"));
    }

    #[tokio::test]
    async fn test_shutdown_abandons_queue_promptly() {
        let s = Setup::new();
        let queue = Arc::new(WorkQueue::new(0));
        for name in ["busy1", "busy2", "busy3"] {
            let p = s.source.join(name);
            std::fs::write(&p, b"x").unwrap();
            queue.enqueue(PendingPath::new(p));
        }

        let shutdown = CancellationToken::new();
        let mover = Mover::new(
            &s.destination,
            Arc::new(NeverReady),
            1000,
            Duration::from_millis(50),
        );
        let worker = Worker::new(
            Arc::clone(&queue),
            mover,
            Arc::new(AuditLog::new(s.log_path())),
            Duration::from_millis(100),
        )
        .with_shutdown(shutdown.clone());
        let handle = tokio::spawn(worker.run());

        tokio::time::sleep(Duration::from_millis(120)).await;
        let started = Instant::now();
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("worker did not stop")
            .unwrap();

        assert!(started.elapsed() < Duration::from_millis(500));
        // The in-flight file was cancelled, not failed.
        assert!(s.log_lines().is_empty());
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn test_idle_worker_stops_on_shutdown() {
        let s = Setup::new();
        let queue = Arc::new(WorkQueue::new(0));
        let shutdown = CancellationToken::new();
        let worker = s
            .worker(&queue, Arc::new(ExclusiveOpenProbe::new()))
            .with_shutdown(shutdown.clone());
        let handle = tokio::spawn(worker.run());

        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_log_failure_does_not_stop_worker() {
        let s = Setup::new();
        let queue = Arc::new(WorkQueue::new(0));
        for name in ["a.txt", "b.txt"] {
            let p = s.source.join(name);
            std::fs::write(&p, name).unwrap();
            queue.enqueue(PendingPath::new(p));
        }

        let drain = CancellationToken::new();
        drain.cancel();
        let mover = Mover::new(
            &s.destination,
            Arc::new(ExclusiveOpenProbe::new()),
            3,
            Duration::from_millis(10),
        );
        let unwritable = s.root.path().join("missing").join("moves.log");
        let worker = Worker::new(
            Arc::clone(&queue),
            mover,
            Arc::new(AuditLog::new(unwritable)),
            Duration::from_millis(10),
        )
        .with_drain(drain);
        let stats = worker.stats();
        worker.run().await;

        assert_eq!(stats.moved(), 2);
        assert!(s.destination.join("a.txt").exists());
        assert!(s.destination.join("b.txt").exists());
    }
}

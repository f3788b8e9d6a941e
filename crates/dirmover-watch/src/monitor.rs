//! Monitor - composition root of the relocation pipeline
//!
//! Owns the event source, work queue, worker task and audit log for one
//! source/destination pair and exposes a one-shot `start()` / `stop()`
//! lifecycle:
//!
//! ```text
//! Created ──start()──▶ Running ──stop()──▶ Stopped
//!    └──────────────stop()──────────────────▲
//! ```
//!
//! `stop()` is idempotent. By default it abandons queued files; with
//! `drain_on_stop` it waits for the worker to process them first.

use std::sync::Arc;

use anyhow::{Context, Result};
use dirmover_audit::AuditLog;
use dirmover_core::{MonitorConfig, MonitorError, MonitorState};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::mover::Mover;
use crate::probe::{ExclusiveOpenProbe, ReadinessProbe};
use crate::queue::WorkQueue;
use crate::source::EventSource;
use crate::worker::{Worker, WorkerStats};

/// Snapshot of monitor activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MonitorStats {
    /// Files relocated
    pub moved: u64,
    /// Files left in the source directory after an error
    pub failed: u64,
    /// Paths waiting in the queue
    pub queued: usize,
}

/// Watches one directory and relocates new files into another
pub struct Monitor {
    config: MonitorConfig,
    state: MonitorState,
    queue: Arc<WorkQueue>,
    audit: Arc<AuditLog>,
    probe: Arc<dyn ReadinessProbe>,
    source: Option<EventSource>,
    worker: Option<JoinHandle<()>>,
    stats: Arc<WorkerStats>,
    shutdown: CancellationToken,
    drain: CancellationToken,
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl Monitor {
    /// Creates a monitor in the `Created` state using the exclusive-open probe
    pub fn new(config: MonitorConfig) -> Self {
        Self::with_probe(config, Arc::new(ExclusiveOpenProbe::new()))
    }

    /// Creates a monitor with a custom readiness probe
    pub fn with_probe(config: MonitorConfig, probe: Arc<dyn ReadinessProbe>) -> Self {
        let queue = Arc::new(WorkQueue::new(config.queue_warn_threshold));
        let audit = Arc::new(AuditLog::new(&config.log_file));
        Self {
            config,
            state: MonitorState::Created,
            queue,
            audit,
            probe,
            source: None,
            worker: None,
            stats: Arc::new(WorkerStats::default()),
            shutdown: CancellationToken::new(),
            drain: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn stats(&self) -> MonitorStats {
        MonitorStats {
            moved: self.stats.moved(),
            failed: self.stats.failed(),
            queued: self.queue.len(),
        }
    }

    /// Subscribes to the source directory and launches the worker
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// - [`MonitorError::InvalidState`] unless the monitor is `Created`
    /// - [`MonitorError::NoRuntime`] outside a Tokio runtime; nothing is
    ///   subscribed and the monitor stays `Created`
    /// - [`MonitorError::DirectoryUnavailable`] if the source directory
    ///   cannot be watched; the monitor stays `Created`
    pub fn start(&mut self) -> Result<(), MonitorError> {
        if !self.state.can_transition_to(MonitorState::Running) {
            return Err(MonitorError::InvalidState {
                from: self.state,
                to: MonitorState::Running,
            });
        }

        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| MonitorError::NoRuntime)?;

        let (fault_tx, fault_rx) = mpsc::unbounded_channel();
        let source = EventSource::subscribe(
            &self.config.source_dir,
            Arc::clone(&self.queue),
            fault_tx,
        )?;

        let mover = Mover::from_config(&self.config, Arc::clone(&self.probe));
        let worker = Worker::new(
            Arc::clone(&self.queue),
            mover,
            Arc::clone(&self.audit),
            self.config.idle_interval,
        )
        .with_faults(fault_rx)
        .with_shutdown(self.shutdown.clone())
        .with_drain(self.drain.clone());
        self.stats = worker.stats();

        self.worker = Some(runtime.spawn(worker.run()));
        self.source = Some(source);
        self.state = MonitorState::Running;

        info!(
            source = %self.config.source_dir.display(),
            destination = %self.config.destination_dir.display(),
            log = %self.config.log_file.display(),
            "Monitor started"
        );
        Ok(())
    }

    /// Stops watching and ends the worker
    ///
    /// Safe to call any number of times. New events stop being queued before
    /// the worker is told to finish.
    pub async fn stop(&mut self) -> Result<()> {
        match self.state {
            MonitorState::Stopped => {
                debug!("Monitor already stopped");
                return Ok(());
            }
            MonitorState::Created => {
                self.state = MonitorState::Stopped;
                return Ok(());
            }
            MonitorState::Running => {}
        }

        if let Some(source) = self.source.take() {
            source.close();
        }

        if self.config.drain_on_stop {
            info!(queued = self.queue.len(), "Draining queue before stopping");
            self.drain.cancel();
        } else {
            self.shutdown.cancel();
        }

        let joined = match self.worker.take() {
            Some(handle) => handle.await.context("Worker task failed"),
            None => Ok(()),
        };
        self.shutdown.cancel();
        self.state = MonitorState::Stopped;

        let abandoned = self.queue.clear();
        if abandoned > 0 {
            warn!(abandoned, "Queued files dropped on stop");
        }

        info!(
            moved = self.stats.moved(),
            failed = self.stats.failed(),
            "Monitor stopped"
        );
        joined
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

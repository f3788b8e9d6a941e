//! dirmover Daemon - Background relocation service
//!
//! Watches a source directory, waits for each new file to be released by its
//! producer, moves it into a destination directory and records every move or
//! failure in a plain-text audit log.
//!
//! All settings come from command-line flags or `DIRMOVER_*` environment
//! variables. The daemon runs until SIGINT or SIGTERM.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use dirmover_core::{MonitorConfig, MonitorConfigBuilder};
use dirmover_watch::Monitor;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Command-line arguments
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "dirmoverd",
    version,
    about = "Move newly created files from one directory to another"
)]
struct Args {
    /// Directory to watch for new files
    #[arg(long, env = "DIRMOVER_SOURCE")]
    source: PathBuf,

    /// Directory new files are moved into
    #[arg(long, env = "DIRMOVER_DESTINATION")]
    destination: PathBuf,

    /// Audit log file (appended to)
    #[arg(long, env = "DIRMOVER_LOG_FILE")]
    log_file: PathBuf,

    /// Readiness probe attempts per file
    #[arg(long, env = "DIRMOVER_PROBE_ATTEMPTS", default_value_t = 10)]
    probe_attempts: u32,

    /// Milliseconds between readiness probe attempts
    #[arg(long, env = "DIRMOVER_PROBE_INTERVAL_MS", default_value_t = 100)]
    probe_interval_ms: u64,

    /// Milliseconds the worker sleeps when there is nothing to do
    #[arg(long, env = "DIRMOVER_IDLE_INTERVAL_MS", default_value_t = 100)]
    idle_interval_ms: u64,

    /// Process already-queued files before exiting
    #[arg(long, env = "DIRMOVER_DRAIN_ON_STOP")]
    drain_on_stop: bool,

    /// Queue depth that triggers a backlog warning
    #[arg(long, env = "DIRMOVER_QUEUE_WARN_THRESHOLD", default_value_t = 1000)]
    queue_warn_threshold: usize,

    /// Diagnostic log level when RUST_LOG is not set
    #[arg(long, env = "DIRMOVER_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn to_config(&self) -> MonitorConfig {
        MonitorConfigBuilder::new(&self.source, &self.destination, &self.log_file)
            .probe_attempts(self.probe_attempts)
            .probe_interval(Duration::from_millis(self.probe_interval_ms))
            .idle_interval(Duration::from_millis(self.idle_interval_ms))
            .drain_on_stop(self.drain_on_stop)
            .queue_warn_threshold(self.queue_warn_threshold)
            .build()
    }
}

// ============================================================================
// Shutdown
// ============================================================================

/// Waits for SIGINT or SIGTERM and returns the signal name
#[cfg(unix)]
async fn wait_for_signal() -> Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("Failed to listen for SIGINT")?;
            Ok("SIGINT")
        }
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    Ok("Ctrl+C")
}

/// Keeps `monitor` running until a termination signal arrives or `shutdown`
/// is cancelled, then stops it. The monitor is stopped even when the signal
/// handlers could not be installed.
async fn stop_on_signal(monitor: &mut Monitor, shutdown: CancellationToken) -> Result<()> {
    let trigger = tokio::select! {
        signal = wait_for_signal() => signal.map(Some),
        _ = shutdown.cancelled() => Ok(None),
    };

    match &trigger {
        Ok(Some(signal)) => info!(signal = *signal, "Termination signal received"),
        Ok(None) => info!("Shutdown requested"),
        Err(e) => error!(error = %e, "Signal handling failed"),
    }

    info!(
        drain = monitor.config().drain_on_stop,
        queued = monitor.stats().queued,
        "Stopping monitor"
    );
    monitor.stop().await?;
    trigger.map(|_| ())
}

// ============================================================================
// Main entry point
// ============================================================================

async fn run(config: MonitorConfig, shutdown: CancellationToken) -> Result<()> {
    let errors = config.validate();
    if !errors.is_empty() {
        for err in &errors {
            error!(field = %err.field, "{}", err.message);
        }
        anyhow::bail!("invalid configuration ({} error(s))", errors.len());
    }

    let mut monitor = Monitor::new(config);
    monitor.start().context("Failed to start monitor")?;

    stop_on_signal(&mut monitor, shutdown).await?;

    let stats = monitor.stats();
    info!(moved = stats.moved, failed = stats.failed, "Final statistics");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();

    info!("dirmover daemon starting (dirmoverd)");

    // Only signals end the daemon; the token is never cancelled here.
    let result = run(args.to_config(), CancellationToken::new()).await;

    match &result {
        Ok(()) => info!("dirmover daemon shut down gracefully"),
        Err(e) => error!(error = %e, "dirmover daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================

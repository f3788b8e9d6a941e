//! Configuration module for dirmover.
//!
//! [`MonitorConfig`] carries the three construction parameters of a monitor
//! (source directory, destination directory, audit log file) plus the timing
//! tunables of the pipeline. Defaults reproduce the historical behaviour:
//! ten readiness probes 100 ms apart and a 100 ms idle poll.

use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// MonitorConfig
// ---------------------------------------------------------------------------

/// Default number of readiness probe attempts per file.
pub const DEFAULT_PROBE_ATTEMPTS: u32 = 10;

/// Default delay between readiness probe attempts.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_millis(100);

/// Default worker sleep when the queue is empty.
pub const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_millis(100);

/// Default queue depth above which a warning is emitted.
pub const DEFAULT_QUEUE_WARN_THRESHOLD: usize = 1000;

/// Settings for one source/destination pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Directory watched for newly created files (non-recursive).
    pub source_dir: PathBuf,
    /// Directory files are moved into.
    pub destination_dir: PathBuf,
    /// Append destination for audit lines.
    pub log_file: PathBuf,
    /// Readiness probe attempts before giving up on a file.
    pub probe_attempts: u32,
    /// Delay between readiness probe attempts.
    pub probe_interval: Duration,
    /// Worker sleep when the queue is empty.
    pub idle_interval: Duration,
    /// Process already-queued files before `stop()` returns.
    pub drain_on_stop: bool,
    /// Queue depth that triggers a backlog warning; `0` disables it.
    pub queue_warn_threshold: usize,
}

impl MonitorConfig {
    /// Create a configuration with default tunables.
    pub fn new(
        source_dir: impl Into<PathBuf>,
        destination_dir: impl Into<PathBuf>,
        log_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source_dir: source_dir.into(),
            destination_dir: destination_dir.into(),
            log_file: log_file.into(),
            probe_attempts: DEFAULT_PROBE_ATTEMPTS,
            probe_interval: DEFAULT_PROBE_INTERVAL,
            idle_interval: DEFAULT_IDLE_INTERVAL,
            drain_on_stop: false,
            queue_warn_threshold: DEFAULT_QUEUE_WARN_THRESHOLD,
        }
    }
}

// ---------------------------------------------------------------------------
// MonitorConfig::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Name of the offending field, e.g. `"probe_attempts"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn check_directory(field: &str, path: &Path, errors: &mut Vec<ValidationError>) {
    if !path.exists() {
        errors.push(ValidationError {
            field: field.into(),
            message: format!("directory does not exist: {}", path.display()),
        });
    } else if !path.is_dir() {
        errors.push(ValidationError {
            field: field.into(),
            message: format!("not a directory: {}", path.display()),
        });
    }
}

impl MonitorConfig {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- directories ---
        check_directory("source_dir", &self.source_dir, &mut errors);
        check_directory("destination_dir", &self.destination_dir, &mut errors);

        if self.source_dir == self.destination_dir {
            errors.push(ValidationError {
                field: "destination_dir".into(),
                message: "must differ from source_dir".into(),
            });
        }

        // --- log file ---
        match self.log_file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() && !parent.is_dir() => {
                errors.push(ValidationError {
                    field: "log_file".into(),
                    message: format!("parent directory does not exist: {}", parent.display()),
                });
            }
            _ => {}
        }
        if self.log_file.is_dir() {
            errors.push(ValidationError {
                field: "log_file".into(),
                message: format!("is a directory: {}", self.log_file.display()),
            });
        }

        // --- timing ---
        if self.probe_attempts == 0 {
            errors.push(ValidationError {
                field: "probe_attempts".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.probe_interval.is_zero() {
            errors.push(ValidationError {
                field: "probe_interval".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.idle_interval.is_zero() {
            errors.push(ValidationError {
                field: "idle_interval".into(),
                message: "must be greater than 0".into(),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// MonitorConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`MonitorConfig`] programmatically.
///
/// # Example
///
/// ```rust,no_run
/// use dirmover_core::config::MonitorConfigBuilder;
/// use std::time::Duration;
///
/// let config = MonitorConfigBuilder::new("/srv/inbox", "/srv/archive", "/var/log/dirmover.log")
///     .probe_attempts(20)
///     .probe_interval(Duration::from_millis(250))
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct MonitorConfigBuilder {
    config: MonitorConfig,
}

impl MonitorConfigBuilder {
    /// Start from [`MonitorConfig::new`] with the given paths.
    pub fn new(
        source_dir: impl Into<PathBuf>,
        destination_dir: impl Into<PathBuf>,
        log_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config: MonitorConfig::new(source_dir, destination_dir, log_file),
        }
    }

    pub fn probe_attempts(mut self, attempts: u32) -> Self {
        self.config.probe_attempts = attempts;
        self
    }

    pub fn probe_interval(mut self, interval: Duration) -> Self {
        self.config.probe_interval = interval;
        self
    }

    pub fn idle_interval(mut self, interval: Duration) -> Self {
        self.config.idle_interval = interval;
        self
    }

    pub fn drain_on_stop(mut self, drain: bool) -> Self {
        self.config.drain_on_stop = drain;
        self
    }

    pub fn queue_warn_threshold(mut self, threshold: usize) -> Self {
        self.config.queue_warn_threshold = threshold;
        self
    }

    /// Consume the builder and return the finished [`MonitorConfig`].
    pub fn build(self) -> MonitorConfig {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<MonitorConfig, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

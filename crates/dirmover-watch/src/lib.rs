//! dirmover Watch - Event-to-action relocation pipeline
//!
//! Provides:
//! - Creation-only, non-recursive directory watching
//! - An unbounded multi-producer work queue
//! - Readiness probing with bounded retry
//! - Atomic, non-overwriting relocation
//! - A single background worker feeding the audit trail
//!
//! ## Architecture
//!
//! ```text
//! inotify / kqueue / ReadDirectoryChangesW
//!       │
//!       ▼
//!  EventSource ──→ WorkQueue ──→ Worker ──→ Mover ──→ AuditLog
//!       │                          ▲
//!       └──── fault channel ───────┘
//! ```
//!
//! ## Modules
//!
//! - [`source`] - `EventSource`, wraps the `notify` watcher
//! - [`queue`] - `WorkQueue`, pending paths between source and worker
//! - [`probe`] - `ReadinessProbe` and the exclusive-open implementation
//! - [`mover`] - `Mover`, readiness wait plus rename
//! - [`worker`] - `Worker`, the single consumer loop
//! - [`monitor`] - `Monitor`, the composition root with start/stop

pub mod monitor;
pub mod mover;
pub mod probe;
pub mod queue;
pub mod source;
pub mod worker;

pub use monitor::{Monitor, MonitorStats};
pub use mover::Mover;
pub use probe::{ExclusiveOpenProbe, ReadinessProbe};
pub use queue::WorkQueue;
pub use source::EventSource;
pub use worker::{Worker, WorkerStats};

//! dirmover Audit - Append-only audit trail
//!
//! Provides:
//! - `AuditLog`: serialized writer of timestamped success/error lines
//! - `LogEntry`: one immutable `YYYY-MM-DD HH:mm:ss - <message>` line
//!
//! The audit trail is the operator-facing record of every relocation and
//! every failure. Diagnostics go through `tracing` instead.

pub mod entry;
pub mod logger;

pub use entry::LogEntry;
pub use logger::AuditLog;

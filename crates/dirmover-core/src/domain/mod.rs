//! Domain model for the relocation pipeline
//!
//! ## Modules
//!
//! - [`pending`] - `PendingPath`, the unit of work held by the queue
//! - [`outcome`] - `MoveOutcome`, the tagged result of one relocation
//! - [`state`] - `MonitorState`, the one-shot lifecycle of a monitor
//! - [`errors`] - error taxonomy shared by the watch and audit crates

pub mod errors;
pub mod outcome;
pub mod pending;
pub mod state;

//! dirmover Core - Domain types, errors and configuration
//!
//! This crate contains the pieces shared by every other dirmover crate:
//! - **Domain values** - `PendingPath`, `MoveOutcome`, `MonitorState`
//! - **Error taxonomy** - `MonitorError`, `MoveError`, `LogWriteError`
//! - **Configuration** - `MonitorConfig` with validation and a builder
//!
//! The crate performs no I/O beyond the existence checks in
//! [`config::MonitorConfig::validate`].

pub mod config;
pub mod domain;

pub use config::{MonitorConfig, MonitorConfigBuilder, ValidationError};
pub use domain::{
    errors::{LogWriteError, MonitorError, MoveError},
    outcome::MoveOutcome,
    pending::PendingPath,
    state::MonitorState,
};

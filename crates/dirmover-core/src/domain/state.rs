//! Monitor lifecycle state
//!
//! A monitor moves `Created -> Running -> Stopped` and never returns to
//! `Running`. A monitor that is stopped before it ever started goes straight
//! from `Created` to `Stopped`.

use std::fmt;

/// Lifecycle state of a monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitorState {
    /// Constructed, not yet watching
    #[default]
    Created,
    /// Watching the source directory with the worker running
    Running,
    /// Watch released and worker finished; terminal
    Stopped,
}

impl MonitorState {
    /// Returns true if `self -> next` is a legal transition
    pub fn can_transition_to(&self, next: MonitorState) -> bool {
        matches!(
            (self, next),
            (MonitorState::Created, MonitorState::Running)
                | (MonitorState::Created, MonitorState::Stopped)
                | (MonitorState::Running, MonitorState::Stopped)
        )
    }

    /// Returns true while the worker is expected to be alive
    pub fn is_running(&self) -> bool {
        matches!(self, MonitorState::Running)
    }

    /// Returns true once the monitor has been stopped
    pub fn is_stopped(&self) -> bool {
        matches!(self, MonitorState::Stopped)
    }
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorState::Created => write!(f, "Created"),
            MonitorState::Running => write!(f, "Running"),
            MonitorState::Stopped => write!(f, "Stopped"),
        }
    }
}

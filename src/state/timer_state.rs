//! Timer state structure and its invariants

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current mode of the work timer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerMode {
    #[default]
    Idle,
    Running,
    Paused,
}

impl TimerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerMode::Idle => "idle",
            TimerMode::Running => "running",
            TimerMode::Paused => "paused",
        }
    }

    /// Whether a session is open (running or paused)
    pub fn is_active(&self) -> bool {
        !matches!(self, TimerMode::Idle)
    }
}

impl fmt::Display for TimerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The project a session is tracked against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRef {
    pub id: String,
    pub name: String,
    pub color: String,
}

impl ProjectRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: color.into(),
        }
    }
}

/// Violations found when checking a timer state loaded from outside the engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("{mode} timer must {expectation}")]
    Inconsistent {
        mode: TimerMode,
        expectation: &'static str,
    },
    #[error("accumulated pause duration must be a non-negative number of seconds")]
    InvalidPauseDuration,
}

/// Timer state: the only data the timer keeps between transitions.
///
/// Fields are mutated exclusively by [`crate::timer::TimerEngine`]; this
/// struct is also the crash-recovery record written to disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub(crate) mode: TimerMode,
    pub(crate) active_project: Option<ProjectRef>,
    pub(crate) start_time: Option<DateTime<Utc>>,
    /// When the current pause began; only set while paused
    pub(crate) pause_start_time: Option<DateTime<Utc>>,
    /// Sum of completed pauses in the open session, in seconds
    #[serde(default)]
    pub(crate) accumulated_pause_seconds: f64,
}

impl TimerState {
    /// Create a new idle timer state
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn active_project(&self) -> Option<&ProjectRef> {
        self.active_project.as_ref()
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    pub fn pause_start_time(&self) -> Option<DateTime<Utc>> {
        self.pause_start_time
    }

    pub fn accumulated_pause_seconds(&self) -> f64 {
        self.accumulated_pause_seconds
    }

    /// Check the mode/field invariants
    pub fn validate(&self) -> Result<(), StateError> {
        let session_open = self.active_project.is_some() && self.start_time.is_some();
        let session_cleared = self.active_project.is_none() && self.start_time.is_none();

        match self.mode {
            TimerMode::Idle if !session_cleared || self.pause_start_time.is_some() => {
                return Err(StateError::Inconsistent {
                    mode: self.mode,
                    expectation: "not carry a project, start time or pause start",
                });
            }
            TimerMode::Running if !session_open || self.pause_start_time.is_some() => {
                return Err(StateError::Inconsistent {
                    mode: self.mode,
                    expectation: "have a project and start time and no pause start",
                });
            }
            TimerMode::Paused if !session_open || self.pause_start_time.is_none() => {
                return Err(StateError::Inconsistent {
                    mode: self.mode,
                    expectation: "have a project, start time and pause start",
                });
            }
            _ => {}
        }

        if !self.accumulated_pause_seconds.is_finite() || self.accumulated_pause_seconds < 0.0 {
            return Err(StateError::InvalidPauseDuration);
        }
        if self.mode == TimerMode::Idle && self.accumulated_pause_seconds != 0.0 {
            return Err(StateError::Inconsistent {
                mode: self.mode,
                expectation: "have zero accumulated pause",
            });
        }
        Ok(())
    }
}

/// A finished session handed to the time-entry store after `stop`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedSession {
    pub project_id: String,
    pub project_name: String,
    pub start_time: DateTime<Utc>,
    pub stopped_at: DateTime<Utc>,
    /// Total pause in whole seconds, rounded
    pub pause_duration: u64,
    /// Worked seconds at the moment of stopping
    pub elapsed_seconds: u64,
}

//! Timer engine implementation.
//!
//! The engine is a wall-clock state machine over a single [`TimerState`].
//! It owns no threads and never suspends: every transition runs to
//! completion and the caller supplies the current time.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -(start)-> Running -(pause)-> Paused -(resume)-> Running
//! Running | Paused -(stop)-> Idle
//! ```
//!
//! Calls that do not fit the current mode are ignored rather than treated as
//! errors, since the same command can arrive from a shortcut, a button and the
//! widget at once.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::clock::seconds_between;
use crate::state::{CompletedSession, ProjectRef, TimerMode, TimerState};
use crate::sync::TimerSnapshot;

/// Core timer engine
#[derive(Debug, Clone, Default)]
pub struct TimerEngine {
    state: TimerState,
}

impl TimerEngine {
    /// Create an engine in the `Idle` state
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild an engine from a persisted state.
    ///
    /// A state that breaks the mode invariants is discarded and the engine
    /// starts idle.
    pub fn restore(state: TimerState) -> Self {
        match state.validate() {
            Ok(()) => Self { state },
            Err(e) => {
                warn!("Discarding inconsistent persisted timer state: {}", e);
                Self::new()
            }
        }
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn mode(&self) -> TimerMode {
        self.state.mode
    }

    pub fn project(&self) -> Option<&ProjectRef> {
        self.state.active_project.as_ref()
    }

    pub fn accumulated_pause_seconds(&self) -> f64 {
        self.state.accumulated_pause_seconds
    }

    /// Start a session. Returns `false` when a session is already open.
    pub fn start_at(&mut self, project: ProjectRef, now: DateTime<Utc>) -> bool {
        if self.state.mode != TimerMode::Idle {
            debug!("Ignoring start: timer is {}", self.state.mode);
            return false;
        }

        self.state = TimerState {
            mode: TimerMode::Running,
            active_project: Some(project),
            start_time: Some(now),
            pause_start_time: None,
            accumulated_pause_seconds: 0.0,
        };
        true
    }

    /// Pause a running session
    pub fn pause_at(&mut self, now: DateTime<Utc>) -> bool {
        if self.state.mode != TimerMode::Running {
            debug!("Ignoring pause: timer is {}", self.state.mode);
            return false;
        }

        self.state.mode = TimerMode::Paused;
        self.state.pause_start_time = Some(now);
        true
    }

    /// Resume a paused session, charging the finished pause to the session
    pub fn resume_at(&mut self, now: DateTime<Utc>) -> bool {
        let Some(pause_start) = self.paused_since() else {
            debug!("Ignoring resume: timer is {}", self.state.mode);
            return false;
        };

        self.state.accumulated_pause_seconds += seconds_between(pause_start, now);
        self.state.mode = TimerMode::Running;
        self.state.pause_start_time = None;
        true
    }

    /// Resume a paused session without charging the current pause.
    ///
    /// The paused interval counts as worked time; callers that want some of
    /// it charged follow up with [`TimerEngine::adjust_pause_duration`].
    pub fn resume_uncharged(&mut self) -> bool {
        if self.paused_since().is_none() {
            debug!("Ignoring uncharged resume: timer is {}", self.state.mode);
            return false;
        }

        self.state.mode = TimerMode::Running;
        self.state.pause_start_time = None;
        true
    }

    /// Shift the accumulated pause by `delta` seconds, clamped at zero.
    ///
    /// Returns the delta actually applied. Does nothing while idle.
    pub fn adjust_pause_duration(&mut self, delta: f64) -> f64 {
        if self.state.mode == TimerMode::Idle || !delta.is_finite() {
            return 0.0;
        }

        let before = self.state.accumulated_pause_seconds;
        let after = (before + delta).max(0.0);
        self.state.accumulated_pause_seconds = after;
        after - before
    }

    /// Close the session and hand back its record.
    ///
    /// Returns `None` when there is nothing to stop.
    pub fn stop_at(&mut self, now: DateTime<Utc>) -> Option<CompletedSession> {
        if self.state.mode == TimerMode::Idle {
            debug!("Ignoring stop: timer is idle");
            return None;
        }

        let elapsed = self.elapsed_seconds_at(now);
        let total_pause = self.pause_seconds_at(now);
        let state = std::mem::take(&mut self.state);

        let (Some(project), Some(start_time)) = (state.active_project, state.start_time) else {
            warn!("Open session without project or start time, resetting");
            return None;
        };

        Some(CompletedSession {
            project_id: project.id,
            project_name: project.name,
            start_time,
            stopped_at: now,
            pause_duration: total_pause.round() as u64,
            elapsed_seconds: elapsed.floor() as u64,
        })
    }

    /// Drop the session without producing a record.
    ///
    /// Returns whether a session was open.
    pub fn reset(&mut self) -> bool {
        let was_active = self.state.mode.is_active();
        self.state = TimerState::new();
        was_active
    }

    /// Worked seconds in the open session, never negative
    pub fn elapsed_seconds_at(&self, now: DateTime<Utc>) -> f64 {
        let Some(start) = self.state.start_time else {
            return 0.0;
        };
        if self.state.mode == TimerMode::Idle {
            return 0.0;
        }

        let gross = seconds_between(start, now);
        (gross - self.pause_seconds_at(now)).max(0.0)
    }

    /// Completed pauses plus the pause in progress, if any
    pub fn pause_seconds_at(&self, now: DateTime<Utc>) -> f64 {
        let current = self
            .paused_since()
            .map(|pause_start| seconds_between(pause_start, now))
            .unwrap_or(0.0);
        self.state.accumulated_pause_seconds + current
    }

    /// Snapshot for secondary windows
    pub fn snapshot_at(&self, now: DateTime<Utc>) -> TimerSnapshot {
        let project = self.state.active_project.as_ref();
        TimerSnapshot {
            status: self.state.mode,
            project_id: project.map(|p| p.id.clone()),
            project_name: project.map(|p| p.name.clone()),
            project_color: project.map(|p| p.color.clone()),
            elapsed_seconds: self.elapsed_seconds_at(now).floor() as u64,
        }
    }

    fn paused_since(&self) -> Option<DateTime<Utc>> {
        match self.state.mode {
            TimerMode::Paused => self.state.pause_start_time,
            _ => None,
        }
    }
}

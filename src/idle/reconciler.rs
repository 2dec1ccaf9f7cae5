//! Idle reconciliation
//!
//! Each poll feeds the current idle seconds into [`IdleReconciler::observe`]:
//!
//! 1. Idle for at least the threshold while running: pause the timer and
//!    remember when the idle period began.
//! 2. Back at the keyboard (idle under [`MIN_ACTIVE_SECS`]) after such a
//!    pause: if the whole absence reached the threshold, raise a
//!    [`ReconciliationRequest`]; otherwise forget it quietly.
//!
//! The request is settled later by [`apply_resolution`]. Both resolutions
//! aim at a target accumulated pause computed from the value captured at
//! auto-pause time, so the result is the same whether the user resumed the
//! timer by hand before answering or not.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::seconds_between;
use crate::state::TimerMode;
use crate::timer::TimerEngine;

pub const DEFAULT_IDLE_THRESHOLD_SECS: u64 = 300;
pub const POLL_INTERVAL_SECS: u64 = 5;
/// Below this many idle seconds the user counts as back
pub const MIN_ACTIVE_SECS: u64 = 10;

/// An idle period that paused the timer and has not been settled yet
#[derive(Debug, Clone, Copy, PartialEq)]
struct IdleSession {
    idle_start: DateTime<Utc>,
    /// Accumulated pause of the session when idle detection paused it
    baseline_pause_seconds: f64,
}

/// "Welcome back" question for the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationRequest {
    pub idle_seconds: u64,
    pub idle_start: DateTime<Utc>,
    pub detected_at: DateTime<Utc>,
    pub baseline_pause_seconds: f64,
}

/// What to do with the time spent away
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Resolution {
    /// Treat the idle period as a break
    Discard,
    /// Count the idle period as work
    KeepAll,
}

/// Result of one poll
#[derive(Debug, Clone, PartialEq)]
pub enum IdleOutcome {
    Unchanged,
    /// The timer was paused by idle detection
    AutoPaused { idle_start: DateTime<Utc> },
    /// The user came back after a long absence
    Returned(ReconciliationRequest),
    /// The user came back before the absence reached the threshold
    BriefIdle { idle_seconds: u64 },
    /// The timer was stopped while idle-paused
    Cleared,
}

#[derive(Debug, Clone)]
pub struct IdleReconciler {
    threshold_secs: u64,
    session: Option<IdleSession>,
}

impl IdleReconciler {
    pub fn new(threshold_secs: u64) -> Self {
        Self {
            threshold_secs: threshold_secs.max(1),
            session: None,
        }
    }

    /// Whether the timer is currently paused by idle detection
    pub fn is_auto_paused(&self) -> bool {
        self.session.is_some()
    }

    /// Whether a poll is worth making at all
    pub fn should_poll(&self, enabled: bool, mode: TimerMode) -> bool {
        enabled && (mode != TimerMode::Idle || self.session.is_some())
    }

    /// Forget any idle period once the timer is observed idle.
    ///
    /// Returns whether something was cleared.
    pub fn observe_mode(&mut self, mode: TimerMode) -> bool {
        if mode == TimerMode::Idle && self.session.is_some() {
            debug!("Timer stopped while idle-paused, clearing idle session");
            self.session = None;
            return true;
        }
        false
    }

    pub fn observe(
        &mut self,
        engine: &mut TimerEngine,
        idle_seconds: u64,
        now: DateTime<Utc>,
    ) -> IdleOutcome {
        if self.observe_mode(engine.mode()) {
            return IdleOutcome::Cleared;
        }

        if idle_seconds >= self.threshold_secs
            && engine.mode() == TimerMode::Running
            && self.session.is_none()
        {
            let Some(idle_start) = idle_period_start(now, idle_seconds, engine.state().start_time())
            else {
                warn!("Ignoring out-of-range idle reading of {}s", idle_seconds);
                return IdleOutcome::Unchanged;
            };
            let baseline_pause_seconds = engine.accumulated_pause_seconds();
            if engine.pause_at(now) {
                info!("Timer paused after {}s of inactivity", idle_seconds);
                self.session = Some(IdleSession {
                    idle_start,
                    baseline_pause_seconds,
                });
                return IdleOutcome::AutoPaused { idle_start };
            }
        }

        if idle_seconds < MIN_ACTIVE_SECS {
            if let Some(session) = self.session.take() {
                let total = seconds_between(session.idle_start, now).round() as u64;
                if total >= self.threshold_secs {
                    info!("User back after {}s away", total);
                    return IdleOutcome::Returned(ReconciliationRequest {
                        idle_seconds: total,
                        idle_start: session.idle_start,
                        detected_at: now,
                        baseline_pause_seconds: session.baseline_pause_seconds,
                    });
                }
                // The timer stays paused until the user resumes it.
                debug!("Idle period of {}s was below threshold, ignoring", total);
                return IdleOutcome::BriefIdle { idle_seconds: total };
            }
        }

        IdleOutcome::Unchanged
    }
}

/// When the idle period began, never before the session itself.
///
/// `None` if the reading cannot be placed on the calendar.
fn idle_period_start(
    now: DateTime<Utc>,
    idle_seconds: u64,
    session_start: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    let idle = Duration::try_seconds(i64::try_from(idle_seconds).ok()?)?;
    let start = now.checked_sub_signed(idle)?;
    Some(match session_start {
        Some(session_start) if session_start > start => session_start,
        _ => start,
    })
}

impl Default for IdleReconciler {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_THRESHOLD_SECS)
    }
}

/// Settle a reconciliation request against the engine.
///
/// Returns `false` when the session was stopped in the meantime.
pub fn apply_resolution(
    engine: &mut TimerEngine,
    request: &ReconciliationRequest,
    resolution: Resolution,
) -> bool {
    let target = match resolution {
        Resolution::Discard => request.baseline_pause_seconds + request.idle_seconds as f64,
        Resolution::KeepAll => request.baseline_pause_seconds,
    };

    match engine.mode() {
        TimerMode::Idle => {
            debug!("Timer stopped before idle time was reconciled");
            return false;
        }
        TimerMode::Paused => {
            engine.resume_uncharged();
        }
        TimerMode::Running => {}
    }

    let applied = engine.adjust_pause_duration(target - engine.accumulated_pause_seconds());
    info!(
        "Idle time reconciled ({:?}): pause adjusted by {:.0}s",
        resolution, applied
    );
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ProjectRef;
    use pretty_assertions::assert_eq;

    fn t0() -> DateTime<Utc> {
        "2026-03-02T09:00:00Z".parse().unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        t0() + Duration::seconds(secs)
    }

    fn running_engine() -> TimerEngine {
        let mut engine = TimerEngine::new();
        engine.start_at(ProjectRef::new("P1", "Site", "#007AFF"), t0());
        engine
    }

    /// Poll every 5s with the user inactive from t=10 and back at `back_at`
    fn idle_until(
        reconciler: &mut IdleReconciler,
        engine: &mut TimerEngine,
        back_at: i64,
    ) -> Option<ReconciliationRequest> {
        let mut t = 0;
        while t <= back_at {
            let idle = if t >= 10 && t < back_at { (t - 10) as u64 } else { 0 };
            if let IdleOutcome::Returned(request) = reconciler.observe(engine, idle, at(t)) {
                return Some(request);
            }
            t += POLL_INTERVAL_SECS as i64;
        }
        None
    }

    #[test]
    fn long_absence_auto_pauses_and_raises_request() {
        let mut reconciler = IdleReconciler::default();
        let mut engine = running_engine();

        for t in (0..310).step_by(5) {
            let idle = if t >= 10 { (t - 10) as u64 } else { 0 };
            assert_eq!(reconciler.observe(&mut engine, idle, at(t)), IdleOutcome::Unchanged);
        }
        assert_eq!(
            reconciler.observe(&mut engine, 300, at(310)),
            IdleOutcome::AutoPaused { idle_start: at(10) }
        );
        assert_eq!(engine.mode(), TimerMode::Paused);
        assert!(reconciler.is_auto_paused());

        assert_eq!(reconciler.observe(&mut engine, 385, at(395)), IdleOutcome::Unchanged);
        let outcome = reconciler.observe(&mut engine, 2, at(400));
        let IdleOutcome::Returned(request) = outcome else {
            panic!("expected a reconciliation request, got {:?}", outcome);
        };
        assert_eq!(request.idle_seconds, 390);
        assert_eq!(request.idle_start, at(10));
        assert!(!reconciler.is_auto_paused());
    }

    #[test]
    fn discard_while_paused_charges_idle_as_pause() {
        let mut reconciler = IdleReconciler::default();
        let mut engine = running_engine();
        let request = idle_until(&mut reconciler, &mut engine, 400).expect("request");

        assert!(apply_resolution(&mut engine, &request, Resolution::Discard));
        assert_eq!(engine.mode(), TimerMode::Running);
        assert_eq!(engine.accumulated_pause_seconds(), 390.0);
        assert_eq!(engine.elapsed_seconds_at(at(400)), 10.0);
    }

    #[test]
    fn keep_all_while_paused_counts_idle_as_work() {
        let mut reconciler = IdleReconciler::default();
        let mut engine = running_engine();
        let request = idle_until(&mut reconciler, &mut engine, 400).expect("request");

        assert!(apply_resolution(&mut engine, &request, Resolution::KeepAll));
        assert_eq!(engine.mode(), TimerMode::Running);
        assert_eq!(engine.accumulated_pause_seconds(), 0.0);
        assert_eq!(engine.elapsed_seconds_at(at(400)), 400.0);
    }

    #[test]
    fn keep_all_after_manual_resume_removes_charged_pause() {
        let mut reconciler = IdleReconciler::default();
        let mut engine = running_engine();
        reconciler.observe(&mut engine, 300, at(310));
        engine.resume_at(at(395));
        assert_eq!(engine.accumulated_pause_seconds(), 85.0);

        let IdleOutcome::Returned(request) = reconciler.observe(&mut engine, 1, at(400)) else {
            panic!("expected a reconciliation request");
        };
        assert!(apply_resolution(&mut engine, &request, Resolution::KeepAll));
        assert_eq!(engine.accumulated_pause_seconds(), 0.0);
    }

    #[test]
    fn resolution_is_independent_of_resume_order() {
        for resolution in [Resolution::Discard, Resolution::KeepAll] {
            // Dialog answered while still paused, then nothing else.
            let mut dialog_first = running_engine();
            let mut reconciler = IdleReconciler::default();
            reconciler.observe(&mut dialog_first, 300, at(310));
            let IdleOutcome::Returned(request) = reconciler.observe(&mut dialog_first, 0, at(400))
            else {
                panic!("expected a reconciliation request");
            };
            apply_resolution(&mut dialog_first, &request, resolution);
            dialog_first.resume_at(at(405));

            // Manual resume first, dialog answered afterwards.
            let mut resume_first = running_engine();
            let mut reconciler = IdleReconciler::default();
            reconciler.observe(&mut resume_first, 300, at(310));
            let IdleOutcome::Returned(request) = reconciler.observe(&mut resume_first, 0, at(400))
            else {
                panic!("expected a reconciliation request");
            };
            resume_first.resume_at(at(403));
            apply_resolution(&mut resume_first, &request, resolution);

            assert_eq!(
                dialog_first.accumulated_pause_seconds(),
                resume_first.accumulated_pause_seconds(),
                "{:?}",
                resolution
            );
        }
    }

    #[test]
    fn brief_idle_is_forgotten_and_timer_stays_paused() {
        let mut reconciler = IdleReconciler::new(60);
        let mut engine = running_engine();
        assert!(matches!(
            reconciler.observe(&mut engine, 60, at(100)),
            IdleOutcome::AutoPaused { .. }
        ));

        // Clock skew makes the measured absence shorter than the threshold.
        let outcome = reconciler.observe(&mut engine, 0, at(45));
        assert!(matches!(outcome, IdleOutcome::BriefIdle { .. }));
        assert!(!reconciler.is_auto_paused());
        assert_eq!(engine.mode(), TimerMode::Paused);
    }

    #[test]
    fn absurd_idle_reading_is_ignored() {
        let mut reconciler = IdleReconciler::default();
        let mut engine = running_engine();

        let outcome = reconciler.observe(&mut engine, 10_000_000_000_000_000, at(310));
        assert_eq!(outcome, IdleOutcome::Unchanged);
        assert_eq!(engine.mode(), TimerMode::Running);
        assert!(!reconciler.is_auto_paused());

        assert_eq!(reconciler.observe(&mut engine, u64::MAX, at(315)), IdleOutcome::Unchanged);
        assert_eq!(engine.mode(), TimerMode::Running);
    }

    #[test]
    fn idle_start_is_not_before_session_start() {
        let mut reconciler = IdleReconciler::default();
        let mut engine = running_engine();

        // Idle since long before the timer was started.
        assert_eq!(
            reconciler.observe(&mut engine, 3_600, at(300)),
            IdleOutcome::AutoPaused { idle_start: t0() }
        );
        let IdleOutcome::Returned(request) = reconciler.observe(&mut engine, 0, at(400)) else {
            panic!("expected a reconciliation request");
        };
        assert_eq!(request.idle_seconds, 400);
    }

    #[test]
    fn no_second_auto_pause_while_session_pending() {
        let mut reconciler = IdleReconciler::default();
        let mut engine = running_engine();
        reconciler.observe(&mut engine, 300, at(310));
        engine.resume_at(at(320));

        assert_eq!(reconciler.observe(&mut engine, 330, at(340)), IdleOutcome::Unchanged);
        assert_eq!(engine.mode(), TimerMode::Running);
    }

    #[test]
    fn manual_pause_is_not_treated_as_idle() {
        let mut reconciler = IdleReconciler::default();
        let mut engine = running_engine();
        engine.pause_at(at(5));

        assert_eq!(reconciler.observe(&mut engine, 400, at(405)), IdleOutcome::Unchanged);
        assert_eq!(reconciler.observe(&mut engine, 0, at(410)), IdleOutcome::Unchanged);
        assert!(!reconciler.is_auto_paused());
    }

    #[test]
    fn stopping_the_timer_clears_idle_session() {
        let mut reconciler = IdleReconciler::default();
        let mut engine = running_engine();
        reconciler.observe(&mut engine, 300, at(310));
        engine.stop_at(at(320));

        assert_eq!(reconciler.observe(&mut engine, 0, at(330)), IdleOutcome::Cleared);
        assert!(!reconciler.should_poll(true, engine.mode()));
    }

    #[test]
    fn poll_is_skipped_when_disabled_or_idle() {
        let reconciler = IdleReconciler::default();
        assert!(!reconciler.should_poll(false, TimerMode::Running));
        assert!(!reconciler.should_poll(true, TimerMode::Idle));
        assert!(reconciler.should_poll(true, TimerMode::Paused));
    }

    #[test]
    fn resolution_after_stop_is_a_no_op() {
        let mut reconciler = IdleReconciler::default();
        let mut engine = running_engine();
        let request = idle_until(&mut reconciler, &mut engine, 400).expect("request");
        engine.stop_at(at(401));

        assert!(!apply_resolution(&mut engine, &request, Resolution::Discard));
        assert_eq!(engine.mode(), TimerMode::Idle);
    }
}

//! Main application state management

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::Instant,
};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::{persist::StateFile, CompletedSession, ProjectRef, TimerMode, TimerState};
use crate::{
    clock::{Clock, SystemClock},
    config::Settings,
    idle::{apply_resolution, IdleOutcome, IdleReconciler, ReconciliationRequest, Resolution},
    services::{EffectHooks, NewTimeEntry, NoEffects, StoreError, TimeEntry, TimeEntryStore},
    sync::{EventBus, RemoteCommand, SyncMessage, TimerSnapshot},
    timer::TimerEngine,
};

/// Which effect hook a transition fires
#[derive(Debug, Clone)]
enum Feedback {
    Start(ProjectRef),
    Pause,
    Resume,
    Stop { project_name: String, elapsed_seconds: u64 },
    Silent,
}

/// Timer state to write to the recovery file
#[derive(Debug)]
struct StateSave {
    revision: u64,
    state: TimerState,
}

/// Authoritative application state: the one timer and everything observing it.
///
/// Every mutation goes through the engine lock, so transitions are
/// serialized even on a multi-threaded runtime. Snapshots are published
/// under the lock; the crash-recovery file is written after it is released.
pub struct AppState {
    engine: Mutex<TimerEngine>,
    reconciler: Mutex<IdleReconciler>,
    /// Reconciliation waiting for the user's answer
    pending_idle: Mutex<Option<ReconciliationRequest>>,
    pub settings: Settings,
    pub bus: EventBus,
    mode_tx: watch::Sender<TimerMode>,
    entries: Arc<dyn TimeEntryStore>,
    effects: Arc<dyn EffectHooks>,
    state_file: Option<StateFile>,
    /// Bumped under the engine lock on every commit
    revision: AtomicU64,
    /// Latest revision written to `state_file`
    saved_revision: Mutex<u64>,
    clock: Arc<dyn Clock>,
    /// Server start, for uptime
    pub start_time: Instant,
    /// Last action tracking
    last_action: Mutex<Option<(String, DateTime<Utc>)>>,
}

/// Builder for [`AppState`]
pub struct AppStateBuilder {
    settings: Settings,
    entries: Arc<dyn TimeEntryStore>,
    effects: Arc<dyn EffectHooks>,
    state_file: Option<StateFile>,
    clock: Arc<dyn Clock>,
}

impl AppStateBuilder {
    pub fn effects(mut self, effects: Arc<dyn EffectHooks>) -> Self {
        self.effects = effects;
        self
    }

    pub fn state_file(mut self, state_file: StateFile) -> Self {
        self.state_file = Some(state_file);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Build the state, recovering a session left behind by a crash
    pub fn build(self) -> AppState {
        let engine = match self.state_file.as_ref().map(StateFile::load) {
            Some(Ok(Some(saved))) => {
                let engine = TimerEngine::restore(saved);
                if engine.mode().is_active() {
                    info!(
                        "Recovered {} timer for project {}",
                        engine.mode(),
                        engine.project().map(|p| p.name.as_str()).unwrap_or("?")
                    );
                }
                engine
            }
            Some(Ok(None)) | None => TimerEngine::new(),
            Some(Err(e)) => {
                warn!("Failed to load saved timer state, starting idle: {}", e);
                TimerEngine::new()
            }
        };

        let (mode_tx, _) = watch::channel(engine.mode());
        let reconciler = IdleReconciler::new(self.settings.idle_threshold_secs());

        AppState {
            engine: Mutex::new(engine),
            reconciler: Mutex::new(reconciler),
            pending_idle: Mutex::new(None),
            settings: self.settings,
            bus: EventBus::default(),
            mode_tx,
            entries: self.entries,
            effects: self.effects,
            state_file: self.state_file,
            revision: AtomicU64::new(0),
            saved_revision: Mutex::new(0),
            clock: self.clock,
            start_time: Instant::now(),
            last_action: Mutex::new(None),
        }
    }
}

impl AppState {
    pub fn builder(settings: Settings, entries: Arc<dyn TimeEntryStore>) -> AppStateBuilder {
        AppStateBuilder {
            settings,
            entries,
            effects: Arc::new(NoEffects),
            state_file: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Start tracking a project. `false` if a session is already open.
    pub fn start(&self, project: ProjectRef) -> bool {
        info!("Starting timer for project {}", project.name);
        self.transition("start", |engine, now| {
            let feedback = Feedback::Start(project.clone());
            engine.start_at(project, now).then_some(feedback)
        })
    }

    pub fn pause(&self) -> bool {
        self.transition("pause", |engine, now| {
            engine.pause_at(now).then_some(Feedback::Pause)
        })
    }

    pub fn resume(&self) -> bool {
        self.transition("resume", |engine, now| {
            engine.resume_at(now).then_some(Feedback::Resume)
        })
    }

    /// Close the session. The record is gone from the timer once this returns.
    pub fn stop(&self) -> Option<CompletedSession> {
        let mut session = None;
        self.transition("stop", |engine, now| {
            let stopped = engine.stop_at(now)?;
            let feedback = Feedback::Stop {
                project_name: stopped.project_name.clone(),
                elapsed_seconds: stopped.elapsed_seconds,
            };
            session = Some(stopped);
            Some(feedback)
        });
        session
    }

    /// Stop and save the session as a time entry.
    ///
    /// A failed save does not bring the session back.
    pub fn stop_and_record(&self) -> Result<Option<TimeEntry>, StoreError> {
        let Some(session) = self.stop() else {
            return Ok(None);
        };

        let input = NewTimeEntry::from_session(&session);
        match self.entries.create_time_entry(input) {
            Ok(entry) => {
                self.bus.publish(SyncMessage::TimeEntrySaved(entry.clone()));
                Ok(Some(entry))
            }
            Err(e) => {
                error!(
                    "Failed to save time entry for project {} (started {}): {}",
                    session.project_id, session.start_time, e
                );
                Err(e)
            }
        }
    }

    pub fn time_entries(&self) -> Result<Vec<TimeEntry>, StoreError> {
        self.entries.list_time_entries()
    }

    /// Discard the session without a record
    pub fn reset(&self) -> bool {
        info!("Resetting timer");
        self.transition("reset", |engine, _| engine.reset().then_some(Feedback::Silent))
    }

    /// Apply a command from another window, exactly like a local action
    pub fn apply_command(&self, command: RemoteCommand) {
        info!("Remote command: {}", command.as_str());
        match command {
            RemoteCommand::Pause => {
                self.pause();
            }
            RemoteCommand::Resume => {
                self.resume();
            }
            RemoteCommand::Stop => {
                // Already logged by stop_and_record
                let _ = self.stop_and_record();
            }
        }
    }

    pub fn timer_state(&self) -> TimerState {
        self.engine().state().clone()
    }

    pub fn mode(&self) -> TimerMode {
        self.engine().mode()
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.engine().elapsed_seconds_at(self.now())
    }

    pub fn pause_seconds(&self) -> f64 {
        self.engine().pause_seconds_at(self.now())
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        self.engine().snapshot_at(self.now())
    }

    pub fn publish_snapshot(&self) {
        self.bus.publish(SyncMessage::TimerSync(self.snapshot()));
    }

    /// Watch the timer mode; changes after every transition
    pub fn subscribe_mode(&self) -> watch::Receiver<TimerMode> {
        self.mode_tx.subscribe()
    }

    /// Whether the idle monitor should query idle time now
    pub fn idle_poll_due(&self) -> bool {
        let mode = self.mode();
        self.reconciler().should_poll(self.settings.enable_idle_detection, mode)
    }

    pub fn is_idle_paused(&self) -> bool {
        self.reconciler().is_auto_paused()
    }

    /// Feed one idle reading into the reconciler
    pub fn observe_idle(&self, idle_seconds: u64) -> IdleOutcome {
        let now = self.now();
        let (outcome, save) = {
            let mut engine = self.engine();
            let mode_before = engine.mode();
            let outcome = self.reconciler().observe(&mut engine, idle_seconds, now);
            let save = (engine.mode() != mode_before)
                .then(|| self.commit(&engine, "idle-pause", now));
            (outcome, save)
        };
        let changed = save.is_some();
        if let Some(save) = save {
            self.persist(save);
        }

        match &outcome {
            IdleOutcome::AutoPaused { .. } => {
                if changed {
                    self.effects.on_pause();
                }
                self.bus.publish(SyncMessage::TimerIdleToggle { active: true });
            }
            IdleOutcome::Returned(request) => {
                *self.pending() = Some(request.clone());
                self.bus.publish(SyncMessage::IdleReconciliation(request.clone()));
            }
            IdleOutcome::BriefIdle { .. } | IdleOutcome::Cleared => {
                self.bus.publish(SyncMessage::TimerIdleToggle { active: false });
            }
            IdleOutcome::Unchanged => {}
        }
        outcome
    }

    pub fn pending_reconciliation(&self) -> Option<ReconciliationRequest> {
        self.pending().clone()
    }

    /// Answer the pending welcome-back question.
    ///
    /// Returns the settled request, or `None` if nothing was pending.
    pub fn resolve_idle(&self, resolution: Resolution) -> Option<ReconciliationRequest> {
        let request = self.pending().take()?;
        let now = self.now();
        let save = {
            let mut engine = self.engine();
            apply_resolution(&mut engine, &request, resolution)
                .then(|| self.commit(&engine, "idle-resolve", now))
        };
        if let Some(save) = save {
            self.persist(save);
        }
        self.bus.publish(SyncMessage::TimerIdleToggle { active: false });
        Some(request)
    }

    /// Write the current state to the crash-recovery file
    pub fn flush(&self) {
        let save = self.pending_save(&self.engine());
        self.persist(save);
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        match self.last_action.lock().ok().and_then(|a| a.clone()) {
            Some((action, at)) => (Some(action), Some(at)),
            None => (None, None),
        }
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Run one engine transition; on success commit it and fire its feedback
    fn transition<F>(&self, action: &str, apply: F) -> bool
    where
        F: FnOnce(&mut TimerEngine, DateTime<Utc>) -> Option<Feedback>,
    {
        let now = self.now();
        let (feedback, save) = {
            let mut engine = self.engine();
            let Some(feedback) = apply(&mut engine, now) else {
                return false;
            };
            (feedback, self.commit(&engine, action, now))
        };
        self.persist(save);

        match feedback {
            Feedback::Start(project) => self.effects.on_start(&project),
            Feedback::Pause => self.effects.on_pause(),
            Feedback::Resume => self.effects.on_resume(),
            Feedback::Stop {
                project_name,
                elapsed_seconds,
            } => self.effects.on_stop(&project_name, elapsed_seconds),
            Feedback::Silent => {}
        }
        true
    }

    /// Broadcast a committed transition. Called with the engine locked; the
    /// returned save is written once the lock is released.
    fn commit(&self, engine: &TimerEngine, action: &str, now: DateTime<Utc>) -> StateSave {
        let mode = engine.mode();

        if let Ok(mut last_action) = self.last_action.lock() {
            *last_action = Some((action.to_string(), now));
        }

        if mode == TimerMode::Idle {
            let cleared = self.reconciler().observe_mode(mode);
            let dropped = self.pending().take().is_some();
            if cleared || dropped {
                self.bus.publish(SyncMessage::TimerIdleToggle { active: false });
            }
        }

        self.mode_tx.send_replace(mode);
        self.bus.publish(SyncMessage::TimerSync(engine.snapshot_at(now)));
        self.pending_save(engine)
    }

    /// Copy of the engine state, numbered in commit order. Called with the engine locked.
    fn pending_save(&self, engine: &TimerEngine) -> StateSave {
        StateSave {
            revision: self.revision.fetch_add(1, Ordering::Relaxed) + 1,
            state: engine.state().clone(),
        }
    }

    /// Write a committed state unless a later one is already on disk
    fn persist(&self, save: StateSave) {
        let Some(file) = &self.state_file else {
            return;
        };
        let mut saved = self.saved_revision.lock().unwrap_or_else(|e| e.into_inner());
        if save.revision <= *saved {
            debug!("Skipping stale timer state (revision {})", save.revision);
            return;
        }
        match file.save(&save.state) {
            Ok(()) => *saved = save.revision,
            Err(e) => warn!("Failed to save timer state to {}: {}", file.path().display(), e),
        }
    }

    fn engine(&self) -> MutexGuard<'_, TimerEngine> {
        self.engine.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn reconciler(&self) -> MutexGuard<'_, IdleReconciler> {
        self.reconciler.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn pending(&self) -> MutexGuard<'_, Option<ReconciliationRequest>> {
        self.pending_idle.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::idle::IdleOutcome;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct MemoryStore {
        entries: Mutex<Vec<TimeEntry>>,
        fail: bool,
    }

    impl TimeEntryStore for MemoryStore {
        fn create_time_entry(&self, input: NewTimeEntry) -> Result<TimeEntry, StoreError> {
            if self.fail {
                return Err(StoreError::Io(std::io::Error::other("disk full")));
            }
            let entry = TimeEntry {
                id: uuid::Uuid::new_v4(),
                fields: input,
                created_at: Utc::now(),
            };
            self.entries.lock().unwrap().push(entry.clone());
            Ok(entry)
        }

        fn list_time_entries(&self) -> Result<Vec<TimeEntry>, StoreError> {
            Ok(self.entries.lock().unwrap().clone())
        }
    }

    fn project() -> ProjectRef {
        ProjectRef::new("P1", "Website", "#007AFF")
    }

    fn fixture(store: Arc<MemoryStore>) -> (AppState, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new("2026-03-02T10:00:00Z".parse().unwrap()));
        let state = AppState::builder(Settings::default(), store)
            .clock(clock.clone())
            .build();
        (state, clock)
    }

    fn snapshots(messages: Vec<SyncMessage>) -> Vec<TimerSnapshot> {
        messages
            .into_iter()
            .filter_map(|m| match m {
                SyncMessage::TimerSync(snapshot) => Some(snapshot),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn every_transition_publishes_a_snapshot() {
        let (state, clock) = fixture(Arc::default());
        let mut sub = state.bus.subscribe();

        assert!(state.start(project()));
        clock.advance_secs(10);
        assert!(state.pause());
        assert!(!state.pause());
        clock.advance_secs(5);
        assert!(state.resume());

        let statuses: Vec<_> = snapshots(sub.drain()).iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![TimerMode::Running, TimerMode::Paused, TimerMode::Running]
        );
        assert_eq!(*state.subscribe_mode().borrow(), TimerMode::Running);
    }

    #[test]
    fn stop_records_entry_and_announces_it() {
        let store = Arc::new(MemoryStore::default());
        let (state, clock) = fixture(store.clone());
        state.start(project());
        clock.advance_secs(10);
        state.pause();
        clock.advance_secs(5);
        state.resume();
        clock.advance_secs(5);

        let mut sub = state.bus.subscribe();
        let entry = state.stop_and_record().unwrap().expect("entry");
        assert_eq!(entry.fields.pause_duration, 5);
        assert_eq!(entry.duration_seconds(), 15);
        assert_eq!(store.list_time_entries().unwrap().len(), 1);
        assert_eq!(state.mode(), TimerMode::Idle);

        let messages = sub.drain();
        assert!(messages.contains(&SyncMessage::TimeEntrySaved(entry)));
    }

    #[test]
    fn stop_while_idle_records_nothing() {
        let store = Arc::new(MemoryStore::default());
        let (state, _) = fixture(store.clone());
        assert!(state.stop_and_record().unwrap().is_none());
        assert!(store.list_time_entries().unwrap().is_empty());
    }

    #[test]
    fn failed_save_does_not_restore_session() {
        let store = Arc::new(MemoryStore {
            fail: true,
            ..MemoryStore::default()
        });
        let (state, _) = fixture(store);
        state.start(project());
        assert!(state.stop_and_record().is_err());
        assert_eq!(state.mode(), TimerMode::Idle);
    }

    #[test]
    fn idle_round_trip_through_app_state() {
        let (state, clock) = fixture(Arc::default());
        state.start(project());
        clock.advance_secs(310);
        let mut sub = state.bus.subscribe();

        assert!(state.idle_poll_due());
        assert!(matches!(state.observe_idle(300), IdleOutcome::AutoPaused { .. }));
        assert!(state.is_idle_paused());
        assert_eq!(state.mode(), TimerMode::Paused);

        clock.advance_secs(90);
        assert!(matches!(state.observe_idle(0), IdleOutcome::Returned(_)));
        assert_eq!(state.pending_reconciliation().map(|r| r.idle_seconds), Some(390));

        let settled = state.resolve_idle(Resolution::Discard).expect("pending request");
        assert_eq!(settled.idle_seconds, 390);
        assert_eq!(state.mode(), TimerMode::Running);
        assert_eq!(state.elapsed_seconds(), 10.0);
        assert!(state.resolve_idle(Resolution::KeepAll).is_none());

        let messages = sub.drain();
        assert!(messages.contains(&SyncMessage::TimerIdleToggle { active: true }));
        assert!(messages.contains(&SyncMessage::TimerIdleToggle { active: false }));
    }

    #[test]
    fn return_from_idle_is_pushed_to_windows() {
        let (state, clock) = fixture(Arc::default());
        state.start(project());
        clock.advance_secs(310);
        state.observe_idle(300);
        clock.advance_secs(90);

        let mut sub = state.bus.subscribe();
        let IdleOutcome::Returned(request) = state.observe_idle(0) else {
            panic!("expected a reconciliation request");
        };
        assert_eq!(request.idle_seconds, 390);
        assert_eq!(sub.drain(), vec![SyncMessage::IdleReconciliation(request)]);
    }

    #[test]
    fn stopping_drops_pending_reconciliation() {
        let (state, clock) = fixture(Arc::default());
        state.start(project());
        clock.advance_secs(310);
        state.observe_idle(300);
        clock.advance_secs(60);
        state.observe_idle(0);
        assert!(state.pending_reconciliation().is_some());

        state.stop();
        assert!(state.pending_reconciliation().is_none());
        assert!(!state.idle_poll_due());
    }

    #[test]
    fn remote_commands_use_the_local_path() {
        let store = Arc::new(MemoryStore::default());
        let (state, _) = fixture(store.clone());
        state.start(project());

        state.apply_command(RemoteCommand::Pause);
        assert_eq!(state.mode(), TimerMode::Paused);
        state.apply_command(RemoteCommand::Resume);
        assert_eq!(state.mode(), TimerMode::Running);
        state.apply_command(RemoteCommand::Stop);
        assert_eq!(state.mode(), TimerMode::Idle);
        assert_eq!(store.list_time_entries().unwrap().len(), 1);
    }

    #[test]
    fn session_survives_restart_through_state_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timer_state.json");
        let clock = Arc::new(ManualClock::new("2026-03-02T10:00:00Z".parse().unwrap()));

        let first = AppState::builder(Settings::default(), Arc::new(MemoryStore::default()))
            .state_file(StateFile::new(&path))
            .clock(clock.clone())
            .build();
        first.start(project());
        clock.advance_secs(60);
        first.pause();
        drop(first);

        clock.advance_secs(30);
        let second = AppState::builder(Settings::default(), Arc::new(MemoryStore::default()))
            .state_file(StateFile::new(&path))
            .clock(clock.clone())
            .build();
        assert_eq!(second.mode(), TimerMode::Paused);
        assert_eq!(second.elapsed_seconds(), 60.0);
        assert_eq!(second.timer_state().active_project(), Some(&project()));
    }

    #[test]
    fn state_file_keeps_latest_commit() {
        let dir = tempfile::tempdir().unwrap();
        let file = StateFile::new(dir.path().join("timer_state.json"));
        let state = AppState::builder(Settings::default(), Arc::new(MemoryStore::default()))
            .state_file(file.clone())
            .build();

        state.start(project());
        let stale = state.pending_save(&state.engine());
        state.pause();
        assert_eq!(file.load().unwrap(), Some(state.timer_state()));

        // A write that lost the race to a later commit is dropped.
        state.persist(stale);
        assert_eq!(file.load().unwrap().map(|s| s.mode()), Some(TimerMode::Paused));

        state.flush();
        assert_eq!(file.load().unwrap(), Some(state.timer_state()));
    }

    /// Moves one second forward on every read
    struct SteppingClock(Mutex<DateTime<Utc>>);

    impl Clock for SteppingClock {
        fn now(&self) -> DateTime<Utc> {
            let mut now = self.0.lock().unwrap();
            let current = *now;
            *now += chrono::Duration::seconds(1);
            current
        }
    }

    #[test]
    fn entry_ends_when_the_session_stopped() {
        let start: DateTime<Utc> = "2026-03-02T10:00:00Z".parse().unwrap();
        let state = AppState::builder(Settings::default(), Arc::new(MemoryStore::default()))
            .clock(Arc::new(SteppingClock(Mutex::new(start))))
            .build();

        state.start(project());
        let entry = state.stop_and_record().unwrap().expect("entry");
        assert_eq!(entry.fields.start_time, start);
        assert_eq!(entry.fields.end_time, start + chrono::Duration::seconds(1));
        assert_eq!(entry.duration_seconds(), 1);
    }

    #[test]
    fn corrupt_state_file_starts_idle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timer_state.json");
        std::fs::write(&path, "not json").unwrap();

        let state = AppState::builder(Settings::default(), Arc::new(MemoryStore::default()))
            .state_file(StateFile::new(path))
            .build();
        assert_eq!(state.mode(), TimerMode::Idle);
    }
}

//! Idle detection background task

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::watch,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    idle::{IdleOutcome, IdleSource, POLL_INTERVAL_SECS},
    state::AppState,
};

/// Poll the idle source every few seconds and feed the reconciler
pub async fn idle_monitor_task<S: IdleSource>(
    state: Arc<AppState>,
    source: S,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(
        "Starting idle monitor task (threshold {}s, enabled: {})",
        state.settings.idle_threshold_secs(),
        state.settings.enable_idle_detection
    );

    let mut ticker = interval(Duration::from_secs(POLL_INTERVAL_SECS));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                check_idle(&state, &source).await;
            }
        }
    }

    debug!("Idle monitor task exiting");
}

/// One poll. Query failures leave the timer untouched.
pub async fn check_idle<S: IdleSource>(state: &AppState, source: &S) -> Option<IdleOutcome> {
    if !state.idle_poll_due() {
        return None;
    }

    let idle_seconds = match source.idle_seconds().await {
        Ok(seconds) => seconds,
        Err(e) => {
            warn!("Failed to check idle time: {}", e);
            return None;
        }
    };

    debug!("Idle for {}s", idle_seconds);
    Some(state.observe_idle(idle_seconds))
}

//! Timer sync background task
//!
//! Keeps secondary windows current: a snapshot every second while the timer
//! runs, an immediate snapshot when a window asks for one, and remote
//! commands applied through the same path as local actions. Snapshots for
//! transitions are published by [`AppState`] itself.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::watch,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, info};

use crate::{
    state::{AppState, TimerMode},
    sync::SyncMessage,
};

pub const SYNC_INTERVAL: Duration = Duration::from_secs(1);

/// Background task that broadcasts timer snapshots and handles remote commands
pub async fn timer_sync_task(state: Arc<AppState>, mut shutdown: watch::Receiver<bool>) {
    info!("Starting timer sync task");

    let mut inbound = state.bus.subscribe();
    let mut mode_rx = state.subscribe_mode();
    let mut ticker = interval(SYNC_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    state.publish_snapshot();

    loop {
        let running = *mode_rx.borrow_and_update() == TimerMode::Running;

        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            changed = mode_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                // The transition snapshot is already out; restart the cadence from here.
                ticker.reset();
            }
            message = inbound.recv() => match message {
                Some(message) => handle_inbound(&state, message),
                None => break,
            },
            _ = ticker.tick(), if running => state.publish_snapshot(),
        }
    }

    debug!("Timer sync task exiting");
}

fn handle_inbound(state: &AppState, message: SyncMessage) {
    match message {
        SyncMessage::TimerCommand { action } => state.apply_command(action),
        SyncMessage::TimerRequestSync => {
            debug!("Resync requested");
            state.publish_snapshot();
        }
        _ => {}
    }
}

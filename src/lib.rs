//! Timekeeper - A time-tracking daemon with idle-aware timer state
//!
//! This library provides the timer state machine, idle-time reconciliation
//! and the sync protocol that keeps secondary windows (the floating widget,
//! dashboards) consistent with the one authoritative timer.

pub mod api;
pub mod clock;
pub mod config;
pub mod idle;
pub mod services;
pub mod state;
pub mod sync;
pub mod tasks;
pub mod timer;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use config::{Config, Settings};
pub use state::AppState;
pub use timer::TimerEngine;
pub use utils::signals::shutdown_signal;

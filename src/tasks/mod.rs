//! Background tasks module
//!
//! This module contains background tasks that run alongside the HTTP server.

pub mod idle_monitor;
pub mod timer_sync;
pub mod worker;

// Re-export main functions
pub use idle_monitor::{check_idle, idle_monitor_task};
pub use timer_sync::timer_sync_task;
pub use worker::Worker;

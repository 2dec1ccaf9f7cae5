//! Idle detection module
//!
//! Turns the polled "seconds since last input" signal into auto-pauses and
//! welcome-back reconciliation requests.

pub mod reconciler;
pub mod source;

pub use reconciler::{
    apply_resolution, IdleOutcome, IdleReconciler, ReconciliationRequest, Resolution,
    DEFAULT_IDLE_THRESHOLD_SECS, MIN_ACTIVE_SECS, POLL_INTERVAL_SECS,
};
pub use source::{IdleError, IdleSource, SystemIdleSource};

//! State management module
//!
//! The timer state record, its crash-recovery file, and the application
//! state that owns the single timer instance.

pub mod app_state;
pub mod persist;
pub mod timer_state;

// Re-export main types
pub use app_state::{AppState, AppStateBuilder};
pub use persist::{PersistError, StateFile};
pub use timer_state::{CompletedSession, ProjectRef, StateError, TimerMode, TimerState};

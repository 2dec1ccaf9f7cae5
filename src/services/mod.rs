//! External collaborators module
//!
//! Time-entry storage, feedback effects and platform queries used by the
//! timer but owned outside it.

pub mod effects;
pub mod entries;
pub mod system;

// Re-export main types
pub use effects::{DesktopEffects, EffectHooks, NoEffects};
pub use entries::{JsonlTimeEntryStore, NewTimeEntry, StoreError, TimeEntry, TimeEntryStore};
pub use system::{check_idle_helper_available, query_idle_seconds};

//! Cross-window synchronization module
//!
//! Message types shared with secondary windows and the bus that carries them.

pub mod bus;
pub mod protocol;

pub use bus::{EventBus, Subscription};
pub use protocol::{RemoteCommand, SyncMessage, TimerSnapshot};

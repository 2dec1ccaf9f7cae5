//! Cross-window message shapes
//!
//! Every message travels as `{"event": <name>, "payload": <json>}`. Event
//! names are shared with the widget and dashboard windows.

use serde::{Deserialize, Serialize};

use crate::idle::ReconciliationRequest;
use crate::services::TimeEntry;
use crate::state::TimerMode;

/// Snapshot of the authoritative timer, as seen by secondary windows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub status: TimerMode,
    pub project_id: Option<String>,
    pub project_name: Option<String>,
    pub project_color: Option<String>,
    pub elapsed_seconds: u64,
}

/// Commands a secondary window may issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteCommand {
    Pause,
    Resume,
    Stop,
}

impl RemoteCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteCommand::Pause => "pause",
            RemoteCommand::Resume => "resume",
            RemoteCommand::Stop => "stop",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum SyncMessage {
    /// Authoritative state, published on every transition and every second while running
    TimerSync(TimerSnapshot),
    TimerCommand { action: RemoteCommand },
    /// A window (re)loaded and wants the current state
    TimerRequestSync,
    /// The timer was paused by idle detection (`true`) or that pause was settled (`false`)
    TimerIdleToggle { active: bool },
    /// The user came back from a long absence; windows ask what to do with it
    IdleReconciliation(ReconciliationRequest),
    TimeEntrySaved(TimeEntry),
}

impl SyncMessage {
    /// Event name on the wire
    pub fn name(&self) -> &'static str {
        match self {
            SyncMessage::TimerSync(_) => "timer-sync",
            SyncMessage::TimerCommand { .. } => "timer-command",
            SyncMessage::TimerRequestSync => "timer-request-sync",
            SyncMessage::TimerIdleToggle { .. } => "timer-idle-toggle",
            SyncMessage::IdleReconciliation(_) => "idle-reconciliation",
            SyncMessage::TimeEntrySaved(_) => "time-entry-saved",
        }
    }

    /// Payload alone, `null` for payload-less events
    pub fn payload(&self) -> serde_json::Value {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(mut fields)) => {
                fields.remove("payload").unwrap_or(serde_json::Value::Null)
            }
            _ => serde_json::Value::Null,
        }
    }
}

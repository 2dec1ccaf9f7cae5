//! API request and response structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    idle::{ReconciliationRequest, Resolution},
    services::TimeEntry,
    state::{AppState, ProjectRef, TimerMode},
    sync::RemoteCommand,
};

/// Body of `POST /timer/start`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub project_id: String,
    pub project_name: String,
    #[serde(default = "default_color")]
    pub project_color: String,
}

fn default_color() -> String {
    "#007AFF".to_string()
}

impl From<StartRequest> for ProjectRef {
    fn from(request: StartRequest) -> Self {
        ProjectRef::new(request.project_id, request.project_name, request.project_color)
    }
}

/// Body of `POST /sync/command`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    pub action: RemoteCommand,
}

/// Body of `POST /idle/resolve`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveRequest {
    pub choice: Resolution,
}

/// Full timer status for the main window
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerStatusResponse {
    pub status: TimerMode,
    pub project: Option<ProjectRef>,
    pub start_time: Option<DateTime<Utc>>,
    pub elapsed_seconds: u64,
    pub pause_seconds: u64,
    pub idle_paused: bool,
    pub pending_idle: Option<ReconciliationRequest>,
    pub uptime: String,
    pub last_action: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
    pub timestamp: DateTime<Utc>,
}

impl TimerStatusResponse {
    pub fn from_state(state: &AppState) -> Self {
        let timer = state.timer_state();
        let (last_action, last_action_time) = state.get_last_action();
        Self {
            status: timer.mode(),
            project: timer.active_project().cloned(),
            start_time: timer.start_time(),
            elapsed_seconds: state.elapsed_seconds().floor() as u64,
            pause_seconds: state.pause_seconds().round() as u64,
            idle_paused: state.is_idle_paused(),
            pending_idle: state.pending_reconciliation(),
            uptime: state.get_uptime(),
            last_action,
            last_action_time,
            timestamp: state.now(),
        }
    }
}

/// Response of `POST /timer/stop`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopResponse {
    pub entry: Option<TimeEntry>,
    pub timer: TimerStatusResponse,
}

/// Response of `POST /idle/resolve`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub resolved: ReconciliationRequest,
    pub timer: TimerStatusResponse,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    /// Create a new health response
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

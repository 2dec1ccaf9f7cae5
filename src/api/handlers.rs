//! HTTP endpoint handlers

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use futures::{Stream, StreamExt};
use tracing::{error, info, warn};

use super::responses::{
    CommandRequest, HealthResponse, ResolveRequest, ResolveResponse, StartRequest, StopResponse,
    TimerStatusResponse,
};
use crate::{
    idle::ReconciliationRequest,
    services::TimeEntry,
    state::AppState,
    sync::SyncMessage,
};

type ApiResult<T> = Result<Json<T>, StatusCode>;

/// Handle GET /timer - Return current timer status
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<TimerStatusResponse> {
    Json(TimerStatusResponse::from_state(&state))
}

/// Handle POST /timer/start - Start tracking a project
pub async fn start_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartRequest>,
) -> ApiResult<TimerStatusResponse> {
    if !state.start(request.into()) {
        warn!("Start rejected: timer is already {}", state.mode());
        return Err(StatusCode::CONFLICT);
    }
    Ok(Json(TimerStatusResponse::from_state(&state)))
}

/// Handle POST /timer/pause
pub async fn pause_handler(State(state): State<Arc<AppState>>) -> Json<TimerStatusResponse> {
    state.pause();
    Json(TimerStatusResponse::from_state(&state))
}

/// Handle POST /timer/resume
pub async fn resume_handler(State(state): State<Arc<AppState>>) -> Json<TimerStatusResponse> {
    state.resume();
    Json(TimerStatusResponse::from_state(&state))
}

/// Handle POST /timer/stop - Stop and save the session as a time entry
pub async fn stop_handler(State(state): State<Arc<AppState>>) -> ApiResult<StopResponse> {
    match state.stop_and_record() {
        Ok(entry) => Ok(Json(StopResponse {
            entry,
            timer: TimerStatusResponse::from_state(&state),
        })),
        Err(e) => {
            error!("Stop handler could not save the time entry: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handle POST /timer/reset - Discard the session without saving
pub async fn reset_handler(State(state): State<Arc<AppState>>) -> Json<TimerStatusResponse> {
    state.reset();
    Json(TimerStatusResponse::from_state(&state))
}

/// Handle POST /sync/command - Command from a secondary window
pub async fn command_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CommandRequest>,
) -> StatusCode {
    info!("Command endpoint called: {}", request.action.as_str());
    state.bus.publish(SyncMessage::TimerCommand {
        action: request.action,
    });
    StatusCode::ACCEPTED
}

/// Handle POST /sync/request - A window asks for the current state
pub async fn request_sync_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    state.bus.publish(SyncMessage::TimerRequestSync);
    StatusCode::ACCEPTED
}

/// Handle GET /sync/events - Server-sent stream of every sync message
pub async fn events_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("Sync event stream opened");
    let stream = state.bus.subscribe().into_stream().map(|message| {
        Ok(Event::default()
            .event(message.name())
            .data(message.payload().to_string()))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Handle GET /idle/pending - Pending welcome-back question, if any
pub async fn idle_pending_handler(
    State(state): State<Arc<AppState>>,
) -> Json<Option<ReconciliationRequest>> {
    Json(state.pending_reconciliation())
}

/// Handle POST /idle/resolve - Answer the welcome-back question
pub async fn idle_resolve_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResolveRequest>,
) -> ApiResult<ResolveResponse> {
    let Some(resolved) = state.resolve_idle(request.choice) else {
        return Err(StatusCode::NOT_FOUND);
    };
    Ok(Json(ResolveResponse {
        resolved,
        timer: TimerStatusResponse::from_state(&state),
    }))
}

/// Handle GET /entries - Saved time entries
pub async fn entries_handler(State(state): State<Arc<AppState>>) -> ApiResult<Vec<TimeEntry>> {
    state.time_entries().map(Json).map_err(|e| {
        error!("Failed to list time entries: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

//! HTTP API module
//!
//! The surface secondary windows and the main UI talk to.

pub mod handlers;
pub mod responses;

use std::sync::Arc;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/timer", get(status_handler))
        .route("/timer/start", post(start_handler))
        .route("/timer/pause", post(pause_handler))
        .route("/timer/resume", post(resume_handler))
        .route("/timer/stop", post(stop_handler))
        .route("/timer/reset", post(reset_handler))
        // Cross-window sync
        .route("/sync/command", post(command_handler))
        .route("/sync/request", post(request_sync_handler))
        .route("/sync/events", get(events_handler))
        // Idle reconciliation
        .route("/idle/pending", get(idle_pending_handler))
        .route("/idle/resolve", post(idle_resolve_handler))
        .route("/entries", get(entries_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

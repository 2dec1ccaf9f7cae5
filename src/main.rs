//! Timekeeper - A time-tracking daemon with idle-aware timer state
//!
//! This is the main entry point for the timekeeper application.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use timekeeper::{
    api::create_router,
    config::Config,
    idle::SystemIdleSource,
    services::{check_idle_helper_available, DesktopEffects, JsonlTimeEntryStore},
    state::{AppState, StateFile},
    tasks::{idle_monitor_task, timer_sync_task, Worker},
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("timekeeper={},tower_http=info", config.log_level()))
        .init();

    let settings = config.settings();
    info!("Starting timekeeper v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration: host={}, port={}, idle detection={}, idle threshold={}min, data dir={}",
        config.host,
        config.port,
        settings.enable_idle_detection,
        settings.idle_threshold_minutes,
        config.data_dir().display()
    );

    // Idle detection degrades to inactive when the platform helper is missing
    if settings.enable_idle_detection {
        if let Err(e) = check_idle_helper_available().await {
            warn!("Idle detection will not work: {}", e);
        }
    }

    let state = Arc::new(
        AppState::builder(
            settings.clone(),
            Arc::new(JsonlTimeEntryStore::new(config.entries_file())),
        )
        .effects(Arc::new(DesktopEffects::new(&settings)))
        .state_file(StateFile::new(config.state_file()))
        .build(),
    );

    // Start the background tasks
    let idle_state = Arc::clone(&state);
    let idle_monitor = Worker::spawn("idle monitor", move |shutdown| {
        idle_monitor_task(idle_state, SystemIdleSource, shutdown)
    });
    let sync_state = Arc::clone(&state);
    let timer_sync = Worker::spawn("timer sync", move |shutdown| {
        timer_sync_task(sync_state, shutdown)
    });

    // Create HTTP router with all endpoints
    let app = create_router(Arc::clone(&state));

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /timer          - Current timer status");
    info!("  POST /timer/start    - Start tracking a project");
    info!("  POST /timer/pause    - Pause the timer");
    info!("  POST /timer/resume   - Resume the timer");
    info!("  POST /timer/stop     - Stop and save a time entry");
    info!("  POST /timer/reset    - Discard the running session");
    info!("  POST /sync/command   - Command from a secondary window");
    info!("  POST /sync/request   - Request an immediate snapshot");
    info!("  GET  /sync/events    - Server-sent sync events");
    info!("  GET  /idle/pending   - Pending idle reconciliation");
    info!("  POST /idle/resolve   - Discard or keep idle time");
    info!("  GET  /entries        - Saved time entries");
    info!("  GET  /health         - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    idle_monitor.shutdown().await;
    timer_sync.shutdown().await;
    state.flush();

    info!("Server shutdown complete");
    Ok(())
}

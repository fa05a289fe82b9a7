use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::api::{self, AppState};
use super::db::{DbHandle, PortalDb};
use crate::config::PortalToml;

/// Build the full application router with tracing, plus permissive CORS in
/// dev mode so a separately served front end can reach the API.
pub fn build_router(state: Arc<AppState>) -> Router {
    let dev_mode = state.config.server.dev_mode;
    let mut app = api::api_router(state).layer(TraceLayer::new_for_http());
    if dev_mode {
        app = app.layer(CorsLayer::permissive());
    }
    app
}

/// Open the portal database, creating its parent directory if needed.
pub fn open_database(config: &PortalToml) -> Result<PortalDb> {
    let db_path = &config.server.db_path;
    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    PortalDb::new(db_path).context("Failed to initialize portal database")
}

/// Start the portal server and run until Ctrl+C.
pub async fn start_server(config: PortalToml) -> Result<()> {
    for warning in config.validate() {
        warn!(%warning, "configuration warning");
    }

    let db = open_database(&config)?;
    let purged = db.purge_expired_sessions()?;
    if purged > 0 {
        info!(purged, "removed expired sessions");
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::new(DbHandle::new(db), config));
    let sweeper = tokio::spawn(sweep_expired(Arc::clone(&state), SWEEP_INTERVAL));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    info!(%local_addr, "refurb portal listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    sweeper.abort();
    info!("server shut down gracefully");
    Ok(())
}

const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Periodically drop expired sessions and stale cached reads.
async fn sweep_expired(state: Arc<AppState>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        run_sweep(&state).await;
    }
}

async fn run_sweep(state: &AppState) {
    let stale = state.cache.purge_expired();
    match state.db.call(|db| db.purge_expired_sessions()).await {
        Ok(sessions) if sessions > 0 || stale > 0 => {
            info!(sessions, stale, "swept expired sessions and cached reads");
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "session sweep failed"),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C; shutting down");
        return;
    }
    info!("shutting down");
}

//! Furniture Curator - guided interior-design wizard backend
//!
//! Drives a multi-step conversation that gathers preferences, asks a remote
//! agent for furniture picks, and lets the user confirm them.

mod api;
mod catalog;
mod config;
mod remote;
mod runtime;
mod state_machine;

use api::{create_router, AppState};
use config::CuratorConfig;
use remote::{HttpRemoteService, LoggingService};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Upper bound on how often abandoned sessions are looked for
const IDLE_SWEEP_MAX: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "furniture_curator=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = CuratorConfig::from_env();
    tracing::info!(
        remote = %config.remote.base_url,
        timeout_secs = config.remote.timeout.as_secs(),
        asset_base = %config.runtime.asset_base,
        "Configuration loaded"
    );

    let http = HttpRemoteService::new(&config.remote)?;
    let remote = Arc::new(LoggingService::new(Arc::new(http)));
    let state = AppState::new(remote, config.runtime.clone());

    let shutdown = CancellationToken::new();
    let sweep_interval =
        (config.runtime.idle_ttl / 4).clamp(Duration::from_secs(1), IDLE_SWEEP_MAX);
    state
        .runtime
        .clone()
        .spawn_idle_sweeper(sweep_interval, shutdown.clone());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = create_router(state);
    if let Some(dir) = &config.asset_dir {
        tracing::info!(dir = %dir.display(), "Serving furniture images");
        app = app.nest_service(&config.runtime.asset_base, ServeDir::new(dir));
    }
    let app = app.layer(TraceLayer::new_for_http()).layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    shutdown.cancel();

    Ok(())
}

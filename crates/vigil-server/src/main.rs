//! Vigil - Compliance Validation Engine
//!
//! An HTTP service providing:
//! - Rule-driven compliance checks over files, certificates, endpoints and hosts
//! - Auto-remediation with re-verification and a human approval gate
//! - Scored compliance reports with retention
//! - Interval scheduling and an append-only audit trail

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vigil_core::config::VigilConfig;
use vigil_engine::Scheduler;
use vigil_server::{create_router, AppState, ScheduledRuns};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Starting Vigil v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    let addr = format!("{}:{}", config.server.host, config.server.port);

    // Create application state
    let state = AppState::new(config);

    // Background tasks stop together on shutdown.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = Scheduler::new(
        state.config.scheduler.clone(),
        Arc::new(ScheduledRuns::new(state.clone())),
        state.registry.clone(),
    );
    let scheduler_handle = scheduler.spawn(shutdown_rx.clone());
    let prune_handle = spawn_retention_sweep(state.clone(), shutdown_rx);

    // Build router with middleware
    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // Start server
    let addr: SocketAddr = addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    let _ = scheduler_handle.await;
    let _ = prune_handle.await;

    Ok(())
}

fn load_config() -> Result<VigilConfig> {
    let path = std::env::var("VIGIL_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("vigil.json"));

    let mut config = if path.exists() {
        info!(path = %path.display(), "Loading configuration");
        VigilConfig::from_file(&path)?
    } else {
        info!("No configuration file, using defaults");
        VigilConfig::default()
    };

    // Environment overrides for the listen address.
    if let Ok(host) = std::env::var("VIGIL_HOST") {
        config.server.host = host;
    }
    if let Ok(port) = std::env::var("VIGIL_PORT") {
        if let Ok(port) = port.parse() {
            config.server.port = port;
        }
    }

    Ok(config)
}

/// Hourly retention sweep: expired report files, finished runs and decided
/// proposals past the history window.
fn spawn_retention_sweep(
    state: AppState,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    let history = chrono::Duration::seconds(state.config.storage.history_retention_secs as i64);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60 * 60));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match state.reports.prune_expired().await {
                        Ok(0) => {}
                        Ok(removed) => info!(removed, "Pruned expired reports"),
                        Err(e) => warn!(error = %e, "Report pruning failed"),
                    }
                    let runs = state.registry.prune_terminal(history).await;
                    let proposals = state.proposals.prune_terminal(history).await;
                    if runs > 0 || proposals > 0 {
                        info!(runs, proposals, "Evicted finished history");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
    })
}

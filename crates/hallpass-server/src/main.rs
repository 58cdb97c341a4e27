//! # hallpass-server
//!
//! HTTP server for the hallpass classroom attendance and hall-pass tracking
//! system.
//!
//! This binary provides:
//! - REST API for daily check-in, hall passes and class configuration
//! - A background task that marks overdue passes
//! - OpenAPI documentation via Swagger UI
//! - Structured logging to file and stdout
//!
//! ## Running
//!
//! ```bash
//! # Development
//! cargo run --package hallpass-server
//!
//! # Production
//! HALLPASS_ENV=production ./hallpass-server
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use hallpass_core::Config;
use hallpass_server::api;
use hallpass_server::logging::{self, LogMode};
use hallpass_server::state::AppState;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init(LogMode::from_env())?;

    let config_path = Config::default_path()?;
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    if !config_path.exists() {
        // Leave an editable copy of the effective settings for the operator.
        match config.save(&config_path) {
            Ok(()) => info!(path = %config_path.display(), "Wrote default configuration"),
            Err(e) => warn!(path = %config_path.display(), error = %e, "Could not write default configuration"),
        }
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        classes = config.classes.len(),
        "Starting hallpass-server"
    );

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .context("invalid server.bind / server.port")?;
    let sweep_interval = Duration::from_secs(config.passes.sweep_interval_secs);

    let state = AppState::open(config)?.into_shared();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = tokio::spawn(state.sweeper.clone().run_periodic(sweep_interval, shutdown_rx));

    let app = api::create_router(state);
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    sweeper.await?;
    info!("Shut down");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

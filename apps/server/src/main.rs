//! Marquee Server - standalone headless server for the Marquee fleet
//! controller.
//!
//! This binary runs the control plane as a background daemon: it keeps the
//! fleet view live, persists group definitions, and exposes the HTTP API
//! the dashboard talks to.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use marquee_core::{bootstrap_services, start_server, AppState};
use parking_lot::RwLock;
use tokio::signal;

use crate::config::ServerConfig;

/// Marquee Server - fleet coordination for networked media displays.
#[derive(Parser, Debug)]
#[command(name = "marquee-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "MARQUEE_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Bind port (overrides config file).
    #[arg(short = 'p', long, env = "MARQUEE_BIND_PORT")]
    port: Option<u16>,

    /// Directory service base URL (overrides config file).
    #[arg(short = 'r', long, env = "MARQUEE_REGISTRY_URL")]
    registry_url: Option<String>,

    /// Data directory for persistent state (group definitions).
    #[arg(short = 'd', long, env = "MARQUEE_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("Marquee Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config =
        ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Apply CLI overrides
    if let Some(port) = args.port {
        config.bind_port = port;
    }
    if let Some(url) = args.registry_url {
        config.registry_url = url;
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = Some(data_dir);
    }

    log::info!(
        "Configuration: bind_port={}, registry_url={}, refresh_interval={}s",
        config.bind_port,
        config.registry_url,
        config.refresh_interval
    );

    match &config.data_dir {
        Some(dir) => log::info!("Using data directory: {}", dir.display()),
        None => {
            log::info!("No data directory configured - groups persist to the working directory")
        }
    }

    // Bootstrap services
    let core_config = config.to_core_config();
    let services = bootstrap_services(&core_config).context("Failed to bootstrap services")?;

    log::info!("Services bootstrapped successfully");

    // Start the fleet refresh loop
    services.start_background_tasks();

    log::info!("Background tasks started");

    // Build app state for the HTTP server
    let app_state = AppState::new(&services, Arc::new(RwLock::new(core_config)));

    // Spawn HTTP server on the main tokio runtime
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(app_state).await {
            log::error!("Server error: {}", e);
        }
    });

    log::info!("HTTP server started on port {}", config.bind_port);

    // Wait for shutdown signal
    shutdown_signal().await;

    log::info!("Shutdown signal received, cleaning up...");

    // Graceful shutdown
    services.shutdown();

    // Abort the server task (in-flight requests are abandoned)
    server_handle.abort();

    log::info!("Shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

//! HTTP API layer.
//!
//! This module contains thin handlers that delegate to services.
//! It provides the router construction and server startup functionality.

use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::agent::AgentApi;
use crate::bootstrap::BootstrappedServices;
use crate::services::{FleetMonitor, GroupCoordinator, GroupStore, HdmiSwitcher};
use crate::state::{Config, FleetState};

pub mod http;

/// Errors that can occur when starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the configured TCP port.
    #[error("Failed to bind to port: {0}")]
    Bind(#[from] std::io::Error),
}

/// Shared application state for the API layer.
///
/// This is a thin wrapper that holds references to services.
/// All business logic lives in the services themselves.
#[derive(Clone)]
pub struct AppState {
    /// Device-agent client for direct per-device relays.
    pub agent: Arc<dyn AgentApi>,
    /// Persisted group definitions.
    pub store: Arc<GroupStore>,
    /// Group command fan-out and aggregation.
    pub coordinator: Arc<GroupCoordinator>,
    /// HDMI input coordination.
    pub hdmi: Arc<HdmiSwitcher>,
    /// Fleet view maintenance.
    pub monitor: Arc<FleetMonitor>,
    /// Shared fleet runtime state.
    pub fleet: Arc<FleetState>,
    /// Application configuration.
    pub config: Arc<RwLock<Config>>,
}

impl AppState {
    /// Builds the API state from bootstrapped services.
    #[must_use]
    pub fn new(services: &BootstrappedServices, config: Arc<RwLock<Config>>) -> Self {
        Self {
            agent: Arc::clone(&services.agent),
            store: Arc::clone(&services.store),
            coordinator: Arc::clone(&services.coordinator),
            hdmi: Arc::clone(&services.hdmi),
            monitor: Arc::clone(&services.monitor),
            fleet: Arc::clone(&services.fleet),
            config,
        }
    }
}

/// Starts the HTTP server on the configured port.
pub async fn start_server(state: AppState) -> Result<(), ServerError> {
    let port = state.config.read().preferred_port;
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    log::info!("Server listening on http://0.0.0.0:{}", port);
    let app = http::create_router(state);

    axum::serve(listener, app).await?;
    Ok(())
}

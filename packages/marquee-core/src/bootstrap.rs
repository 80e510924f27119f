//! Application bootstrap and dependency wiring.
//!
//! This module contains the composition root - the single place where all
//! services are instantiated and wired together. This pattern provides:
//!
//! - **Clarity**: All dependency relationships are visible in one place
//! - **Testability**: Easy to swap implementations for testing
//! - **Maintainability**: Service creation logic is isolated from usage

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::agent::{AgentApi, AgentClientImpl, AgentTv};
use crate::error::{MarqueeError, MarqueeResult};
use crate::protocol_constants::GROUPS_FILE;
use crate::registry::{DeviceDirectory, HttpDeviceDirectory};
use crate::services::{FleetMonitor, GroupCoordinator, GroupStore, HdmiSwitcher, StatusPoller};
use crate::state::{Config, FleetState};

/// Container for all bootstrapped services.
///
/// This struct holds all the wired services created during bootstrap.
/// It's consumed by `AppState` to build the final application state.
#[derive(Clone)]
pub struct BootstrappedServices {
    /// Device-agent client.
    pub agent: Arc<dyn AgentApi>,
    /// Directory service client.
    pub directory: Arc<dyn DeviceDirectory>,
    /// Persisted group definitions.
    pub store: Arc<GroupStore>,
    /// Bounded-concurrency device poller.
    pub poller: Arc<StatusPoller>,
    /// Group command fan-out and aggregation.
    pub coordinator: Arc<GroupCoordinator>,
    /// HDMI input coordination.
    pub hdmi: Arc<HdmiSwitcher>,
    /// Fleet view maintenance.
    pub monitor: Arc<FleetMonitor>,
    /// Shared fleet runtime state.
    pub fleet: Arc<FleetState>,
    /// Shared HTTP client for connection pooling.
    http_client: Client,
    /// Cancellation token for graceful shutdown.
    pub cancel_token: CancellationToken,
}

impl BootstrappedServices {
    /// Returns the shared HTTP client.
    pub fn http_client(&self) -> &Client {
        &self.http_client
    }

    /// Starts the background fleet refresh loop.
    pub fn start_background_tasks(&self) {
        Arc::clone(&self.monitor).start();
    }

    /// Initiates graceful shutdown of all services.
    ///
    /// In-flight device requests complete and their results are discarded.
    pub fn shutdown(&self) {
        log::info!("[Bootstrap] Beginning graceful shutdown...");
        self.monitor.shutdown();
        self.cancel_token.cancel();
        log::info!("[Bootstrap] Shutdown complete");
    }
}

/// Creates the shared HTTP client for all device and registry I/O.
///
/// Using a shared client enables connection pooling, and the request
/// timeout bounds how long a hung device can stall a command's join
/// barrier.
fn create_http_client(timeout_secs: u64) -> MarqueeResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| MarqueeError::Internal(format!("Failed to create HTTP client: {}", e)))
}

/// Bootstraps all application services with their dependencies.
///
/// This is the composition root where all services are instantiated and
/// wired together. The wiring order matters - services are created in
/// dependency order:
///
/// 1. Shared infrastructure (HTTP client, cancellation token, fleet state)
/// 2. Agent and directory clients (depend on the HTTP client)
/// 3. Group store (loads the persisted mapping from the data dir)
/// 4. Status poller (depends on agent, fleet state)
/// 5. Group coordinator (depends on agent, poller, fleet state)
/// 6. HDMI switcher (depends on agent)
/// 7. Fleet monitor (depends on everything above)
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the HTTP client
/// fails to build.
pub fn bootstrap_services(config: &Config) -> MarqueeResult<BootstrappedServices> {
    config
        .validate()
        .map_err(MarqueeError::Configuration)?;

    if config.bearer_token.is_empty() {
        log::warn!("[Bootstrap] No bearer token configured - agent requests go out unauthenticated");
    }

    let http_client = create_http_client(config.request_timeout_secs)?;
    let cancel_token = CancellationToken::new();
    let fleet = Arc::new(FleetState::default());

    // Agent client (implements all agent traits)
    let agent_impl = Arc::new(AgentClientImpl::new(
        http_client.clone(),
        config.agent_port,
        config.bearer_token.clone(),
    ));

    let directory: Arc<dyn DeviceDirectory> = Arc::new(HttpDeviceDirectory::new(
        http_client.clone(),
        config.registry_url.clone(),
        config.bearer_token.clone(),
    ));

    let store = Arc::new(GroupStore::open(config.data_dir.join(GROUPS_FILE)));

    let poller = Arc::new(StatusPoller::new(
        Arc::clone(&agent_impl) as Arc<dyn AgentApi>,
        Arc::clone(&fleet),
        config.poll_concurrency,
    ));

    let coordinator = Arc::new(GroupCoordinator::new(
        Arc::clone(&agent_impl) as Arc<dyn AgentApi>,
        Arc::clone(&poller),
        Arc::clone(&fleet),
        Duration::from_secs(config.error_display_secs),
    ));

    let hdmi = Arc::new(HdmiSwitcher::new(
        Arc::clone(&agent_impl) as Arc<dyn AgentTv>,
    ));

    let monitor = Arc::new(FleetMonitor::new(
        Arc::clone(&directory),
        Arc::clone(&store),
        Arc::clone(&poller),
        Arc::clone(&coordinator),
        Arc::clone(&fleet),
        config.refresh_interval,
        cancel_token.clone(),
    ));

    // Coerce to the combined trait for storage
    let agent: Arc<dyn AgentApi> = agent_impl;

    Ok(BootstrappedServices {
        agent,
        directory,
        store,
        poller,
        coordinator,
        hdmi,
        monitor,
        fleet,
        http_client,
        cancel_token,
    })
}

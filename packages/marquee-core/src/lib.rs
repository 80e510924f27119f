//! Marquee Core - shared library for the Marquee fleet controller.
//!
//! This crate provides the core functionality for Marquee, a control plane
//! for a fleet of networked media-player endpoints (single-board devices
//! driving displays). It is consumed by the standalone headless server and
//! is designed so every service can also be driven directly from tests.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`agent`]: Typed HTTP client for the per-device media agent
//! - [`registry`]: Client for the device directory service
//! - [`services`]: Group store, status poller, group coordinator, HDMI
//!   switcher, and the fleet monitor that ties them together
//! - [`state`]: Core application state and configuration
//! - [`api`]: Axum HTTP layer (thin handlers over the services)
//! - [`error`]: Centralized error types
//!
//! # Abstraction Traits
//!
//! Device and directory I/O sits behind traits so services can be exercised
//! with in-memory fakes:
//!
//! - [`AgentApi`](agent::AgentApi): all device-agent operations
//! - [`DeviceDirectory`](registry::DeviceDirectory): fleet listing

#![warn(clippy::all)]

pub mod agent;
pub mod api;
pub mod bootstrap;
pub mod error;
pub mod protocol_constants;
pub mod registry;
pub mod services;
pub mod state;
pub mod utils;

// Re-export commonly used types at the crate root
pub use agent::{AgentApi, AgentClientImpl, AgentError, AgentPlayback, AgentResult, AgentTv};
pub use error::{DeviceFailure, ErrorCode, MarqueeError, MarqueeResult};
pub use registry::{Device, DeviceDirectory, HttpDeviceDirectory, RegistryError};
pub use state::{Config, FleetState, RegistryHealth};
pub use utils::now_millis;

// Re-export service types
pub use services::fleet_monitor::{partition, FleetMonitor, FleetPartition};
pub use services::group_coordinator::{
    AggregateGroupStatus, CommandResult, GroupCommand, GroupCoordinator,
};
pub use services::group_store::{Group, GroupStore, GroupUpdate};
pub use services::hdmi_switcher::{HdmiSwitcher, SwitchOutcome};
pub use services::status_poller::{DeviceSnapshot, StatusPoller};

// Re-export bootstrap types
pub use bootstrap::{bootstrap_services, BootstrappedServices};

// Re-export API types
pub use api::{start_server, AppState, ServerError};

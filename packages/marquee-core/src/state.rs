//! Core application state types.
//!
//! This module provides the [`Config`] for the whole control plane and
//! [`FleetState`], the shared runtime view of the fleet: the last-known-good
//! device list from the registry and the freshest poll snapshot per device.

use std::collections::HashSet;
use std::path::PathBuf;

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::protocol_constants::{AGENT_TIMEOUT_SECS, DEFAULT_AGENT_PORT, ERROR_DISPLAY_SECS};
use crate::registry::Device;
use crate::services::status_poller::DeviceSnapshot;

/// Configuration for the Marquee control plane.
///
/// All fields have sensible defaults except `registry_url`, which must
/// point at a real directory service before bootstrap.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    // Server
    /// Port for the HTTP API server.
    pub preferred_port: u16,

    // Directory service
    /// Base URL of the device directory service.
    pub registry_url: String,

    /// Interval between fleet refresh cycles (seconds).
    pub refresh_interval: u64,

    // Device agents
    /// Port every device agent listens on.
    pub agent_port: u16,

    /// Opaque bearer credential attached to every outbound request.
    pub bearer_token: String,

    /// Per-request timeout for device and registry I/O (seconds).
    pub request_timeout_secs: u64,

    /// Maximum concurrent in-flight device polls.
    pub poll_concurrency: usize,

    // Coordinator
    /// How long an aggregate command error stays attached to a group (seconds).
    pub error_display_secs: u64,

    // Persistence
    /// Directory holding the persisted group mapping.
    pub data_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            preferred_port: 8080,
            registry_url: String::new(),
            refresh_interval: 60,
            agent_port: DEFAULT_AGENT_PORT,
            bearer_token: String::new(),
            request_timeout_secs: AGENT_TIMEOUT_SECS,
            poll_concurrency: 8,
            error_display_secs: ERROR_DISPLAY_SECS,
            data_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.registry_url.is_empty() {
            return Err("registry_url must be set".to_string());
        }
        if self.refresh_interval == 0 {
            return Err("refresh_interval must be >= 1".to_string());
        }
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be >= 1".to_string());
        }
        if self.poll_concurrency == 0 {
            return Err("poll_concurrency must be >= 1".to_string());
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry Health
// ─────────────────────────────────────────────────────────────────────────────

/// Health of the connection to the directory service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryHealth {
    /// Last refresh cycle reached the directory.
    Ok,
    /// Last refresh failed; the fleet view shows the last-known-good list.
    Degraded,
}

/// Current registry health with reason.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryHealthState {
    /// Current health status.
    pub health: RegistryHealth,
    /// Reason for the current health status (if degraded).
    pub reason: Option<String>,
}

impl Default for RegistryHealthState {
    fn default() -> Self {
        Self {
            health: RegistryHealth::Ok,
            reason: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Fleet Runtime State
// ─────────────────────────────────────────────────────────────────────────────

/// Shared runtime state for the fleet.
///
/// # Concurrency design
///
/// - `devices` uses `RwLock<Vec<_>>` because the registry list is replaced
///   atomically each refresh cycle and always read as a whole collection.
/// - `snapshots` uses `DashMap` keyed by host for fine-grained concurrent
///   updates from the bounded-concurrency poller without blocking readers.
#[derive(Default)]
pub struct FleetState {
    /// Last-known-good device list from the registry.
    ///
    /// A failed registry poll leaves this untouched; the next successful
    /// poll replaces it wholesale.
    devices: RwLock<Vec<Device>>,
    /// Freshest poll snapshot per device host.
    snapshots: DashMap<String, DeviceSnapshot>,
    /// Health of the directory connection.
    registry_health: RwLock<RegistryHealthState>,
}

impl FleetState {
    /// Returns a clone of the cached device list.
    #[must_use]
    pub fn devices(&self) -> Vec<Device> {
        self.devices.read().clone()
    }

    /// Atomically replaces the cached device list.
    pub fn replace_devices(&self, devices: Vec<Device>) {
        *self.devices.write() = devices;
    }

    /// Looks up a cached device by host.
    #[must_use]
    pub fn device_by_host(&self, host: &str) -> Option<Device> {
        self.devices.read().iter().find(|d| d.host == host).cloned()
    }

    /// Records the latest snapshot for a device.
    pub fn record_snapshot(&self, host: String, snapshot: DeviceSnapshot) {
        self.snapshots.insert(host, snapshot);
    }

    /// Returns the latest snapshot for a device, if any poll has completed.
    #[must_use]
    pub fn snapshot(&self, host: &str) -> Option<DeviceSnapshot> {
        self.snapshots.get(host).map(|r| r.value().clone())
    }

    /// Removes snapshots for devices no longer present in the registry.
    ///
    /// Called after each refresh cycle so the aggregate view never mixes a
    /// departed device's stale state into a group computation.
    pub fn cleanup_stale_snapshots(&self, valid_hosts: &HashSet<String>) {
        self.snapshots.retain(|host, _| valid_hosts.contains(host));
    }

    /// Returns the current registry health state.
    #[must_use]
    pub fn registry_health(&self) -> RegistryHealthState {
        self.registry_health.read().clone()
    }

    /// Updates registry health, logging once per transition.
    pub fn set_registry_health(&self, health: RegistryHealth, reason: Option<String>) {
        let mut state = self.registry_health.write();
        if state.health != health {
            log::info!(
                "[FleetState] Registry health changed: {:?} -> {:?}{}",
                state.health,
                health,
                reason
                    .as_ref()
                    .map(|r| format!(" ({})", r))
                    .unwrap_or_default()
            );
        }
        state.health = health;
        state.reason = reason;
    }
}

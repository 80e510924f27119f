//! Device registry client.
//!
//! The directory service owns the authoritative list of fleet devices and
//! exposes it as `GET /pis`. This client is stateless - caching and
//! last-known-good fallback live in the fleet monitor, which calls
//! [`DeviceDirectory::list_devices`] on a fixed interval with no
//! retry-with-backoff.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// A fleet device as reported by the directory service.
///
/// Identity is `host` (unique within the fleet); `name` is the
/// human-readable label shown in error breakdowns and the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
    pub host: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur talking to the directory service.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Request never completed (connect failure, timeout, DNS).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Directory returned a non-success HTTP status.
    #[error("HTTP error {0} from directory service")]
    HttpStatus(u16),

    /// Response body was not the expected device list.
    #[error("Malformed directory response: {0}")]
    Parse(String),
}

/// Convenient Result alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

// ─────────────────────────────────────────────────────────────────────────────
// Directory Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for fleet listing operations.
///
/// Used by the `FleetMonitor`; tests substitute a scripted directory to
/// exercise the last-known-good fallback.
#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    /// Fetches the current list of known devices.
    async fn list_devices(&self) -> RegistryResult<Vec<Device>>;
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Directory client backed by the registry's HTTP API.
#[derive(Clone)]
pub struct HttpDeviceDirectory {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpDeviceDirectory {
    /// Creates a new directory client.
    ///
    /// # Arguments
    /// * `client` - Shared HTTP client (should carry a request timeout)
    /// * `base_url` - Directory base URL, e.g. `http://registry.local:7777`
    /// * `token` - Bearer credential attached to every request
    #[must_use]
    pub fn new(client: Client, base_url: String, token: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }
}

#[async_trait]
impl DeviceDirectory for HttpDeviceDirectory {
    async fn list_devices(&self) -> RegistryResult<Vec<Device>> {
        let url = format!("{}/pis", self.base_url);
        let response = self.client.get(&url).bearer_auth(&self.token).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::HttpStatus(status.as_u16()));
        }

        let body = response.text().await?;
        let devices: Vec<Device> =
            serde_json::from_str(&body).map_err(|e| RegistryError::Parse(e.to_string()))?;

        log::debug!("[Registry] Directory returned {} device(s)", devices.len());

        Ok(devices)
    }
}

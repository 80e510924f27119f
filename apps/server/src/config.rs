//! Server configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Server configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to bind the HTTP API server to.
    /// Override: `MARQUEE_BIND_PORT`
    pub bind_port: u16,

    /// Base URL of the device directory service.
    /// Override: `MARQUEE_REGISTRY_URL`
    pub registry_url: String,

    /// Interval in seconds between fleet refresh cycles.
    /// Override: `MARQUEE_REFRESH_INTERVAL`
    pub refresh_interval: u64,

    /// Port every device agent listens on.
    pub agent_port: u16,

    /// Bearer credential attached to every outbound request.
    /// Override: `MARQUEE_BEARER_TOKEN`
    pub bearer_token: String,

    /// Per-request timeout for device and registry I/O (seconds).
    pub request_timeout_secs: u64,

    /// Maximum concurrent in-flight device polls.
    pub poll_concurrency: usize,

    /// Directory for persistent data (group definitions).
    /// Override: `MARQUEE_DATA_DIR`
    pub data_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let core = marquee_core::Config::default();
        Self {
            bind_port: core.preferred_port,
            registry_url: core.registry_url,
            refresh_interval: core.refresh_interval,
            agent_port: core.agent_port,
            bearer_token: core.bearer_token,
            request_timeout_secs: core.request_timeout_secs,
            poll_concurrency: core.poll_concurrency,
            data_dir: None,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MARQUEE_BIND_PORT") {
            if let Ok(port) = val.parse() {
                self.bind_port = port;
            }
        }

        if let Ok(val) = std::env::var("MARQUEE_REGISTRY_URL") {
            self.registry_url = val;
        }

        if let Ok(val) = std::env::var("MARQUEE_REFRESH_INTERVAL") {
            if let Ok(interval) = val.parse() {
                self.refresh_interval = interval;
            }
        }

        if let Ok(val) = std::env::var("MARQUEE_BEARER_TOKEN") {
            self.bearer_token = val;
        }

        // Note: MARQUEE_DATA_DIR is handled by clap via #[arg(env = ...)] in main.rs
    }

    /// Converts to marquee-core's Config type.
    pub fn to_core_config(&self) -> marquee_core::Config {
        marquee_core::Config {
            preferred_port: self.bind_port,
            registry_url: self.registry_url.clone(),
            refresh_interval: self.refresh_interval,
            agent_port: self.agent_port,
            bearer_token: self.bearer_token.clone(),
            request_timeout_secs: self.request_timeout_secs,
            poll_concurrency: self.poll_concurrency,
            data_dir: self.data_dir.clone().unwrap_or_else(|| PathBuf::from(".")),
            ..Default::default()
        }
    }
}

//! Per-device status polling.
//!
//! One poll issues two independent requests against a device agent -
//! playback status and TV power - and folds the outcome into a
//! [`DeviceSnapshot`]. Failures are converted to data at this boundary: a
//! dead device yields a snapshot with an error marker, never an error that
//! aborts polling of sibling devices.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;

use crate::agent::{AgentApi, DeviceStatus, TvStatus};
use crate::registry::Device;
use crate::state::FleetState;
use crate::utils::now_millis;

/// Outcome of one poll pass over a single device.
///
/// Ephemeral; the freshest snapshot per host lives in [`FleetState`] and is
/// replaced wholesale on each poll.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSnapshot {
    /// Playback status, `None` if that request failed.
    pub status: Option<DeviceStatus>,
    /// TV power status, `None` if that request failed.
    pub tv: Option<TvStatus>,
    /// Error marker when either sub-request failed.
    pub error: Option<String>,
    /// When this snapshot was taken (Unix millis).
    pub polled_at: u64,
}

impl DeviceSnapshot {
    /// A device counts as reachable when it answered the playback status
    /// request; TV-side failures degrade the snapshot without marking the
    /// whole device down.
    #[must_use]
    pub fn is_reachable(&self) -> bool {
        self.status.is_some()
    }
}

/// Polls device agents with bounded concurrency.
///
/// Safe to invoke concurrently for N devices; the only shared state is the
/// read-only agent client and the snapshot map it writes results into.
pub struct StatusPoller {
    agent: Arc<dyn AgentApi>,
    state: Arc<FleetState>,
    /// Bounds concurrent in-flight polls so a large fleet cannot open an
    /// unbounded number of sockets at once.
    limit: Arc<Semaphore>,
}

impl StatusPoller {
    /// Creates a new poller.
    ///
    /// # Arguments
    /// * `agent` - Device-agent client
    /// * `state` - Shared fleet state receiving snapshots
    /// * `concurrency` - Maximum concurrent in-flight polls
    #[must_use]
    pub fn new(agent: Arc<dyn AgentApi>, state: Arc<FleetState>, concurrency: usize) -> Self {
        Self {
            agent,
            state,
            limit: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    /// Polls a single device: playback status and TV status concurrently.
    ///
    /// Each sub-request failure is caught and folded into the snapshot.
    pub async fn poll_device(&self, device: &Device) -> DeviceSnapshot {
        let (status, tv) = tokio::join!(
            self.agent.status(&device.host),
            self.agent.tv_status(&device.host)
        );

        let (status, status_err) = split(status);
        let (tv, tv_err) = split(tv);

        let error = match (status_err, tv_err) {
            (None, None) => None,
            (Some(e), None) => {
                log::debug!("[Poller] Status poll failed for {}: {}", device.host, e);
                Some(format!("status: {}", e))
            }
            (None, Some(e)) => {
                log::debug!("[Poller] TV poll failed for {}: {}", device.host, e);
                Some(format!("tv: {}", e))
            }
            (Some(s), Some(t)) => {
                log::debug!("[Poller] Device {} unreachable: {}", device.host, s);
                Some(format!("status: {}; tv: {}", s, t))
            }
        };

        DeviceSnapshot {
            status,
            tv,
            error,
            polled_at: now_millis(),
        }
    }

    /// Polls every listed device and records the snapshots.
    ///
    /// Fan-out with a join barrier; concurrency is bounded by the poller's
    /// semaphore. One device's failure never affects its siblings.
    pub async fn poll_devices(&self, devices: &[Device]) {
        let polls = devices.iter().map(|device| async {
            let _permit = self
                .limit
                .acquire()
                .await
                .expect("poll semaphore is never closed");
            let snapshot = self.poll_device(device).await;
            self.state.record_snapshot(device.host.clone(), snapshot);
        });

        join_all(polls).await;

        log::debug!("[Poller] Completed poll pass over {} device(s)", devices.len());
    }
}

/// Splits a result into (value, error-message) halves.
fn split<T>(result: Result<T, crate::agent::AgentError>) -> (Option<T>, Option<String>) {
    match result {
        Ok(v) => (Some(v), None),
        Err(e) => (None, Some(e.to_string())),
    }
}

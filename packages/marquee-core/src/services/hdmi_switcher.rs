//! HDMI input coordination across a set of devices.
//!
//! Port assignments are per-device configuration, not fleet-global: the
//! same source label ("Raspberry Pi", "TV") can sit on port 1 of one
//! display and port 3 of another. Batch switching therefore resolves the
//! label against each device's own map before relaying the switch.
//!
//! Unlike playback commands there is no commit step here - the current
//! port is always re-derived from the device, never cached optimistically.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;

use crate::agent::{AgentTv, HdmiMap};
use crate::error::MarqueeResult;
use crate::registry::Device;

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// One device's HDMI view: active input plus its port/label map.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceHdmiState {
    /// Human-readable device name.
    pub device: String,
    /// Device host (identity).
    pub host: String,
    /// Active HDMI input port, if known.
    pub current_input: Option<u32>,
    /// The device's port to source-label mapping.
    pub hdmi_map: HdmiMap,
    /// Error marker when the device could not be queried.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of a batch label switch on one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum SwitchOutcome {
    /// The device was switched to the resolved port.
    Switched { port: u32 },
    /// The device's map has no port with the requested label. Not an
    /// error for the batch - the device is simply left alone.
    Skipped,
    /// Resolving or switching failed on this device.
    Failed { error: String },
}

/// Per-device result of a batch switch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchResult {
    pub device: String,
    pub host: String,
    #[serde(flatten)]
    pub outcome: SwitchOutcome,
}

// ─────────────────────────────────────────────────────────────────────────────
// Switcher
// ─────────────────────────────────────────────────────────────────────────────

/// Coordinates HDMI queries and switches across devices.
pub struct HdmiSwitcher {
    agent: Arc<dyn AgentTv>,
}

impl HdmiSwitcher {
    /// Creates a new switcher backed by the given TV client.
    #[must_use]
    pub fn new(agent: Arc<dyn AgentTv>) -> Self {
        Self { agent }
    }

    /// Fetches one device's HDMI state: active input and port map,
    /// requested concurrently. Either request failing marks the state with
    /// an error instead of propagating.
    pub async fn device_state(&self, device: &Device) -> DeviceHdmiState {
        let (current, map) = tokio::join!(
            self.agent.current_input(&device.host),
            self.agent.hdmi_map(&device.host)
        );

        let mut error = None;
        let current_input = match current {
            Ok(c) => c.current_input,
            Err(e) => {
                log::debug!(
                    "[Hdmi] Failed to fetch current input for {}: {}",
                    device.host,
                    e
                );
                error = Some(e.to_string());
                None
            }
        };
        let hdmi_map = match map {
            Ok(m) => m,
            Err(e) => {
                log::debug!("[Hdmi] Failed to fetch HDMI map for {}: {}", device.host, e);
                error = Some(e.to_string());
                HdmiMap::default()
            }
        };

        DeviceHdmiState {
            device: device.name.clone(),
            host: device.host.clone(),
            current_input,
            hdmi_map,
            error,
        }
    }

    /// Fetches HDMI state for every listed device concurrently.
    pub async fn group_states(&self, devices: &[Device]) -> Vec<DeviceHdmiState> {
        join_all(devices.iter().map(|d| self.device_state(d))).await
    }

    /// Switches a single device to an explicit HDMI port.
    pub async fn switch_device(&self, device: &Device, port: u32) -> MarqueeResult<()> {
        self.agent.switch_input(&device.host, port).await?;
        Ok(())
    }

    /// Switches every device to the port carrying the given source label.
    ///
    /// Independently per device: each device's own map is consulted, and a
    /// device with no matching label is skipped silently. One device's
    /// failure never blocks the others.
    pub async fn switch_all_to_label(
        &self,
        devices: &[Device],
        label: &str,
    ) -> Vec<SwitchResult> {
        let switches = devices.iter().map(|device| async {
            let outcome = self.switch_one_to_label(device, label).await;
            SwitchResult {
                device: device.name.clone(),
                host: device.host.clone(),
                outcome,
            }
        });

        let results = join_all(switches).await;

        let switched = results
            .iter()
            .filter(|r| matches!(r.outcome, SwitchOutcome::Switched { .. }))
            .count();
        log::info!(
            "[Hdmi] Batch switch to '{}': {}/{} device(s) switched",
            label,
            switched,
            results.len()
        );

        results
    }

    /// Resolves the label against one device's map and relays the switch.
    async fn switch_one_to_label(&self, device: &Device, label: &str) -> SwitchOutcome {
        let map = match self.agent.hdmi_map(&device.host).await {
            Ok(map) => map,
            Err(e) => {
                log::warn!("[Hdmi] Cannot fetch map for {}: {}", device.host, e);
                return SwitchOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        let Some(port) = map.find_port(label) else {
            log::debug!(
                "[Hdmi] Device {} has no '{}' input, skipping",
                device.host,
                label
            );
            return SwitchOutcome::Skipped;
        };

        match self.agent.switch_input(&device.host, port).await {
            Ok(()) => SwitchOutcome::Switched { port },
            Err(e) => {
                log::warn!(
                    "[Hdmi] Failed to switch {} to port {}: {}",
                    device.host,
                    port,
                    e
                );
                SwitchOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::transport::AgentResult;
    use crate::agent::{AgentError, CurrentInput, TvStatus};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::{BTreeMap, HashMap, HashSet};

    /// TV fake with a scripted HDMI map per host.
    #[derive(Default)]
    struct MockTv {
        maps: Mutex<HashMap<String, HdmiMap>>,
        switch_down: Mutex<HashSet<String>>,
        switches: Mutex<Vec<(String, u32)>>,
    }

    impl MockTv {
        fn with_map(self, host: &str, entries: &[(&str, &str)]) -> Self {
            let map = HdmiMap(
                entries
                    .iter()
                    .map(|(p, l)| (p.to_string(), l.to_string()))
                    .collect::<BTreeMap<_, _>>(),
            );
            self.maps.lock().insert(host.to_string(), map);
            self
        }
    }

    #[async_trait]
    impl AgentTv for MockTv {
        async fn tv_status(&self, _: &str) -> AgentResult<TvStatus> {
            Err(AgentError::HttpStatus(500, "not scripted".into()))
        }
        async fn current_input(&self, _: &str) -> AgentResult<CurrentInput> {
            Ok(CurrentInput {
                current_input: Some(1),
            })
        }
        async fn hdmi_map(&self, host: &str) -> AgentResult<HdmiMap> {
            self.maps
                .lock()
                .get(host)
                .cloned()
                .ok_or_else(|| AgentError::HttpStatus(503, "unreachable".into()))
        }
        async fn switch_input(&self, host: &str, port: u32) -> AgentResult<()> {
            if self.switch_down.lock().contains(host) {
                return Err(AgentError::HttpStatus(500, "cec write failed".into()));
            }
            self.switches.lock().push((host.to_string(), port));
            Ok(())
        }
    }

    fn device(name: &str, host: &str) -> Device {
        Device {
            name: name.into(),
            host: host.into(),
        }
    }

    #[tokio::test]
    async fn label_resolves_against_each_devices_own_map() {
        let tv = Arc::new(
            MockTv::default()
                .with_map("10.0.0.1", &[("1", "Raspberry Pi"), ("2", "TV")])
                .with_map("10.0.0.2", &[("2", "TV"), ("3", "Raspberry Pi")]),
        );
        let switcher = HdmiSwitcher::new(Arc::clone(&tv) as Arc<dyn AgentTv>);

        let results = switcher
            .switch_all_to_label(
                &[device("A", "10.0.0.1"), device("B", "10.0.0.2")],
                "raspberry pi",
            )
            .await;

        assert_eq!(results[0].outcome, SwitchOutcome::Switched { port: 1 });
        assert_eq!(results[1].outcome, SwitchOutcome::Switched { port: 3 });

        let switches = tv.switches.lock();
        assert!(switches.contains(&("10.0.0.1".into(), 1)));
        assert!(switches.contains(&("10.0.0.2".into(), 3)));
    }

    #[tokio::test]
    async fn device_without_matching_label_is_skipped_silently() {
        let tv = Arc::new(
            MockTv::default()
                .with_map("10.0.0.1", &[("1", "Raspberry Pi")])
                .with_map("10.0.0.2", &[("1", "Other")]),
        );
        let switcher = HdmiSwitcher::new(Arc::clone(&tv) as Arc<dyn AgentTv>);

        let results = switcher
            .switch_all_to_label(
                &[device("A", "10.0.0.1"), device("B", "10.0.0.2")],
                "Raspberry Pi",
            )
            .await;

        assert_eq!(results[0].outcome, SwitchOutcome::Switched { port: 1 });
        assert_eq!(results[1].outcome, SwitchOutcome::Skipped);
    }

    #[tokio::test]
    async fn one_failing_device_never_blocks_the_others() {
        let tv = Arc::new(
            MockTv::default()
                .with_map("10.0.0.1", &[("1", "Raspberry Pi")])
                .with_map("10.0.0.2", &[("2", "Raspberry Pi")]),
        );
        tv.switch_down.lock().insert("10.0.0.1".into());
        let switcher = HdmiSwitcher::new(Arc::clone(&tv) as Arc<dyn AgentTv>);

        let results = switcher
            .switch_all_to_label(
                &[device("A", "10.0.0.1"), device("B", "10.0.0.2")],
                "Raspberry Pi",
            )
            .await;

        assert!(matches!(results[0].outcome, SwitchOutcome::Failed { .. }));
        assert_eq!(results[1].outcome, SwitchOutcome::Switched { port: 2 });
    }

    #[tokio::test]
    async fn unreachable_device_reports_error_state() {
        let tv = Arc::new(MockTv::default().with_map("10.0.0.1", &[("1", "TV")]));
        let switcher = HdmiSwitcher::new(Arc::clone(&tv) as Arc<dyn AgentTv>);

        let states = switcher
            .group_states(&[device("A", "10.0.0.1"), device("B", "10.0.0.9")])
            .await;

        assert!(states[0].error.is_none());
        assert_eq!(states[0].current_input, Some(1));
        assert!(states[1].error.is_some());
        assert!(states[1].hdmi_map.is_empty());
    }
}

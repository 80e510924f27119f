//! Fleet view maintenance.
//!
//! Responsibilities:
//! - Background refresh loop (registry pull, device polling)
//! - Last-known-good fallback when the directory service is unreachable
//! - Partitioning devices into grouped / ungrouped sets
//! - Garbage-collecting state for departed devices and deleted groups
//! - Manual refresh coordination and graceful shutdown

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::registry::{Device, DeviceDirectory};
use crate::services::group_coordinator::{
    AggregateGroupStatus, GroupCoordinator, GroupPlaybackState,
};
use crate::services::group_store::{Group, GroupStore};
use crate::services::status_poller::{DeviceSnapshot, StatusPoller};
use crate::state::{FleetState, RegistryHealth, RegistryHealthState};

// ─────────────────────────────────────────────────────────────────────────────
// Partitioning
// ─────────────────────────────────────────────────────────────────────────────

/// Registry devices split by group membership.
#[derive(Debug, Clone, Default)]
pub struct FleetPartition {
    /// Group id -> registry devices that group lists as members.
    pub grouped: BTreeMap<String, Vec<Device>>,
    /// Registry devices listed by no group.
    pub ungrouped: Vec<Device>,
}

/// Splits the registry device list by group membership.
///
/// A device is ungrouped iff no group lists its host at partition time.
/// Every registry device lands in exactly one of the two buckets; devices
/// a group references that have left the registry are simply absent.
#[must_use]
pub fn partition(devices: &[Device], groups: &BTreeMap<String, Group>) -> FleetPartition {
    let mut result = FleetPartition::default();

    for (id, group) in groups {
        let members: Vec<Device> = devices
            .iter()
            .filter(|d| group.devices.iter().any(|m| m.host == d.host))
            .cloned()
            .collect();
        result.grouped.insert(id.clone(), members);
    }

    result.ungrouped = devices
        .iter()
        .filter(|d| {
            !groups
                .values()
                .any(|g| g.devices.iter().any(|m| m.host == d.host))
        })
        .cloned()
        .collect();

    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Fleet View (API-facing)
// ─────────────────────────────────────────────────────────────────────────────

/// A device paired with its latest poll snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceView {
    #[serde(flatten)]
    pub device: Device,
    pub snapshot: Option<DeviceSnapshot>,
}

/// One group with its members, aggregate status, and playback state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupView {
    #[serde(flatten)]
    pub group: Group,
    pub members: Vec<DeviceView>,
    pub status: AggregateGroupStatus,
    pub playback: GroupPlaybackState,
}

/// The complete fleet view served to the dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetView {
    pub groups: Vec<GroupView>,
    pub ungrouped: Vec<DeviceView>,
    pub registry: RegistryHealthState,
}

// ─────────────────────────────────────────────────────────────────────────────
// Monitor
// ─────────────────────────────────────────────────────────────────────────────

/// Keeps the fleet view live: pulls the registry and polls devices on a
/// fixed cadence, falling back to the last-known-good list when the
/// directory is unreachable.
pub struct FleetMonitor {
    directory: Arc<dyn DeviceDirectory>,
    store: Arc<GroupStore>,
    poller: Arc<StatusPoller>,
    coordinator: Arc<GroupCoordinator>,
    state: Arc<FleetState>,
    refresh_interval_secs: u64,
    refresh_notify: Arc<Notify>,
    /// Token to signal the background loop to stop.
    cancel_token: CancellationToken,
}

impl FleetMonitor {
    /// Creates a new monitor.
    #[must_use]
    pub fn new(
        directory: Arc<dyn DeviceDirectory>,
        store: Arc<GroupStore>,
        poller: Arc<StatusPoller>,
        coordinator: Arc<GroupCoordinator>,
        state: Arc<FleetState>,
        refresh_interval_secs: u64,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            directory,
            store,
            poller,
            coordinator,
            state,
            refresh_interval_secs,
            refresh_notify: Arc::new(Notify::new()),
            cancel_token,
        }
    }

    /// Requests an out-of-band refresh (e.g. after a group mutation, so the
    /// partition is never served stale across a store change).
    pub fn trigger_refresh(&self) {
        self.refresh_notify.notify_one();
    }

    /// Starts the background refresh loop.
    ///
    /// The loop runs one cycle immediately, then on every interval tick or
    /// manual refresh (which resets the interval), and stops when the
    /// cancellation token fires. In-flight polls complete and their results
    /// are discarded with the rest of the state.
    pub fn start(self: Arc<Self>) {
        let cancel_token = self.cancel_token.clone();
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(self.refresh_interval_secs));

            loop {
                let is_manual_refresh = tokio::select! {
                    _ = cancel_token.cancelled() => {
                        log::info!("[FleetMonitor] Shutting down refresh loop");
                        break;
                    }
                    _ = interval.tick() => false,
                    _ = self.refresh_notify.notified() => {
                        log::debug!("[FleetMonitor] Manual refresh triggered");
                        true
                    }
                };

                // Push back the next automatic refresh after a manual one
                if is_manual_refresh {
                    interval.reset();
                }

                self.refresh_cycle().await;
            }
        });
    }

    /// Performs a single refresh cycle.
    ///
    /// Pulls the registry (last-known-good on failure), reads the group
    /// store, polls every known device under bounded concurrency, and
    /// garbage-collects state for devices and groups that disappeared.
    pub async fn refresh_cycle(&self) {
        let devices = match self.directory.list_devices().await {
            Ok(devices) => {
                log::debug!(
                    "[FleetMonitor] Registry returned {} device(s)",
                    devices.len()
                );
                self.state.replace_devices(devices.clone());
                self.state.set_registry_health(RegistryHealth::Ok, None);
                devices
            }
            Err(e) => {
                // Keep showing the cached list; surface the error for this
                // cycle only.
                log::warn!(
                    "[FleetMonitor] Registry poll failed: {} (keeping last-known-good list)",
                    e
                );
                self.state
                    .set_registry_health(RegistryHealth::Degraded, Some(e.to_string()));
                self.state.devices()
            }
        };

        let groups = self.store.list();
        let parts = partition(&devices, &groups);
        log::debug!(
            "[FleetMonitor] Partition: {} group(s), {} ungrouped device(s)",
            parts.grouped.len(),
            parts.ungrouped.len()
        );

        self.poller.poll_devices(&devices).await;

        // Staleness control: drop per-device and per-group state that no
        // longer corresponds to anything real.
        let valid_hosts: HashSet<String> = devices.iter().map(|d| d.host.clone()).collect();
        self.state.cleanup_stale_snapshots(&valid_hosts);

        let valid_group_ids: HashSet<String> = groups.keys().cloned().collect();
        self.coordinator.cleanup_stale(&valid_group_ids);
    }

    /// Builds the complete fleet view from current state.
    ///
    /// Recomputed on every call from the registry cache, the group store,
    /// and the snapshot map - never cached across a group mutation.
    #[must_use]
    pub fn fleet_view(&self) -> FleetView {
        let devices = self.state.devices();
        let groups = self.store.list();
        let parts = partition(&devices, &groups);

        let group_views = groups
            .iter()
            .map(|(id, group)| {
                let members = parts
                    .grouped
                    .get(id)
                    .map(|members| {
                        members
                            .iter()
                            .map(|d| self.device_view(d))
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default();

                GroupView {
                    group: group.clone(),
                    members,
                    status: self.coordinator.aggregate_status(group),
                    playback: self.coordinator.playback_state(id),
                }
            })
            .collect();

        FleetView {
            groups: group_views,
            ungrouped: parts
                .ungrouped
                .iter()
                .map(|d| self.device_view(d))
                .collect(),
            registry: self.state.registry_health(),
        }
    }

    fn device_view(&self, device: &Device) -> DeviceView {
        DeviceView {
            device: device.clone(),
            snapshot: self.state.snapshot(&device.host),
        }
    }

    /// Stops the background loop (for graceful shutdown).
    pub fn shutdown(&self) {
        log::info!("[FleetMonitor] Initiating shutdown");
        self.cancel_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::transport::AgentResult;
    use crate::agent::{
        AgentApi, AgentError, AgentPlayback, AgentSchedule, AgentTv, CurrentInput, DeviceStatus,
        HdmiMap, TvPower, TvStatus, WeeklySchedule,
    };
    use crate::registry::RegistryError;
    use crate::utils::now_millis;
    use async_trait::async_trait;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Directory fake with a scripted device list and a failure switch.
    #[derive(Default)]
    struct MockDirectory {
        devices: Mutex<Vec<Device>>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl DeviceDirectory for MockDirectory {
        async fn list_devices(&self) -> Result<Vec<Device>, RegistryError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(RegistryError::HttpStatus(503));
            }
            Ok(self.devices.lock().clone())
        }
    }

    /// Agent fake answering every poll successfully.
    struct HealthyAgent;

    #[async_trait]
    impl AgentPlayback for HealthyAgent {
        async fn status(&self, _: &str) -> AgentResult<DeviceStatus> {
            Ok(DeviceStatus::default())
        }
        async fn play(&self, _: &str, _: &str) -> AgentResult<()> {
            Ok(())
        }
        async fn pause(&self, _: &str) -> AgentResult<()> {
            Ok(())
        }
        async fn resume(&self, _: &str) -> AgentResult<()> {
            Ok(())
        }
        async fn stop(&self, _: &str) -> AgentResult<()> {
            Ok(())
        }
        async fn upload(&self, _: &str, _: &str, _: Bytes) -> AgentResult<()> {
            Ok(())
        }
        async fn delete_video(&self, _: &str, _: &str) -> AgentResult<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl AgentTv for HealthyAgent {
        async fn tv_status(&self, _: &str) -> AgentResult<TvStatus> {
            Ok(TvStatus {
                status: TvPower::On,
                timestamp: None,
            })
        }
        async fn current_input(&self, _: &str) -> AgentResult<CurrentInput> {
            Ok(CurrentInput {
                current_input: None,
            })
        }
        async fn hdmi_map(&self, _: &str) -> AgentResult<HdmiMap> {
            Ok(HdmiMap::default())
        }
        async fn switch_input(&self, _: &str, _: u32) -> AgentResult<()> {
            Err(AgentError::HttpStatus(500, "not scripted".into()))
        }
    }

    #[async_trait]
    impl AgentSchedule for HealthyAgent {
        async fn get_schedule(&self, _: &str) -> AgentResult<WeeklySchedule> {
            Ok(WeeklySchedule::default())
        }
        async fn set_schedule(&self, _: &str, _: &WeeklySchedule) -> AgentResult<()> {
            Ok(())
        }
        async fn clear_schedule(&self, _: &str) -> AgentResult<()> {
            Ok(())
        }
    }

    fn device(name: &str, host: &str) -> Device {
        Device {
            name: name.into(),
            host: host.into(),
        }
    }

    fn group_with(id: &str, devices: Vec<Device>) -> Group {
        Group {
            id: id.into(),
            name: id.into(),
            devices,
            created_at: now_millis(),
        }
    }

    struct Harness {
        directory: Arc<MockDirectory>,
        store: Arc<GroupStore>,
        monitor: FleetMonitor,
        state: Arc<FleetState>,
        _dir: tempfile::TempDir,
    }

    fn harness(devices: Vec<Device>) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let directory = Arc::new(MockDirectory::default());
        *directory.devices.lock() = devices;

        let agent: Arc<dyn AgentApi> = Arc::new(HealthyAgent);
        let state = Arc::new(FleetState::default());
        let store = Arc::new(GroupStore::open(dir.path().join("groups.json")));
        let poller = Arc::new(StatusPoller::new(
            Arc::clone(&agent),
            Arc::clone(&state),
            4,
        ));
        let coordinator = Arc::new(GroupCoordinator::new(
            Arc::clone(&agent),
            Arc::clone(&poller),
            Arc::clone(&state),
            Duration::from_secs(5),
        ));
        let monitor = FleetMonitor::new(
            Arc::clone(&directory) as Arc<dyn DeviceDirectory>,
            Arc::clone(&store),
            poller,
            coordinator,
            Arc::clone(&state),
            60,
            CancellationToken::new(),
        );

        Harness {
            directory,
            store,
            monitor,
            state,
            _dir: dir,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Partitioning
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn every_device_lands_in_exactly_one_bucket() {
        let devices = vec![
            device("A", "10.0.0.1"),
            device("B", "10.0.0.2"),
            device("C", "10.0.0.3"),
            device("D", "10.0.0.4"),
        ];
        let mut groups = BTreeMap::new();
        groups.insert(
            "group_1".to_string(),
            group_with("group_1", vec![device("A", "10.0.0.1"), device("B", "10.0.0.2")]),
        );

        let parts = partition(&devices, &groups);

        let grouped_hosts: HashSet<&str> = parts
            .grouped
            .values()
            .flatten()
            .map(|d| d.host.as_str())
            .collect();
        let ungrouped_hosts: HashSet<&str> =
            parts.ungrouped.iter().map(|d| d.host.as_str()).collect();

        // Disjoint buckets whose union is the registry set
        assert!(grouped_hosts.is_disjoint(&ungrouped_hosts));
        let all: HashSet<&str> = grouped_hosts.union(&ungrouped_hosts).copied().collect();
        let expected: HashSet<&str> = devices.iter().map(|d| d.host.as_str()).collect();
        assert_eq!(all, expected);
    }

    #[test]
    fn group_member_absent_from_registry_is_not_resurrected() {
        let devices = vec![device("A", "10.0.0.1")];
        let mut groups = BTreeMap::new();
        groups.insert(
            "group_1".to_string(),
            group_with(
                "group_1",
                vec![device("A", "10.0.0.1"), device("Gone", "10.0.0.9")],
            ),
        );

        let parts = partition(&devices, &groups);
        assert_eq!(parts.grouped["group_1"].len(), 1);
        assert!(parts.ungrouped.is_empty());
    }

    #[test]
    fn partition_with_no_groups_is_all_ungrouped() {
        let devices = vec![device("A", "10.0.0.1"), device("B", "10.0.0.2")];
        let parts = partition(&devices, &BTreeMap::new());
        assert!(parts.grouped.is_empty());
        assert_eq!(parts.ungrouped.len(), 2);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Registry fallback
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn registry_failure_keeps_last_known_good_list() {
        // Scenario: one successful poll caches 4 devices; the next poll
        // fails and the cached list survives unchanged; the poll after
        // that succeeds with a different list and replaces it atomically.
        let h = harness(vec![
            device("A", "10.0.0.1"),
            device("B", "10.0.0.2"),
            device("C", "10.0.0.3"),
            device("D", "10.0.0.4"),
        ]);

        h.monitor.refresh_cycle().await;
        assert_eq!(h.state.devices().len(), 4);
        assert_eq!(h.state.registry_health().health, RegistryHealth::Ok);

        h.directory.fail.store(true, Ordering::SeqCst);
        h.monitor.refresh_cycle().await;
        assert_eq!(h.state.devices().len(), 4);
        assert_eq!(h.state.registry_health().health, RegistryHealth::Degraded);

        h.directory.fail.store(false, Ordering::SeqCst);
        *h.directory.devices.lock() = vec![device("A", "10.0.0.1"), device("E", "10.0.0.5")];
        h.monitor.refresh_cycle().await;
        assert_eq!(h.state.devices().len(), 2);
        assert_eq!(h.state.registry_health().health, RegistryHealth::Ok);
    }

    #[tokio::test]
    async fn departed_devices_lose_their_snapshots() {
        let h = harness(vec![device("A", "10.0.0.1"), device("B", "10.0.0.2")]);

        h.monitor.refresh_cycle().await;
        assert!(h.state.snapshot("10.0.0.2").is_some());

        *h.directory.devices.lock() = vec![device("A", "10.0.0.1")];
        h.monitor.refresh_cycle().await;
        assert!(h.state.snapshot("10.0.0.1").is_some());
        assert!(h.state.snapshot("10.0.0.2").is_none());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Fleet view
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn fleet_view_reflects_group_mutations_immediately() {
        let h = harness(vec![device("A", "10.0.0.1"), device("B", "10.0.0.2")]);
        h.monitor.refresh_cycle().await;

        let view = h.monitor.fleet_view();
        assert!(view.groups.is_empty());
        assert_eq!(view.ungrouped.len(), 2);

        let created = h
            .store
            .create("Wall", vec![device("A", "10.0.0.1")])
            .unwrap();

        // No refresh cycle needed - the view recomputes the partition
        let view = h.monitor.fleet_view();
        assert_eq!(view.groups.len(), 1);
        assert_eq!(view.groups[0].group.id, created.id);
        assert_eq!(view.groups[0].members.len(), 1);
        assert_eq!(view.ungrouped.len(), 1);
        assert_eq!(view.ungrouped[0].device.host, "10.0.0.2");
    }
}

//! Group command fan-out and status aggregation.
//!
//! Responsibilities:
//! - Fan one logical command out to every member device concurrently
//! - Join-barrier collection of per-device outcomes
//! - All-or-report evaluation: commit optimistic state only on full success
//! - Aggregate error composition with a per-device breakdown
//! - Post-command status refresh so the view reflects device-reported truth
//! - Aggregation of member snapshots into one group status

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::agent::AgentApi;
use crate::error::{DeviceFailure, MarqueeError, MarqueeResult};
use crate::registry::Device;
use crate::services::group_store::Group;
use crate::services::status_poller::StatusPoller;
use crate::state::FleetState;

// ─────────────────────────────────────────────────────────────────────────────
// Command Types
// ─────────────────────────────────────────────────────────────────────────────

/// One logical command fanned out to every member of a group.
#[derive(Debug, Clone)]
pub enum GroupCommand {
    /// Play the named video on every member. The coordinator does not
    /// verify the file exists on each member - it relays and reports.
    Play { video_name: String },
    /// Pause playback on every member.
    Pause,
    /// Resume paused playback on every member.
    Resume,
    /// Stop playback on every member.
    Stop,
    /// Delete the named video from every member. Partial deletion is
    /// surfaced, not reconciled.
    Delete { video_name: String },
    /// Upload a file to every member. Members that succeed keep their copy
    /// even when siblings fail - there is no rollback.
    Upload { file_name: String, data: Bytes },
}

impl GroupCommand {
    /// Short command label used in logs and error messages.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Play { .. } => "play",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Stop => "stop",
            Self::Delete { .. } => "delete",
            Self::Upload { .. } => "upload",
        }
    }
}

/// Outcome of one command execution on a single member device.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    /// Human-readable device name.
    pub device: String,
    /// Device host (identity).
    pub host: String,
    /// Whether the device accepted the command.
    pub success: bool,
    /// Error message (on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Derived State Types
// ─────────────────────────────────────────────────────────────────────────────

/// One coherent status derived from a complete poll pass over a group's
/// current members. Never stored, never incrementally patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateGroupStatus {
    /// Every member answered its last poll.
    pub is_active: bool,
    /// At least one member is playing.
    pub is_playing: bool,
    /// At least one member is paused.
    pub is_paused: bool,
    /// Union of member video libraries, deduplicated (first-seen order).
    pub available_videos: Vec<String>,
}

/// Coordinator-held ephemeral state for one group.
///
/// `current_video` is deliberately optimistic-on-success: committed when a
/// play command succeeds on every member, cleared by stop, and left
/// untouched by any partial failure. Everything else about a group is
/// re-derived from device-reported truth on each refresh.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPlaybackState {
    /// Video committed by the last fully-successful play.
    pub current_video: Option<String>,
    /// Aggregate error from the last failed command, if still displayed.
    pub last_error: Option<String>,
}

/// Internal per-group runtime entry. The epoch guards delayed error
/// clearing: a timer only clears the error it was scheduled for.
#[derive(Debug, Default)]
struct GroupRuntime {
    playback: GroupPlaybackState,
    error_epoch: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Coordinator
// ─────────────────────────────────────────────────────────────────────────────

/// Executes group commands with partial-failure semantics and derives
/// aggregate group status.
pub struct GroupCoordinator {
    agent: Arc<dyn AgentApi>,
    poller: Arc<StatusPoller>,
    state: Arc<FleetState>,
    /// Per-group ephemeral playback state, shared with error-clear timers.
    runtime: Arc<DashMap<String, GroupRuntime>>,
    /// Per-group command serialization. Holding the lock across
    /// dispatch/collect/evaluate means two overlapping commands on one
    /// group can never interleave their commit steps.
    command_locks: DashMap<String, Arc<Mutex<()>>>,
    /// How long an aggregate error stays attached to a group.
    error_display: Duration,
}

impl GroupCoordinator {
    /// Creates a new coordinator.
    ///
    /// # Arguments
    /// * `agent` - Device-agent client used for command dispatch
    /// * `poller` - Poller used for the post-command refresh
    /// * `state` - Shared fleet state holding member snapshots
    /// * `error_display` - Display duration for aggregate errors
    #[must_use]
    pub fn new(
        agent: Arc<dyn AgentApi>,
        poller: Arc<StatusPoller>,
        state: Arc<FleetState>,
        error_display: Duration,
    ) -> Self {
        Self {
            agent,
            poller,
            state,
            runtime: Arc::new(DashMap::new()),
            command_locks: DashMap::new(),
            error_display,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Command Execution
    // ─────────────────────────────────────────────────────────────────────────

    /// Runs one logical command against every member of a group.
    ///
    /// Dispatches to all members concurrently, waits for every member to
    /// settle (join barrier, not a race), then evaluates:
    ///
    /// - All succeeded: commit the optimistic state change (play records
    ///   the group's current video, stop clears it) and clear any prior
    ///   group error.
    /// - Any failure: record and return an aggregate error enumerating
    ///   `{device}: {detail}` for each failing device; the optimistic
    ///   state is NOT committed.
    ///
    /// Either way, a full status re-poll of the members runs afterwards so
    /// displayed state reflects what the devices actually report.
    ///
    /// Commands against the same group are serialized; commands against
    /// different groups run independently.
    pub async fn run(
        &self,
        group: &Group,
        command: GroupCommand,
    ) -> MarqueeResult<Vec<CommandResult>> {
        let lock = self.command_lock(&group.id);
        let _guard = lock.lock().await;

        log::info!(
            "[Coordinator] Dispatching {} to group {} ({} member(s))",
            command.label(),
            group.id,
            group.devices.len()
        );

        let dispatches = group
            .devices
            .iter()
            .map(|device| self.dispatch(device, &command));
        let results = join_all(dispatches).await;

        let failures: Vec<DeviceFailure> = results
            .iter()
            .filter(|r| !r.success)
            .map(|r| DeviceFailure {
                device: r.device.clone(),
                detail: r.error.clone().unwrap_or_else(|| "unknown error".into()),
            })
            .collect();

        let outcome = if failures.is_empty() {
            self.commit(&group.id, &command);
            self.clear_error(&group.id);
            log::info!(
                "[Coordinator] {} succeeded on all {} member(s) of group {}",
                command.label(),
                results.len(),
                group.id
            );
            Ok(results)
        } else {
            let error = MarqueeError::CommandFailed {
                command: command.label().to_string(),
                failures,
            };
            log::warn!("[Coordinator] Group {}: {}", group.id, error);
            self.record_error(&group.id, error.to_string());
            Err(error)
        };

        // Refresh member snapshots regardless of outcome, so the next
        // aggregate read reflects device-reported truth rather than the
        // command's assumed effect.
        self.poller.poll_devices(&group.devices).await;

        outcome
    }

    /// Executes one command against one device, converting any error into
    /// data. This is the fan-out boundary: nothing propagates past it.
    async fn dispatch(&self, device: &Device, command: &GroupCommand) -> CommandResult {
        let result = match command {
            GroupCommand::Play { video_name } => self.agent.play(&device.host, video_name).await,
            GroupCommand::Pause => self.agent.pause(&device.host).await,
            GroupCommand::Resume => self.agent.resume(&device.host).await,
            GroupCommand::Stop => self.agent.stop(&device.host).await,
            GroupCommand::Delete { video_name } => {
                self.agent.delete_video(&device.host, video_name).await
            }
            GroupCommand::Upload { file_name, data } => {
                self.agent
                    .upload(&device.host, file_name, data.clone())
                    .await
            }
        };

        match result {
            Ok(()) => CommandResult {
                device: device.name.clone(),
                host: device.host.clone(),
                success: true,
                error: None,
            },
            Err(e) => {
                log::warn!(
                    "[Coordinator] {} failed on {} ({}): {}",
                    command.label(),
                    device.name,
                    device.host,
                    e
                );
                CommandResult {
                    device: device.name.clone(),
                    host: device.host.clone(),
                    success: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Commits the optimistic state change for a fully-successful command.
    fn commit(&self, group_id: &str, command: &GroupCommand) {
        match command {
            GroupCommand::Play { video_name } => {
                let mut entry = self.runtime.entry(group_id.to_string()).or_default();
                entry.playback.current_video = Some(video_name.clone());
            }
            GroupCommand::Stop => {
                let mut entry = self.runtime.entry(group_id.to_string()).or_default();
                entry.playback.current_video = None;
            }
            _ => {}
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Error Display Window
    // ─────────────────────────────────────────────────────────────────────────

    /// Records an aggregate error against a group and schedules its
    /// removal after the display duration.
    ///
    /// The epoch check ensures an older timer never clears a newer error:
    /// each recorded error bumps the epoch, and the timer only clears if
    /// the epoch still matches when it fires.
    fn record_error(&self, group_id: &str, message: String) {
        let epoch = {
            let mut entry = self.runtime.entry(group_id.to_string()).or_default();
            entry.playback.last_error = Some(message);
            entry.error_epoch += 1;
            entry.error_epoch
        };

        let runtime = Arc::clone(&self.runtime);
        let group_id = group_id.to_string();
        let display = self.error_display;
        tokio::spawn(async move {
            tokio::time::sleep(display).await;
            if let Some(mut entry) = runtime.get_mut(&group_id) {
                if entry.error_epoch == epoch {
                    entry.playback.last_error = None;
                }
            }
        });
    }

    /// Clears any displayed error immediately (on full command success).
    fn clear_error(&self, group_id: &str) {
        if let Some(mut entry) = self.runtime.get_mut(group_id) {
            entry.playback.last_error = None;
            entry.error_epoch += 1;
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Derived State
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns the coordinator-held playback state for a group.
    #[must_use]
    pub fn playback_state(&self, group_id: &str) -> GroupPlaybackState {
        self.runtime
            .get(group_id)
            .map(|r| r.playback.clone())
            .unwrap_or_default()
    }

    /// Computes the aggregate status of a group from the current member
    /// snapshots.
    ///
    /// Always a full recomputation over the group's current members - the
    /// aggregate is never patched incrementally, so it cannot drift from
    /// the per-device entries it is derived from.
    #[must_use]
    pub fn aggregate_status(&self, group: &Group) -> AggregateGroupStatus {
        let mut is_active = true;
        let mut is_playing = false;
        let mut is_paused = false;
        let mut available_videos: Vec<String> = Vec::new();

        for device in &group.devices {
            let snapshot = self.state.snapshot(&device.host);
            match snapshot.as_ref().and_then(|s| s.status.as_ref()) {
                Some(status) => {
                    is_playing |= status.is_playing;
                    is_paused |= status.is_paused;
                    for video in &status.available_videos {
                        if !available_videos.contains(video) {
                            available_videos.push(video.clone());
                        }
                    }
                }
                None => is_active = false,
            }
        }

        AggregateGroupStatus {
            is_active: is_active && !group.devices.is_empty(),
            is_playing,
            is_paused,
            available_videos,
        }
    }

    /// Drops runtime state and locks for groups that no longer exist.
    pub fn cleanup_stale(&self, valid_group_ids: &HashSet<String>) {
        self.runtime.retain(|id, _| valid_group_ids.contains(id));
        self.command_locks
            .retain(|id, _| valid_group_ids.contains(id));
    }

    /// Gets or creates the command serialization lock for a group.
    fn command_lock(&self, group_id: &str) -> Arc<Mutex<()>> {
        self.command_locks
            .entry(group_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::transport::AgentResult;
    use crate::agent::{
        AgentError, AgentPlayback, AgentSchedule, AgentTv, CurrentInput, DeviceStatus, HdmiMap,
        TvPower, TvStatus, WeeklySchedule,
    };
    use crate::services::status_poller::DeviceSnapshot;
    use crate::utils::now_millis;
    use async_trait::async_trait;
    use parking_lot::Mutex as SyncMutex;
    use std::collections::{HashMap, HashSet};

    /// Scripted agent: commands fail on listed hosts, calls are recorded.
    #[derive(Default)]
    struct MockAgent {
        /// Hosts whose playback commands fail, with the error body.
        failing: SyncMutex<HashMap<String, String>>,
        /// Status returned per host during refresh polls.
        statuses: SyncMutex<HashMap<String, DeviceStatus>>,
        /// Recorded (host, video) play calls.
        plays: SyncMutex<Vec<(String, String)>>,
        /// Recorded (host, file) uploads that reached the device.
        uploads: SyncMutex<Vec<(String, String)>>,
        /// Recorded delete calls.
        deletes: SyncMutex<Vec<(String, String)>>,
    }

    impl MockAgent {
        fn fail(&self, host: &str, detail: &str) {
            self.failing.lock().insert(host.into(), detail.into());
        }

        fn recover(&self, host: &str) {
            self.failing.lock().remove(host);
        }

        fn check(&self, host: &str) -> AgentResult<()> {
            match self.failing.lock().get(host) {
                Some(detail) => Err(AgentError::HttpStatus(503, detail.clone())),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl AgentPlayback for MockAgent {
        async fn status(&self, host: &str) -> AgentResult<DeviceStatus> {
            self.check(host)?;
            Ok(self.statuses.lock().get(host).cloned().unwrap_or_default())
        }
        async fn play(&self, host: &str, video_name: &str) -> AgentResult<()> {
            self.check(host)?;
            self.plays.lock().push((host.into(), video_name.into()));
            Ok(())
        }
        async fn pause(&self, host: &str) -> AgentResult<()> {
            self.check(host)
        }
        async fn resume(&self, host: &str) -> AgentResult<()> {
            self.check(host)
        }
        async fn stop(&self, host: &str) -> AgentResult<()> {
            self.check(host)
        }
        async fn upload(&self, host: &str, file_name: &str, _: Bytes) -> AgentResult<()> {
            self.check(host)?;
            self.uploads.lock().push((host.into(), file_name.into()));
            Ok(())
        }
        async fn delete_video(&self, host: &str, video_name: &str) -> AgentResult<()> {
            self.check(host)?;
            self.deletes.lock().push((host.into(), video_name.into()));
            Ok(())
        }
    }

    #[async_trait]
    impl AgentTv for MockAgent {
        async fn tv_status(&self, host: &str) -> AgentResult<TvStatus> {
            self.check(host)?;
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
            Ok(())
        }
    }

    #[async_trait]
    impl AgentSchedule for MockAgent {
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

    fn group(devices: Vec<Device>) -> Group {
        Group {
            id: "group_test".into(),
            name: "Test Wall".into(),
            devices,
            created_at: now_millis(),
        }
    }

    struct Harness {
        agent: Arc<MockAgent>,
        coordinator: GroupCoordinator,
        state: Arc<FleetState>,
    }

    fn harness() -> Harness {
        let agent = Arc::new(MockAgent::default());
        let state = Arc::new(FleetState::default());
        let poller = Arc::new(StatusPoller::new(
            Arc::clone(&agent) as Arc<dyn AgentApi>,
            Arc::clone(&state),
            4,
        ));
        let coordinator = GroupCoordinator::new(
            Arc::clone(&agent) as Arc<dyn AgentApi>,
            poller,
            Arc::clone(&state),
            Duration::from_secs(5),
        );
        Harness {
            agent,
            coordinator,
            state,
        }
    }

    fn status(playing: bool, paused: bool, videos: &[&str]) -> DeviceStatus {
        DeviceStatus {
            current_video: None,
            is_playing: playing,
            is_paused: paused,
            available_videos: videos.iter().map(|v| v.to_string()).collect(),
            date_uploaded: Vec::new(),
        }
    }

    fn seed_snapshot(state: &FleetState, host: &str, status: Option<DeviceStatus>) {
        state.record_snapshot(
            host.into(),
            DeviceSnapshot {
                status,
                tv: None,
                error: None,
                polled_at: now_millis(),
            },
        );
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Commit semantics
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn play_on_all_members_commits_current_video() {
        let h = harness();
        let g = group(vec![device("X", "10.0.0.1"), device("Y", "10.0.0.2")]);

        let results = h
            .coordinator
            .run(
                &g,
                GroupCommand::Play {
                    video_name: "a.mp4".into(),
                },
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success));
        assert_eq!(
            h.coordinator.playback_state(&g.id).current_video.as_deref(),
            Some("a.mp4")
        );
    }

    #[tokio::test]
    async fn partial_play_failure_names_only_the_failing_device() {
        // Scenario: X succeeds, Y fails with a connectivity error. The
        // command reports failure naming Y, the committed current video
        // stays at its pre-command value, and the refresh still ran.
        let h = harness();
        let g = group(vec![device("X", "10.0.0.1"), device("Y", "10.0.0.2")]);

        // Establish a committed video first
        h.coordinator
            .run(
                &g,
                GroupCommand::Play {
                    video_name: "old.mp4".into(),
                },
            )
            .await
            .unwrap();

        h.agent.fail("10.0.0.2", "connection refused");
        let err = h
            .coordinator
            .run(
                &g,
                GroupCommand::Play {
                    video_name: "a.mp4".into(),
                },
            )
            .await
            .unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("Y: "));
        assert!(!msg.contains("X: "));

        // No partial commit
        assert_eq!(
            h.coordinator.playback_state(&g.id).current_video.as_deref(),
            Some("old.mp4")
        );

        // X actually received the play command (no rollback of successes)
        assert!(h
            .agent
            .plays
            .lock()
            .contains(&("10.0.0.1".into(), "a.mp4".into())));
    }

    #[tokio::test]
    async fn stop_clears_current_video_and_is_idempotent() {
        let h = harness();
        let g = group(vec![device("X", "10.0.0.1"), device("Y", "10.0.0.2")]);

        h.coordinator
            .run(
                &g,
                GroupCommand::Play {
                    video_name: "a.mp4".into(),
                },
            )
            .await
            .unwrap();

        h.coordinator.run(&g, GroupCommand::Stop).await.unwrap();
        let after_once = h.coordinator.playback_state(&g.id);
        let agg_once = h.coordinator.aggregate_status(&g);

        h.coordinator.run(&g, GroupCommand::Stop).await.unwrap();
        let after_twice = h.coordinator.playback_state(&g.id);
        let agg_twice = h.coordinator.aggregate_status(&g);

        assert_eq!(after_once.current_video, None);
        assert_eq!(after_twice.current_video, None);
        assert_eq!(agg_once, agg_twice);
    }

    #[tokio::test]
    async fn partial_delete_is_surfaced_not_reconciled() {
        // Scenario: only X has the file; Y's agent answers not-found. The
        // aggregate result is a partial failure naming only Y, and X's
        // delete stands.
        let h = harness();
        let g = group(vec![device("X", "10.0.0.1"), device("Y", "10.0.0.2")]);

        h.agent.fail("10.0.0.2", "Video not found");
        let err = h
            .coordinator
            .run(
                &g,
                GroupCommand::Delete {
                    video_name: "movie.mp4".into(),
                },
            )
            .await
            .unwrap_err();

        match err {
            MarqueeError::CommandFailed { failures, .. } => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].device, "Y");
            }
            other => panic!("expected CommandFailed, got {:?}", other),
        }

        assert!(h
            .agent
            .deletes
            .lock()
            .contains(&("10.0.0.1".into(), "movie.mp4".into())));
    }

    #[tokio::test]
    async fn upload_keeps_successful_copies_on_partial_failure() {
        let h = harness();
        let g = group(vec![device("X", "10.0.0.1"), device("Y", "10.0.0.2")]);

        h.agent.fail("10.0.0.2", "disk full");
        let err = h
            .coordinator
            .run(
                &g,
                GroupCommand::Upload {
                    file_name: "promo.mp4".into(),
                    data: Bytes::from_static(b"fake video"),
                },
            )
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Y: disk full"));
        // X's copy is kept; nothing attempts a compensating delete
        assert!(h
            .agent
            .uploads
            .lock()
            .contains(&("10.0.0.1".into(), "promo.mp4".into())));
        assert!(h.agent.deletes.lock().is_empty());
    }

    #[tokio::test]
    async fn command_refreshes_member_snapshots_even_on_failure() {
        let h = harness();
        let g = group(vec![device("X", "10.0.0.1"), device("Y", "10.0.0.2")]);
        h.agent
            .statuses
            .lock()
            .insert("10.0.0.1".into(), status(true, false, &["a.mp4"]));

        h.agent.fail("10.0.0.2", "connection refused");
        let _ = h
            .coordinator
            .run(
                &g,
                GroupCommand::Play {
                    video_name: "a.mp4".into(),
                },
            )
            .await;

        // Refresh ran for both members: X reports playing, Y is marked down
        assert!(h.state.snapshot("10.0.0.1").unwrap().status.unwrap().is_playing);
        assert!(!h.state.snapshot("10.0.0.2").unwrap().is_reachable());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Aggregate status
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn aggregate_is_or_over_playback_and_and_over_reachability() {
        let h = harness();
        let g = group(vec![device("X", "10.0.0.1"), device("Y", "10.0.0.2")]);

        seed_snapshot(&h.state, "10.0.0.1", Some(status(true, false, &["a.mp4", "b.mp4"])));
        seed_snapshot(&h.state, "10.0.0.2", Some(status(false, true, &["b.mp4", "c.mp4"])));

        let agg = h.coordinator.aggregate_status(&g);
        assert!(agg.is_active);
        assert!(agg.is_playing);
        assert!(agg.is_paused);
        assert_eq!(agg.available_videos, vec!["a.mp4", "b.mp4", "c.mp4"]);
    }

    #[tokio::test]
    async fn one_unreachable_member_deactivates_the_aggregate() {
        let h = harness();
        let g = group(vec![device("X", "10.0.0.1"), device("Y", "10.0.0.2")]);

        seed_snapshot(&h.state, "10.0.0.1", Some(status(true, false, &["a.mp4"])));
        seed_snapshot(&h.state, "10.0.0.2", None);

        let agg = h.coordinator.aggregate_status(&g);
        assert!(!agg.is_active);
        // The reachable member still contributes
        assert!(agg.is_playing);
        assert_eq!(agg.available_videos, vec!["a.mp4"]);
    }

    #[tokio::test]
    async fn member_never_polled_counts_as_unreachable() {
        let h = harness();
        let g = group(vec![device("X", "10.0.0.1")]);

        let agg = h.coordinator.aggregate_status(&g);
        assert!(!agg.is_active);
        assert!(!agg.is_playing);
        assert!(agg.available_videos.is_empty());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Error display window
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn aggregate_error_clears_after_display_duration() {
        let h = harness();
        let g = group(vec![device("Y", "10.0.0.2")]);

        h.agent.fail("10.0.0.2", "connection refused");
        let _ = h.coordinator.run(&g, GroupCommand::Pause).await;
        assert!(h.coordinator.playback_state(&g.id).last_error.is_some());

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(h.coordinator.playback_state(&g.id).last_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn older_clear_timer_never_clobbers_a_newer_error() {
        let h = harness();
        let g = group(vec![device("Y", "10.0.0.2")]);
        h.agent.fail("10.0.0.2", "first failure");

        let _ = h.coordinator.run(&g, GroupCommand::Pause).await;

        // Second failure three seconds later restarts the display window
        tokio::time::sleep(Duration::from_secs(3)).await;
        h.agent.fail("10.0.0.2", "second failure");
        let _ = h.coordinator.run(&g, GroupCommand::Pause).await;

        // First timer fires at t=5s; the newer error must survive it
        tokio::time::sleep(Duration::from_secs(3)).await;
        let state = h.coordinator.playback_state(&g.id);
        assert!(state.last_error.unwrap().contains("second failure"));

        // Second timer fires at t=8s
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(h.coordinator.playback_state(&g.id).last_error.is_none());
    }

    #[tokio::test]
    async fn full_success_clears_a_displayed_error() {
        let h = harness();
        let g = group(vec![device("Y", "10.0.0.2")]);

        h.agent.fail("10.0.0.2", "connection refused");
        let _ = h.coordinator.run(&g, GroupCommand::Pause).await;
        assert!(h.coordinator.playback_state(&g.id).last_error.is_some());

        h.agent.recover("10.0.0.2");
        h.coordinator.run(&g, GroupCommand::Pause).await.unwrap();
        assert!(h.coordinator.playback_state(&g.id).last_error.is_none());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn cleanup_drops_state_for_deleted_groups() {
        let h = harness();
        let g = group(vec![device("X", "10.0.0.1")]);

        h.coordinator
            .run(
                &g,
                GroupCommand::Play {
                    video_name: "a.mp4".into(),
                },
            )
            .await
            .unwrap();
        assert!(h.coordinator.playback_state(&g.id).current_video.is_some());

        h.coordinator.cleanup_stale(&HashSet::new());
        assert!(h.coordinator.playback_state(&g.id).current_video.is_none());
    }
}

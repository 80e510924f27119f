//! Trait abstractions for device-agent operations.
//!
//! These traits enable dependency injection for testability and modularity.
//! Services depend on traits rather than concrete implementations; tests
//! substitute scripted fakes to exercise partial-failure paths.

use async_trait::async_trait;
use bytes::Bytes;

use crate::agent::transport::AgentResult;
use crate::agent::types::{CurrentInput, DeviceStatus, HdmiMap, TvStatus, WeeklySchedule};

/// Trait for video playback operations on a device agent.
///
/// Used by the `StatusPoller` and `GroupCoordinator`. All methods take the
/// device host; connection parameters (port, credential) belong to the
/// implementation.
#[async_trait]
pub trait AgentPlayback: Send + Sync {
    /// Fetches the current playback status.
    async fn status(&self, host: &str) -> AgentResult<DeviceStatus>;

    /// Instructs the device to play the named video.
    ///
    /// The agent fails with a non-2xx if the file is not present; callers
    /// relay that as a per-device failure rather than pre-verifying.
    async fn play(&self, host: &str, video_name: &str) -> AgentResult<()>;

    /// Pauses playback.
    async fn pause(&self, host: &str) -> AgentResult<()>;

    /// Resumes paused playback.
    async fn resume(&self, host: &str) -> AgentResult<()>;

    /// Stops playback. Safe to call on an already-stopped device.
    async fn stop(&self, host: &str) -> AgentResult<()>;

    /// Uploads a video file (multipart).
    async fn upload(&self, host: &str, file_name: &str, data: Bytes) -> AgentResult<()>;

    /// Deletes the named video from the device.
    async fn delete_video(&self, host: &str, video_name: &str) -> AgentResult<()>;
}

/// Trait for TV power and HDMI input operations on a device agent.
///
/// The TV subsystem is independent of playback on the same physical device
/// and may fail independently.
#[async_trait]
pub trait AgentTv: Send + Sync {
    /// Fetches the TV power status.
    async fn tv_status(&self, host: &str) -> AgentResult<TvStatus>;

    /// Fetches the currently active HDMI input port.
    async fn current_input(&self, host: &str) -> AgentResult<CurrentInput>;

    /// Fetches the device's HDMI port to source-label mapping.
    async fn hdmi_map(&self, host: &str) -> AgentResult<HdmiMap>;

    /// Switches the TV to the given HDMI input port.
    async fn switch_input(&self, host: &str, port: u32) -> AgentResult<()>;
}

/// Trait for TV on/off schedule operations on a device agent.
#[async_trait]
pub trait AgentSchedule: Send + Sync {
    /// Fetches the device's weekly on/off schedule.
    async fn get_schedule(&self, host: &str) -> AgentResult<WeeklySchedule>;

    /// Replaces the device's weekly on/off schedule.
    async fn set_schedule(&self, host: &str, schedule: &WeeklySchedule) -> AgentResult<()>;

    /// Clears the device's schedule entirely.
    async fn clear_schedule(&self, host: &str) -> AgentResult<()>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Combined Trait (for trait objects)
// ─────────────────────────────────────────────────────────────────────────────

/// Combined trait for all device-agent operations.
///
/// Used by the bootstrap and `AppState` to hand one client to every service.
#[async_trait]
pub trait AgentApi: AgentPlayback + AgentTv + AgentSchedule {}

/// Blanket implementation for any type implementing all traits.
impl<T: AgentPlayback + AgentTv + AgentSchedule> AgentApi for T {}

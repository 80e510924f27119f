//! Wire types for the device-agent HTTP contract.
//!
//! All payloads are JSON. Fields the agent may omit (older agent builds)
//! carry `#[serde(default)]` so one lagging device cannot poison a poll.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Playback
// ─────────────────────────────────────────────────────────────────────────────

/// Playback status reported by a device agent (`GET /status`).
///
/// Ephemeral per-poll snapshot; never persisted. `date_uploaded` is parallel
/// to `available_videos` (the agent formats upload times as display strings).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceStatus {
    /// Video currently loaded in the player, if any.
    #[serde(default)]
    pub current_video: Option<String>,
    /// Whether the player is actively playing.
    #[serde(default)]
    pub is_playing: bool,
    /// Whether playback is paused.
    #[serde(default)]
    pub is_paused: bool,
    /// Video files present on the device, in agent-reported order.
    #[serde(default)]
    pub available_videos: Vec<String>,
    /// Upload timestamps parallel to `available_videos`.
    #[serde(default)]
    pub date_uploaded: Vec<String>,
}

/// Body for `POST /play`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayRequest {
    pub video_name: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// TV Power
// ─────────────────────────────────────────────────────────────────────────────

/// TV power state as reported by the agent's CEC subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TvPower {
    On,
    Off,
}

/// Response of `GET /tv/status`.
///
/// Fetched independently from [`DeviceStatus`] - the TV control subsystem
/// can fail while the player is healthy, and vice versa.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TvStatus {
    /// Current power state.
    pub status: TvPower,
    /// Agent-side timestamp of the reading (ISO 8601).
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl TvStatus {
    /// Returns true if the TV reports powered on.
    #[must_use]
    pub fn is_on(&self) -> bool {
        self.status == TvPower::On
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HDMI
// ─────────────────────────────────────────────────────────────────────────────

/// Response of `GET /tv/current`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentInput {
    /// Active HDMI input port, if the agent knows it.
    #[serde(default)]
    pub current_input: Option<u32>,
}

/// Per-device HDMI port to source-label mapping (`GET /tv/fetch_hdmi_map`).
///
/// Keys are port numbers as strings ("1", "2", "3" - the agent stores them
/// that way); values are human-readable source labels ("Raspberry Pi", "TV").
/// Port assignments are per-device configuration, not fleet-global.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HdmiMap(pub BTreeMap<String, String>);

impl HdmiMap {
    /// Finds the port whose label matches `label` (case-insensitive).
    ///
    /// Returns `None` when no entry matches or the matching key is not a
    /// parseable port number.
    #[must_use]
    pub fn find_port(&self, label: &str) -> Option<u32> {
        self.0
            .iter()
            .find(|(_, l)| l.eq_ignore_ascii_case(label))
            .and_then(|(port, _)| port.parse().ok())
    }

    /// Returns true if the map has no configured ports.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TV Schedule
// ─────────────────────────────────────────────────────────────────────────────

/// On/off times for a single day ("HH:MM", 24-hour).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaySchedule {
    #[serde(default)]
    pub turn_on_time: Option<String>,
    #[serde(default)]
    pub turn_off_time: Option<String>,
}

/// Weekly TV on/off schedule relayed to a device agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeeklySchedule {
    #[serde(default)]
    pub sunday: Option<DaySchedule>,
    #[serde(default)]
    pub monday: Option<DaySchedule>,
    #[serde(default)]
    pub tuesday: Option<DaySchedule>,
    #[serde(default)]
    pub wednesday: Option<DaySchedule>,
    #[serde(default)]
    pub thursday: Option<DaySchedule>,
    #[serde(default)]
    pub friday: Option<DaySchedule>,
    #[serde(default)]
    pub saturday: Option<DaySchedule>,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Status payload as emitted by a current agent build.
    const STATUS_FULL: &str = r#"{
        "current_video": "promo.mp4",
        "is_playing": true,
        "is_paused": false,
        "available_videos": ["promo.mp4", "loop.mp4"],
        "date_uploaded": ["09:15 AM Mar 02 2025", "11:40 AM Mar 05 2025"]
    }"#;

    #[test]
    fn device_status_parses_full_payload() {
        let status: DeviceStatus = serde_json::from_str(STATUS_FULL).unwrap();
        assert_eq!(status.current_video.as_deref(), Some("promo.mp4"));
        assert!(status.is_playing);
        assert_eq!(status.available_videos.len(), 2);
        assert_eq!(status.date_uploaded.len(), 2);
    }

    #[test]
    fn device_status_tolerates_missing_fields() {
        // Older agents do not report is_paused
        let status: DeviceStatus =
            serde_json::from_str(r#"{"current_video": null, "is_playing": false}"#).unwrap();
        assert!(!status.is_paused);
        assert!(status.available_videos.is_empty());
    }

    #[test]
    fn tv_status_parses_on_and_off() {
        let on: TvStatus =
            serde_json::from_str(r#"{"status": "on", "timestamp": "2025-03-05T11:40:00"}"#)
                .unwrap();
        assert!(on.is_on());

        let off: TvStatus = serde_json::from_str(r#"{"status": "off"}"#).unwrap();
        assert!(!off.is_on());
    }

    #[test]
    fn hdmi_map_finds_port_case_insensitively() {
        let map: HdmiMap =
            serde_json::from_str(r#"{"1": "Raspberry Pi", "2": "TV", "3": "Other"}"#).unwrap();
        assert_eq!(map.find_port("raspberry pi"), Some(1));
        assert_eq!(map.find_port("TV"), Some(2));
        assert_eq!(map.find_port("Chromecast"), None);
    }

    #[test]
    fn hdmi_map_ignores_unparseable_ports() {
        let map: HdmiMap = serde_json::from_str(r#"{"hdmi-a": "Raspberry Pi"}"#).unwrap();
        assert_eq!(map.find_port("Raspberry Pi"), None);
    }
}

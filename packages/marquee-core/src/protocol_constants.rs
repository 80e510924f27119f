//! Shared constants for the device-agent and directory protocols.
//!
//! Centralizing these avoids magic numbers drifting between the client,
//! the services, and the server configuration.

/// Application name used in logs and user-facing strings.
pub const APP_NAME: &str = "Marquee";

/// Port the per-device media agent listens on.
pub const DEFAULT_AGENT_PORT: u16 = 8000;

/// Timeout for a single device-agent request (seconds).
///
/// A hung device otherwise stalls the join barrier of every group command
/// it participates in, so all agent I/O goes through a client built with
/// this timeout.
pub const AGENT_TIMEOUT_SECS: u64 = 10;

/// How long an aggregate command error stays attached to a group before it
/// is cleared (seconds). This is a presentation timeout, not a retry.
pub const ERROR_DISPLAY_SECS: u64 = 5;

/// File name of the persisted group mapping inside the data directory.
pub const GROUPS_FILE: &str = "groups.json";

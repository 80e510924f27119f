//! Device-agent HTTP client.
//!
//! Every fleet device runs a local media agent exposing a small HTTP
//! endpoint set for playback, uploads, TV power, HDMI switching, and the
//! on/off schedule. This module owns that contract:
//!
//! - [`transport`]: request execution, bearer credential, error conversion
//! - [`types`]: JSON wire types
//! - [`client`]: typed per-operation functions and [`AgentClientImpl`]
//! - [`traits`]: injection seams used by the services

pub mod client;
pub mod traits;
pub mod transport;
pub mod types;

pub use client::AgentClientImpl;
pub use traits::{AgentApi, AgentPlayback, AgentSchedule, AgentTv};
pub use transport::{AgentError, AgentResult};
pub use types::{
    CurrentInput, DaySchedule, DeviceStatus, HdmiMap, PlayRequest, TvPower, TvStatus,
    WeeklySchedule,
};

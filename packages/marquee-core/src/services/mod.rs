//! Application services layer.
//!
//! This module contains the business logic services that orchestrate
//! between the API layer and infrastructure (agent/, registry):

pub mod fleet_monitor;
pub mod group_coordinator;
pub mod group_store;
pub mod hdmi_switcher;
pub mod status_poller;

pub use fleet_monitor::{partition, FleetMonitor, FleetPartition, FleetView};
pub use group_coordinator::{
    AggregateGroupStatus, CommandResult, GroupCommand, GroupCoordinator, GroupPlaybackState,
};
pub use group_store::{Group, GroupStore, GroupUpdate};
pub use hdmi_switcher::{DeviceHdmiState, HdmiSwitcher, SwitchOutcome, SwitchResult};
pub use status_poller::{DeviceSnapshot, StatusPoller};

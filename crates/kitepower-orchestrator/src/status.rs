//! Serializable status snapshot for the API and display layers.

use std::collections::BTreeMap;

use kitepower_component::ComponentInfo;
use kitepower_hardware_watchdog::WatchdogStatus;
use kitepower_state::{ComponentState, SystemComponent, SystemState};
use kitepower_watchdog::WatchdogEntry;
use serde::Serialize;

use crate::info::SystemInfo;

/// Everything the UI needs to show the system's condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// Current global state.
    pub state: SystemState,
    /// Display label of `state`. Fault states read as faults.
    pub state_label: &'static str,
    /// State before the last transition.
    pub previous_state: Option<SystemState>,
    /// Reason recorded with the last transition.
    pub state_reason: String,
    /// Time spent in `state`, in milliseconds.
    pub time_in_state_ms: u64,
    /// Whether autonomous operation is allowed.
    pub healthy: bool,
    /// Unresolved errors in the history.
    pub unresolved_errors: usize,
    /// Errors reported since boot.
    pub total_errors: u64,
    /// Per-subsystem orchestration states.
    pub components: BTreeMap<SystemComponent, ComponentState>,
    /// Registered modules with their lifecycle tokens.
    pub modules: Vec<ComponentInfo>,
    /// Heartbeat monitoring entries.
    pub watchdog: Vec<WatchdogEntry>,
    /// Hardware watchdog status, if its lock was available.
    pub hardware_watchdog: Option<WatchdogStatus>,
    /// Last system info snapshot.
    pub system_info: SystemInfo,
}

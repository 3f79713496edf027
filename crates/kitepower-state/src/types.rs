//! System-level and orchestration-level state enums.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The single global operating mode of the firmware.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum SystemState {
    /// Booting; components are being brought up.
    #[default]
    Init = 0,
    /// All required components are up; not flying.
    Ready = 1,
    /// Normal operation.
    Running = 2,
    /// A fault was detected and not yet handled.
    Error = 3,
    /// Reduced activity to save energy.
    PowerSave = 4,
    /// Sensors and actuators are being calibrated.
    Calibration = 5,
    /// Actuators held in the safe posture until re-initialization.
    SafeMode = 6,
    /// Firmware update in progress.
    Update = 7,
    /// Terminal state.
    Shutdown = 8,
}

impl SystemState {
    /// Every state, in declaration order.
    pub const ALL: [SystemState; 9] = [
        SystemState::Init,
        SystemState::Ready,
        SystemState::Running,
        SystemState::Error,
        SystemState::PowerSave,
        SystemState::Calibration,
        SystemState::SafeMode,
        SystemState::Update,
        SystemState::Shutdown,
    ];

    /// Upper-case token, e.g. `SAFE_MODE`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SystemState::Init => "INIT",
            SystemState::Ready => "READY",
            SystemState::Running => "RUNNING",
            SystemState::Error => "ERROR",
            SystemState::PowerSave => "POWER_SAVE",
            SystemState::Calibration => "CALIBRATION",
            SystemState::SafeMode => "SAFE_MODE",
            SystemState::Update => "UPDATE",
            SystemState::Shutdown => "SHUTDOWN",
        }
    }

    /// Human-facing label for displays and the API. Fault states are worded
    /// so they can never be mistaken for a normal status.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            SystemState::Init => "Starting",
            SystemState::Ready => "Ready",
            SystemState::Running => "Running",
            SystemState::Error => "FAULT - error",
            SystemState::PowerSave => "Power save",
            SystemState::Calibration => "Calibrating",
            SystemState::SafeMode => "FAULT - safe mode",
            SystemState::Update => "Updating",
            SystemState::Shutdown => "Shut down",
        }
    }

    /// `true` for the fault states `ERROR` and `SAFE_MODE`.
    #[must_use]
    pub const fn is_fault(self) -> bool {
        matches!(self, SystemState::Error | SystemState::SafeMode)
    }

    /// `true` for states with no way out.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, SystemState::Shutdown)
    }

    /// Parse an upper-case token as produced by [`SystemState::as_str`].
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|s| s.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fixed set of subsystems tracked by the orchestration core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum SystemComponent {
    /// WiFi link.
    Wifi = 0,
    /// Steering servos.
    Servos = 1,
    /// Winch motor.
    Winch = 2,
    /// Inertial measurement unit.
    Imu = 3,
    /// Local display.
    Display = 4,
    /// Buttons and potentiometers.
    Buttons = 5,
    /// Flight autopilot.
    Autopilot = 6,
    /// Power management.
    Power = 7,
    /// Local web server and API.
    Webserver = 8,
    /// Line length and tension sensing.
    LineSensor = 9,
}

impl SystemComponent {
    /// Every subsystem, in declaration order.
    pub const ALL: [SystemComponent; 10] = [
        SystemComponent::Wifi,
        SystemComponent::Servos,
        SystemComponent::Winch,
        SystemComponent::Imu,
        SystemComponent::Display,
        SystemComponent::Buttons,
        SystemComponent::Autopilot,
        SystemComponent::Power,
        SystemComponent::Webserver,
        SystemComponent::LineSensor,
    ];

    /// Upper-case token, e.g. `LINE_SENSOR`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SystemComponent::Wifi => "WIFI",
            SystemComponent::Servos => "SERVOS",
            SystemComponent::Winch => "WINCH",
            SystemComponent::Imu => "IMU",
            SystemComponent::Display => "DISPLAY",
            SystemComponent::Buttons => "BUTTONS",
            SystemComponent::Autopilot => "AUTOPILOT",
            SystemComponent::Power => "POWER",
            SystemComponent::Webserver => "WEBSERVER",
            SystemComponent::LineSensor => "LINE_SENSOR",
        }
    }

    /// Parse a token, ignoring ASCII case.
    ///
    /// ```
    /// use kitepower_state::SystemComponent;
    ///
    /// assert_eq!(SystemComponent::from_name("imu"), Some(SystemComponent::Imu));
    /// assert_eq!(SystemComponent::from_name("radar"), None);
    /// ```
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for SystemComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-subsystem status as tracked by the state manager.
///
/// Distinct from a component's own lifecycle state: this is the
/// orchestrator's view, written by the component and by the watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum ComponentState {
    /// Not brought up yet.
    #[default]
    NotInitialized = 0,
    /// Initialization in progress.
    Initializing = 1,
    /// Working normally.
    Operational = 2,
    /// Failed.
    Error = 3,
    /// Being reset after a failure.
    Recovering = 4,
    /// Deliberately switched off.
    Inactive = 5,
    /// Reduced activity.
    PowerSave = 6,
    /// Calibration in progress.
    Calibrating = 7,
}

impl ComponentState {
    /// Upper-case token.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ComponentState::NotInitialized => "NOT_INITIALIZED",
            ComponentState::Initializing => "INITIALIZING",
            ComponentState::Operational => "OPERATIONAL",
            ComponentState::Error => "ERROR",
            ComponentState::Recovering => "RECOVERING",
            ComponentState::Inactive => "INACTIVE",
            ComponentState::PowerSave => "POWER_SAVE",
            ComponentState::Calibrating => "CALIBRATING",
        }
    }
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

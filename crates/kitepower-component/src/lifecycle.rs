//! Component lifecycle states and kinds.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A component's own lifecycle state.
///
/// ```text
/// UNINITIALIZED --initialize--> INITIALIZING --> IDLE --enable--> ACTIVE
///                                    |                              |
///                                    +--> ERROR          disable --> DISABLED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum LifecycleState {
    /// Constructed, not initialized.
    #[default]
    Uninitialized = 0,
    /// `initialize()` in progress.
    Initializing = 1,
    /// Initialized, not enabled.
    Idle = 2,
    /// Enabled and participating in updates.
    Active = 3,
    /// Temporarily paused.
    Suspended = 4,
    /// Failed; needs a reset.
    Error = 5,
    /// Explicitly disabled.
    Disabled = 6,
}

impl LifecycleState {
    /// Every lifecycle state.
    pub const ALL: [LifecycleState; 7] = [
        LifecycleState::Uninitialized,
        LifecycleState::Initializing,
        LifecycleState::Idle,
        LifecycleState::Active,
        LifecycleState::Suspended,
        LifecycleState::Error,
        LifecycleState::Disabled,
    ];

    /// Short display token used by the UI and diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Uninitialized => "UNINIT",
            LifecycleState::Initializing => "INIT",
            LifecycleState::Idle => "IDLE",
            LifecycleState::Active => "ACTIVE",
            LifecycleState::Suspended => "SUSPENDED",
            LifecycleState::Error => "ERROR",
            LifecycleState::Disabled => "DISABLED",
        }
    }

    /// Decode a raw discriminant, e.g. one read back from shared memory or a
    /// diagnostics frame.
    #[must_use]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(LifecycleState::Uninitialized),
            1 => Some(LifecycleState::Initializing),
            2 => Some(LifecycleState::Idle),
            3 => Some(LifecycleState::Active),
            4 => Some(LifecycleState::Suspended),
            5 => Some(LifecycleState::Error),
            6 => Some(LifecycleState::Disabled),
            _ => None,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token shown for a raw value that is not a lifecycle state.
pub const UNKNOWN_STATE_TOKEN: &str = "UNKNOWN";

/// Display token for a raw lifecycle discriminant.
///
/// ```
/// use kitepower_component::lifecycle::state_token_from_raw;
///
/// assert_eq!(state_token_from_raw(3), "ACTIVE");
/// assert_eq!(state_token_from_raw(42), "UNKNOWN");
/// ```
#[must_use]
pub const fn state_token_from_raw(raw: u8) -> &'static str {
    match LifecycleState::from_raw(raw) {
        Some(state) => state.as_str(),
        None => UNKNOWN_STATE_TOKEN,
    }
}

/// What a component is, independent of which capabilities it has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    /// Reads the physical world (IMU, wind, tension, line length).
    Sensor,
    /// Moves something (servos, winch).
    Actuator,
    /// Operator input (buttons, potentiometers).
    Input,
    /// Operator output (display).
    Output,
    /// Software service (autopilot, web server, WiFi, power).
    Service,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentKind::Sensor => write!(f, "sensor"),
            ComponentKind::Actuator => write!(f, "actuator"),
            ComponentKind::Input => write!(f, "input"),
            ComponentKind::Output => write!(f, "output"),
            ComponentKind::Service => write!(f, "service"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_round_trip_covers_every_state() {
        for state in LifecycleState::ALL {
            assert_eq!(LifecycleState::from_raw(state as u8), Some(state));
            assert_eq!(state_token_from_raw(state as u8), state.as_str());
        }
    }

    #[test]
    fn test_out_of_range_is_unknown() {
        assert_eq!(LifecycleState::from_raw(7), None);
        assert_eq!(state_token_from_raw(u8::MAX), UNKNOWN_STATE_TOKEN);
    }
}

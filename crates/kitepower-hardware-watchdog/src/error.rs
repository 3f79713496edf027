//! Error types for hardware watchdog operations.

use thiserror::Error;

/// Errors from hardware watchdog drivers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HardwareWatchdogError {
    /// Watchdog is not armed.
    #[error("watchdog is not armed")]
    NotArmed,
    /// Watchdog has timed out.
    #[error("watchdog has timed out")]
    TimedOut,
    /// The device could not be opened or written.
    #[error("watchdog device error: {0}")]
    Device(String),
    /// Invalid configuration.
    #[error("invalid watchdog configuration: {0}")]
    InvalidConfiguration(String),
    /// State transition not allowed.
    #[error("invalid watchdog transition: {from} -> {to}")]
    InvalidTransition {
        /// Current state.
        from: &'static str,
        /// Attempted target state.
        to: &'static str,
    },
    /// Safe state was already triggered; only `reset()` leaves it.
    #[error("watchdog safe state already triggered")]
    SafeStateAlreadyTriggered,
}

impl HardwareWatchdogError {
    /// Create a device error.
    #[must_use]
    pub fn device(msg: impl Into<String>) -> Self {
        Self::Device(msg.into())
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create an invalid transition error.
    #[must_use]
    pub fn invalid_transition(from: &'static str, to: &'static str) -> Self {
        Self::InvalidTransition { from, to }
    }
}

/// Result type for hardware watchdog operations.
pub type HardwareWatchdogResult<T = ()> = Result<T, HardwareWatchdogError>;

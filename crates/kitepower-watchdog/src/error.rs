//! Error types for the watchdog manager.

use std::time::Duration;

use kitepower_errors::ErrorCode;
use kitepower_state::SystemComponent;
use thiserror::Error;

/// Failures of watchdog manager operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WatchdogError {
    /// The component has no monitoring entry.
    #[error("component not registered with the watchdog: {0}")]
    NotRegistered(SystemComponent),
    /// A zero heartbeat timeout was requested.
    #[error("heartbeat timeout of {0} must be greater than 0")]
    InvalidTimeout(SystemComponent),
    /// The entry lock could not be acquired in time.
    #[error("watchdog lock not acquired within {0:?}")]
    LockTimeout(Duration),
    /// Invalid configuration.
    #[error("invalid watchdog configuration: {0}")]
    InvalidConfiguration(String),
}

impl WatchdogError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Whether retrying later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::LockTimeout(_))
    }
}

impl From<WatchdogError> for ErrorCode {
    fn from(err: WatchdogError) -> Self {
        match err {
            WatchdogError::NotRegistered(_) => ErrorCode::NotInitialized,
            WatchdogError::InvalidTimeout(_) => ErrorCode::InvalidArgument,
            WatchdogError::LockTimeout(_) => ErrorCode::MutexFailure,
            WatchdogError::InvalidConfiguration(_) => ErrorCode::ConfigInvalid,
        }
    }
}

/// Result type for watchdog manager operations.
pub type WatchdogResult<T = ()> = Result<T, WatchdogError>;

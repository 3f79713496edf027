//! Error types for the state manager.

use std::time::Duration;

use kitepower_errors::ErrorCode;
use thiserror::Error;

use crate::types::SystemState;

/// Errors returned by [`SystemStateManager`](crate::SystemStateManager).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// The requested pair is not an allowed transition. State is unchanged.
    #[error("transition {from} -> {to} rejected: {reason}")]
    InvalidTransition {
        /// State at the time of the request.
        from: SystemState,
        /// Requested state.
        to: SystemState,
        /// Reason from the transition table, or why no row applied.
        reason: &'static str,
    },

    /// The state lock could not be acquired within the bounded wait.
    #[error("state lock not acquired within {0:?}")]
    LockTimeout(Duration),

    /// The configuration is unusable.
    #[error("invalid state configuration: {0}")]
    InvalidConfiguration(String),
}

impl StateError {
    /// Create an invalid transition error.
    #[must_use]
    pub fn invalid_transition(from: SystemState, to: SystemState, reason: &'static str) -> Self {
        Self::InvalidTransition { from, to, reason }
    }

    /// `true` when retrying later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::LockTimeout(_))
    }

    /// Firmware error code for reporting through the error manager.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidTransition { .. } => ErrorCode::InvalidState,
            Self::LockTimeout(_) => ErrorCode::MutexFailure,
            Self::InvalidConfiguration(_) => ErrorCode::ConfigInvalid,
        }
    }
}

impl From<StateError> for ErrorCode {
    fn from(err: StateError) -> Self {
        err.code()
    }
}

/// Result type for state operations.
pub type StateResult<T> = std::result::Result<T, StateError>;

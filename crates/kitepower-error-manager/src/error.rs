//! Error types for the error manager itself.

use std::time::Duration;

use kitepower_errors::ErrorCode;
use thiserror::Error;

/// Failures of error manager operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorManagerError {
    /// The history lock could not be acquired in time.
    #[error("error history lock not acquired within {0:?}")]
    LockTimeout(Duration),
    /// Invalid configuration.
    #[error("invalid error manager configuration: {0}")]
    InvalidConfiguration(String),
}

impl ErrorManagerError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }
}

impl From<ErrorManagerError> for ErrorCode {
    fn from(err: ErrorManagerError) -> Self {
        match err {
            ErrorManagerError::LockTimeout(_) => ErrorCode::MutexFailure,
            ErrorManagerError::InvalidConfiguration(_) => ErrorCode::ConfigInvalid,
        }
    }
}

/// Result type for error manager operations.
pub type ErrorManagerResult<T> = Result<T, ErrorManagerError>;

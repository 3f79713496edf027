//! Error types for component registries.

use kitepower_errors::ErrorCode;
use kitepower_state::SystemComponent;
use thiserror::Error;

/// Errors raised by [`ComponentRegistry`](crate::ComponentRegistry) and
/// [`ComponentDirectory`](crate::ComponentDirectory).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComponentError {
    /// A component with this name is already registered.
    #[error("component name already registered: {0}")]
    DuplicateName(String),

    /// The subsystem already has a component bound to it.
    #[error("subsystem {0} already has a bound component")]
    AlreadyBound(SystemComponent),

    /// No component is bound to the subsystem.
    #[error("no component bound to subsystem {0}")]
    NotBound(SystemComponent),

    /// The component's lock was not acquired within the bounded wait.
    #[error("component {0} is busy")]
    Busy(String),

    /// A lifecycle operation of the component failed.
    #[error("component {name} failed: {code}")]
    Lifecycle {
        /// Component name.
        name: String,
        /// Failure reported by the component.
        code: ErrorCode,
    },
}

impl ComponentError {
    /// Create a lifecycle failure error.
    #[must_use]
    pub fn lifecycle(name: impl Into<String>, code: ErrorCode) -> Self {
        Self::Lifecycle {
            name: name.into(),
            code,
        }
    }

    /// Firmware error code for reporting through the error manager.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::DuplicateName(_) | Self::AlreadyBound(_) => ErrorCode::InvalidArgument,
            Self::NotBound(_) => ErrorCode::NotInitialized,
            Self::Busy(_) => ErrorCode::MutexFailure,
            Self::Lifecycle { code, .. } => *code,
        }
    }
}

/// Result type for registry and directory operations.
pub type ComponentResult<T> = std::result::Result<T, ComponentError>;

//! Error types for the orchestrator crate.

use std::path::PathBuf;

use kitepower_component::ComponentError;
use kitepower_error_manager::ErrorManagerError;
use kitepower_errors::ErrorCode;
use kitepower_hardware_watchdog::HardwareWatchdogError;
use kitepower_scheduler::SchedulerError;
use kitepower_state::{StateError, SystemComponent};
use kitepower_watchdog::WatchdogError;
use thiserror::Error;

/// Configuration loading and validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read configuration {path}")]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The YAML is malformed or has the wrong shape.
    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
    /// A section failed validation.
    #[error("invalid {section} configuration: {message}")]
    Invalid {
        /// Offending section.
        section: &'static str,
        /// What is wrong.
        message: String,
    },
}

impl ConfigError {
    /// Create a validation error for `section`.
    pub fn invalid(section: &'static str, message: impl ToString) -> Self {
        Self::Invalid {
            section,
            message: message.to_string(),
        }
    }
}

/// Failures of orchestrator operations.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// [`initialize`](crate::SystemOrchestrator::initialize) has not run.
    #[error("orchestrator not initialized")]
    NotInitialized,
    /// Required subsystems did not come up; the system is in `ERROR`.
    #[error("required components failed to start: {0:?}")]
    StartupFailed(Vec<SystemComponent>),
    /// State manager failure.
    #[error(transparent)]
    State(#[from] StateError),
    /// Component lifecycle or directory failure.
    #[error(transparent)]
    Component(#[from] ComponentError),
    /// Watchdog manager failure.
    #[error(transparent)]
    Watchdog(#[from] WatchdogError),
    /// Error manager failure.
    #[error(transparent)]
    ErrorManager(#[from] ErrorManagerError),
    /// Hardware watchdog failure.
    #[error(transparent)]
    HardwareWatchdog(#[from] HardwareWatchdogError),
    /// Task creation failure.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    /// Configuration failure.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl OrchestratorError {
    /// Firmware error code for reporting.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized => ErrorCode::NotInitialized,
            Self::StartupFailed(_) => ErrorCode::ComponentInitFailed,
            Self::State(e) => e.code(),
            Self::Component(e) => e.code(),
            Self::Watchdog(e) => ErrorCode::from(e.clone()),
            Self::ErrorManager(e) => ErrorCode::from(e.clone()),
            Self::HardwareWatchdog(_) => ErrorCode::HardwareWatchdogFailure,
            Self::Scheduler(_) => ErrorCode::TaskCreationFailed,
            Self::Config(_) => ErrorCode::ConfigInvalid,
        }
    }
}

/// Result type for orchestrator operations.
pub type OrchestratorResult<T = ()> = Result<T, OrchestratorError>;

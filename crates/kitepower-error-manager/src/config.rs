//! Error manager configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use kitepower_errors::{ErrorCode, RecoveryStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorManagerError, ErrorManagerResult};

/// Error manager configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorManagerConfig {
    /// Entries kept in the history ring.
    pub history_capacity: usize,
    /// Bounded wait for the history lock.
    pub lock_timeout_ms: u64,
    /// Delay passed to the restart requester by `RESET_SYSTEM` recovery.
    pub restart_delay_ms: u64,
    /// Strategy used when a report does not name one.
    pub default_strategies: BTreeMap<ErrorCode, RecoveryStrategy>,
}

impl Default for ErrorManagerConfig {
    fn default() -> Self {
        Self {
            history_capacity: 20,
            lock_timeout_ms: 100,
            restart_delay_ms: 1000,
            default_strategies: default_strategies(),
        }
    }
}

/// Compiled-in default strategies. Codes not listed default to `NONE`.
#[must_use]
pub fn default_strategies() -> BTreeMap<ErrorCode, RecoveryStrategy> {
    BTreeMap::from([
        (ErrorCode::StateCorruption, RecoveryStrategy::ResetSystem),
        (ErrorCode::OutOfMemory, RecoveryStrategy::ResetSystem),
        (ErrorCode::CriticalFailure, RecoveryStrategy::SafeMode),
        (ErrorCode::ServoFailure, RecoveryStrategy::SafeMode),
        (ErrorCode::WinchFailure, RecoveryStrategy::SafeMode),
        (ErrorCode::ConnectionFailed, RecoveryStrategy::Retry),
        (ErrorCode::NetworkTimeout, RecoveryStrategy::Retry),
    ])
}

impl ErrorManagerConfig {
    /// Start a builder from the defaults.
    #[must_use]
    pub fn builder() -> ErrorManagerConfigBuilder {
        ErrorManagerConfigBuilder::default()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// [`ErrorManagerError::InvalidConfiguration`] for a zero capacity or
    /// lock timeout, or a default strategy registered for `OK`.
    pub fn validate(&self) -> ErrorManagerResult<()> {
        if self.history_capacity == 0 {
            return Err(ErrorManagerError::invalid_configuration(
                "history_capacity must be greater than 0",
            ));
        }
        if self.lock_timeout_ms == 0 {
            return Err(ErrorManagerError::invalid_configuration(
                "lock_timeout_ms must be greater than 0",
            ));
        }
        if self.default_strategies.contains_key(&ErrorCode::Ok) {
            return Err(ErrorManagerError::invalid_configuration(
                "OK cannot have a recovery strategy",
            ));
        }
        Ok(())
    }

    /// Bounded lock wait.
    #[must_use]
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Restart delay for `RESET_SYSTEM`.
    #[must_use]
    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }
}

/// Builder for [`ErrorManagerConfig`].
#[derive(Debug, Default)]
pub struct ErrorManagerConfigBuilder {
    config: ErrorManagerConfig,
}

impl ErrorManagerConfigBuilder {
    /// Set the history capacity.
    #[must_use]
    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.config.history_capacity = capacity;
        self
    }

    /// Set the lock timeout in milliseconds.
    #[must_use]
    pub fn lock_timeout_ms(mut self, ms: u64) -> Self {
        self.config.lock_timeout_ms = ms;
        self
    }

    /// Set the `RESET_SYSTEM` restart delay in milliseconds.
    #[must_use]
    pub fn restart_delay_ms(mut self, ms: u64) -> Self {
        self.config.restart_delay_ms = ms;
        self
    }

    /// Set the default strategy of one code.
    #[must_use]
    pub fn default_strategy(mut self, code: ErrorCode, strategy: RecoveryStrategy) -> Self {
        self.config.default_strategies.insert(code, strategy);
        self
    }

    /// Drop every compiled-in default strategy.
    #[must_use]
    pub fn without_default_strategies(mut self) -> Self {
        self.config.default_strategies.clear();
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    ///
    /// See [`ErrorManagerConfig::validate`].
    pub fn build(self) -> ErrorManagerResult<ErrorManagerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

//! State manager configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{StateError, StateResult};

/// Configuration of the [`SystemStateManager`](crate::SystemStateManager).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Bounded wait for the state lock, in milliseconds.
    pub lock_timeout_ms: u64,
    /// Number of committed transitions kept in the history.
    pub history_capacity: usize,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 100,
            history_capacity: 32,
        }
    }
}

impl StateConfig {
    /// Lock wait as a [`Duration`].
    #[must_use]
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::InvalidConfiguration`] for a zero lock timeout or
    /// a zero history capacity.
    pub fn validate(&self) -> StateResult<()> {
        if self.lock_timeout_ms == 0 {
            return Err(StateError::InvalidConfiguration(
                "lock_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.history_capacity == 0 {
            return Err(StateError::InvalidConfiguration(
                "history_capacity must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

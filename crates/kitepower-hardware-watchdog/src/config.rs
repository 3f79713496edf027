//! Hardware watchdog configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HardwareWatchdogError, HardwareWatchdogResult};

/// Accepted range for `timeout_ms`.
pub const TIMEOUT_RANGE_MS: std::ops::RangeInclusive<u32> = 10..=5000;

/// Which driver backs the hardware watchdog.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum WatchdogBackend {
    /// In-process software watchdog; no reboot on expiry.
    #[default]
    Software,
    /// Linux watchdog character device.
    Device {
        /// Device path, usually `/dev/watchdog`.
        path: PathBuf,
    },
}

/// Hardware watchdog configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// Expiry after the last feed, in milliseconds (10-5000).
    pub timeout_ms: u32,
    /// How often the orchestrator feeds, in milliseconds. Must be shorter
    /// than the timeout.
    pub feed_interval_ms: u32,
    /// Driver selection.
    pub backend: WatchdogBackend,
}

impl WatchdogConfig {
    /// Software watchdog with the given timeout.
    ///
    /// # Errors
    ///
    /// [`HardwareWatchdogError::InvalidConfiguration`] if `timeout_ms` is
    /// outside 10-5000 ms.
    pub fn new(timeout_ms: u32) -> HardwareWatchdogResult<Self> {
        let config = Self {
            timeout_ms,
            feed_interval_ms: (timeout_ms / 4).max(1),
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Start a builder from the defaults.
    #[must_use]
    pub fn builder() -> WatchdogConfigBuilder {
        WatchdogConfigBuilder::default()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// [`HardwareWatchdogError::InvalidConfiguration`] describing the first
    /// invalid field.
    pub fn validate(&self) -> HardwareWatchdogResult<()> {
        if !TIMEOUT_RANGE_MS.contains(&self.timeout_ms) {
            return Err(HardwareWatchdogError::invalid_configuration(
                "timeout_ms must be between 10 and 5000",
            ));
        }
        if self.feed_interval_ms == 0 || self.feed_interval_ms >= self.timeout_ms {
            return Err(HardwareWatchdogError::invalid_configuration(
                "feed_interval_ms must be non-zero and shorter than timeout_ms",
            ));
        }
        if let WatchdogBackend::Device { path } = &self.backend {
            if path.as_os_str().is_empty() {
                return Err(HardwareWatchdogError::invalid_configuration(
                    "device path must not be empty",
                ));
            }
        }
        Ok(())
    }

    /// Timeout in microseconds.
    #[must_use]
    pub fn timeout_us(&self) -> u64 {
        u64::from(self.timeout_ms).saturating_mul(1000)
    }

    /// Feed cadence.
    #[must_use]
    pub fn feed_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.feed_interval_ms))
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 2000,
            feed_interval_ms: 500,
            backend: WatchdogBackend::Software,
        }
    }
}

/// Builder for [`WatchdogConfig`].
#[derive(Debug, Default)]
pub struct WatchdogConfigBuilder {
    config: WatchdogConfig,
}

impl WatchdogConfigBuilder {
    /// Set the timeout in milliseconds.
    #[must_use]
    pub fn timeout_ms(mut self, ms: u32) -> Self {
        self.config.timeout_ms = ms;
        self
    }

    /// Set the feed cadence in milliseconds.
    #[must_use]
    pub fn feed_interval_ms(mut self, ms: u32) -> Self {
        self.config.feed_interval_ms = ms;
        self
    }

    /// Use the Linux watchdog device at `path`.
    #[must_use]
    pub fn device(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.backend = WatchdogBackend::Device { path: path.into() };
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    ///
    /// See [`WatchdogConfig::validate`].
    pub fn build(self) -> HardwareWatchdogResult<WatchdogConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

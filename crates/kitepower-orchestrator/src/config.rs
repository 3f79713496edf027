//! Whole-system configuration.
//!
//! One YAML document with a section per service. Every section has
//! defaults, so an empty document is a valid configuration:
//!
//! ```yaml
//! orchestrator:
//!   info_refresh_ms: 1000
//!   required_components: [IMU, SERVOS, WINCH]
//! watchdog:
//!   sweep_interval_ms: 100
//!   policies:
//!     - { component: IMU, timeout_ms: 500, action: RESET_COMPONENT }
//! hardware_watchdog:
//!   timeout_ms: 2000
//!   backend: { kind: device, path: /dev/watchdog }
//! ```

use std::path::Path;
use std::time::Duration;

use kitepower_error_manager::ErrorManagerConfig;
use kitepower_hardware_watchdog::WatchdogConfig;
use kitepower_state::{StateConfig, SystemComponent};
use kitepower_watchdog::WatchdogManagerConfig;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Orchestrator section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Minimum time between two system info refreshes.
    pub info_refresh_ms: u64,
    /// Cadence of the orchestrator tick task.
    pub tick_interval_ms: u64,
    /// Cadence of the component update task.
    pub update_interval_ms: u64,
    /// Delay before an immediate reset when the restart thread cannot be
    /// spawned.
    pub restart_fallback_ms: u64,
    /// Subsystems that must come up for the system to reach `READY`.
    pub required_components: Vec<SystemComponent>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            info_refresh_ms: 1000,
            tick_interval_ms: 50,
            update_interval_ms: 20,
            restart_fallback_ms: 100,
            required_components: vec![
                SystemComponent::Imu,
                SystemComponent::Servos,
                SystemComponent::Winch,
            ],
        }
    }
}

impl OrchestratorConfig {
    /// Info refresh throttle.
    #[must_use]
    pub fn info_refresh(&self) -> Duration {
        Duration::from_millis(self.info_refresh_ms)
    }

    /// Orchestrator tick period.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Component update period.
    #[must_use]
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    /// Restart fallback delay.
    #[must_use]
    pub fn restart_fallback(&self) -> Duration {
        Duration::from_millis(self.restart_fallback_ms)
    }

    /// Validate the section.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] for a throttle below one second, zero task
    /// periods, or a subsystem listed twice as required.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.info_refresh_ms < 1000 {
            return Err(ConfigError::invalid(
                "orchestrator",
                "info_refresh_ms must be at least 1000",
            ));
        }
        if self.tick_interval_ms == 0 || self.update_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "orchestrator",
                "task intervals must be greater than zero",
            ));
        }
        let mut seen = Vec::with_capacity(self.required_components.len());
        for component in &self.required_components {
            if seen.contains(component) {
                return Err(ConfigError::invalid(
                    "orchestrator",
                    format!("{component} listed twice in required_components"),
                ));
            }
            seen.push(*component);
        }
        Ok(())
    }
}

/// The whole-system configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KiteConfig {
    /// Boot and tick settings.
    pub orchestrator: OrchestratorConfig,
    /// State manager settings.
    pub state: StateConfig,
    /// Error manager settings and default recovery strategies.
    pub error_manager: ErrorManagerConfig,
    /// Heartbeat monitoring policy.
    pub watchdog: WatchdogManagerConfig,
    /// Hardware watchdog settings.
    pub hardware_watchdog: WatchdogConfig,
}

impl KiteConfig {
    /// Parse and validate a YAML document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`], [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Serialize to YAML.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] if serialization fails.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate every section.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first offending section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.orchestrator.validate()?;
        self.state
            .validate()
            .map_err(|e| ConfigError::invalid("state", e))?;
        self.error_manager
            .validate()
            .map_err(|e| ConfigError::invalid("error_manager", e))?;
        self.watchdog
            .validate()
            .map_err(|e| ConfigError::invalid("watchdog", e))?;
        self.hardware_watchdog
            .validate()
            .map_err(|e| ConfigError::invalid("hardware_watchdog", e))?;
        Ok(())
    }
}

//! Watchdog actions, the policy table and manager configuration.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use kitepower_state::SystemComponent;
use serde::{Deserialize, Serialize};

use crate::error::{WatchdogError, WatchdogResult};

/// What the sweep does when a component misses its heartbeat deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WatchdogAction {
    /// Report the breach, change nothing.
    #[default]
    LogOnly,
    /// Re-run the component's lifecycle.
    ResetComponent,
    /// Restart the whole system.
    ResetSystem,
    /// Move the system to `SAFE_MODE`.
    SafeMode,
}

impl WatchdogAction {
    /// Every action.
    pub const ALL: [WatchdogAction; 4] = [
        WatchdogAction::LogOnly,
        WatchdogAction::ResetComponent,
        WatchdogAction::ResetSystem,
        WatchdogAction::SafeMode,
    ];

    /// Upper-case token.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            WatchdogAction::LogOnly => "LOG_ONLY",
            WatchdogAction::ResetComponent => "RESET_COMPONENT",
            WatchdogAction::ResetSystem => "RESET_SYSTEM",
            WatchdogAction::SafeMode => "SAFE_MODE",
        }
    }
}

impl fmt::Display for WatchdogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the monitoring policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchdogPolicy {
    /// Monitored subsystem.
    pub component: SystemComponent,
    /// Allowed silence before a breach.
    pub timeout_ms: u64,
    /// Action on breach.
    pub action: WatchdogAction,
}

impl WatchdogPolicy {
    /// A policy row.
    #[must_use]
    pub const fn new(component: SystemComponent, timeout_ms: u64, action: WatchdogAction) -> Self {
        Self {
            component,
            timeout_ms,
            action,
        }
    }
}

/// Compiled-in policy for every subsystem.
///
/// Flight-critical actuators and the autopilot escalate to safe mode,
/// sensors and network services are reset in place, operator I/O is only
/// logged.
pub const DEFAULT_POLICIES: [WatchdogPolicy; 10] = [
    WatchdogPolicy::new(SystemComponent::Imu, 500, WatchdogAction::ResetComponent),
    WatchdogPolicy::new(SystemComponent::Servos, 500, WatchdogAction::SafeMode),
    WatchdogPolicy::new(SystemComponent::Winch, 500, WatchdogAction::SafeMode),
    WatchdogPolicy::new(SystemComponent::LineSensor, 1000, WatchdogAction::ResetComponent),
    WatchdogPolicy::new(SystemComponent::Autopilot, 1000, WatchdogAction::SafeMode),
    WatchdogPolicy::new(SystemComponent::Power, 2000, WatchdogAction::ResetSystem),
    WatchdogPolicy::new(SystemComponent::Display, 5000, WatchdogAction::LogOnly),
    WatchdogPolicy::new(SystemComponent::Buttons, 5000, WatchdogAction::LogOnly),
    WatchdogPolicy::new(SystemComponent::Wifi, 10_000, WatchdogAction::ResetComponent),
    WatchdogPolicy::new(SystemComponent::Webserver, 10_000, WatchdogAction::ResetComponent),
];

/// Watchdog manager configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogManagerConfig {
    /// Sweep cadence.
    pub sweep_interval_ms: u64,
    /// Bounded wait for the entry lock.
    pub lock_timeout_ms: u64,
    /// Delay passed to the restart requester by `RESET_SYSTEM`.
    pub restart_delay_ms: u64,
    /// Monitoring policy, one row per subsystem.
    pub policies: Vec<WatchdogPolicy>,
}

impl Default for WatchdogManagerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_ms: 100,
            lock_timeout_ms: 100,
            restart_delay_ms: 1000,
            policies: DEFAULT_POLICIES.to_vec(),
        }
    }
}

impl WatchdogManagerConfig {
    /// Start a builder from the defaults.
    #[must_use]
    pub fn builder() -> WatchdogManagerConfigBuilder {
        WatchdogManagerConfigBuilder::default()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// [`WatchdogError::InvalidConfiguration`] for zero intervals or
    /// timeouts and for a subsystem listed twice in the policy.
    pub fn validate(&self) -> WatchdogResult<()> {
        if self.sweep_interval_ms == 0 {
            return Err(WatchdogError::invalid_configuration(
                "sweep_interval_ms must be greater than 0",
            ));
        }
        if self.lock_timeout_ms == 0 {
            return Err(WatchdogError::invalid_configuration(
                "lock_timeout_ms must be greater than 0",
            ));
        }
        let mut seen = BTreeSet::new();
        for policy in &self.policies {
            if policy.timeout_ms == 0 {
                return Err(WatchdogError::InvalidTimeout(policy.component));
            }
            if !seen.insert(policy.component) {
                return Err(WatchdogError::invalid_configuration(format!(
                    "duplicate policy for {}",
                    policy.component
                )));
            }
        }
        Ok(())
    }

    /// Policy row of `component`.
    #[must_use]
    pub fn policy_for(&self, component: SystemComponent) -> Option<WatchdogPolicy> {
        self.policies
            .iter()
            .find(|p| p.component == component)
            .copied()
    }

    /// Sweep cadence.
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
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

/// Builder for [`WatchdogManagerConfig`].
#[derive(Debug, Default)]
pub struct WatchdogManagerConfigBuilder {
    config: WatchdogManagerConfig,
}

impl WatchdogManagerConfigBuilder {
    /// Set the sweep cadence in milliseconds.
    #[must_use]
    pub fn sweep_interval_ms(mut self, ms: u64) -> Self {
        self.config.sweep_interval_ms = ms;
        self
    }

    /// Set the lock timeout in milliseconds.
    #[must_use]
    pub fn lock_timeout_ms(mut self, ms: u64) -> Self {
        self.config.lock_timeout_ms = ms;
        self
    }

    /// Set the `RESET_SYSTEM` delay in milliseconds.
    #[must_use]
    pub fn restart_delay_ms(mut self, ms: u64) -> Self {
        self.config.restart_delay_ms = ms;
        self
    }

    /// Set the policy of one subsystem, replacing any existing row.
    #[must_use]
    pub fn policy(mut self, component: SystemComponent, timeout_ms: u64, action: WatchdogAction) -> Self {
        self.config.policies.retain(|p| p.component != component);
        self.config
            .policies
            .push(WatchdogPolicy::new(component, timeout_ms, action));
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    ///
    /// See [`WatchdogManagerConfig::validate`].
    pub fn build(self) -> WatchdogResult<WatchdogManagerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

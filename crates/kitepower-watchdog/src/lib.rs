//! Per-component heartbeat monitoring for the kite controller.
//!
//! Every monitored subsystem is registered with a timeout and a
//! [`WatchdogAction`]. Subsystems call [`WatchdogManager::heartbeat`] from
//! their update path; a periodic sweep reports each missed deadline to the
//! error manager as `WATCHDOG_TIMEOUT` and then runs the configured action:
//!
//! | Action | Effect |
//! |---|---|
//! | `LOG_ONLY` | nothing beyond the report |
//! | `RESET_COMPONENT` | reset the subsystem through the component directory |
//! | `RESET_SYSTEM` | request a system restart |
//! | `SAFE_MODE` | escalate the system state to `SAFE_MODE` |
//!
//! An action fires once per breach. The entry stays in breach until the
//! subsystem heartbeats again or is reset successfully.

pub mod actions;
pub mod config;
pub mod error;
pub mod manager;
pub mod prelude;

pub use actions::{ActionHandler, Breach};
pub use config::{
    DEFAULT_POLICIES, WatchdogAction, WatchdogManagerConfig, WatchdogManagerConfigBuilder,
    WatchdogPolicy,
};
pub use error::{WatchdogError, WatchdogResult};
pub use manager::{SweepOutcome, WatchdogEntry, WatchdogManager, WatchdogManagerBuilder};

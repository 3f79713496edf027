//! Hardware watchdog drivers for the kite controller.
//!
//! The orchestrator arms one [`HardwareWatchdog`] at startup and feeds it
//! from its main loop. If the loop stalls the watchdog expires and the board
//! resets (device driver) or the expiry is reported (software driver).
//!
//! All drivers share the lock-free [`WatchdogState`] status word, so status
//! and metrics can be read from any thread without blocking the feeder.

pub mod config;
pub mod dev_watchdog;
pub mod error;
pub mod prelude;
pub mod software_impl;
pub mod state;
pub mod watchdog;

pub use config::{WatchdogBackend, WatchdogConfig, WatchdogConfigBuilder};
pub use dev_watchdog::{DevWatchdog, from_config};
pub use error::{HardwareWatchdogError, HardwareWatchdogResult};
pub use software_impl::SoftwareWatchdog;
pub use state::{WatchdogMetrics, WatchdogState, WatchdogStatus};
pub use watchdog::HardwareWatchdog;

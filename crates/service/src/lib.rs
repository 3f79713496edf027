//! The `kited` controller daemon.
//!
//! Boots the orchestration core against simulated drivers for the ten
//! subsystems and keeps it running until shutdown, restart or interrupt.

pub mod daemon;
pub mod drivers;

pub use daemon::{DaemonExit, DaemonOptions, EXIT_RESTART, KiteDaemon};
pub use drivers::{SimDriver, SimFaults, simulated_fleet};

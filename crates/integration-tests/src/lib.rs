//! End-to-end scenarios for the KitePower orchestration core.
//!
//! The library half holds the shared rig: a fully wired [`KiteSystem`]
//! driven by a manual clock, a software hardware watchdog and a fixed
//! system info probe, so every scenario is deterministic.
//!
//! [`KiteSystem`]: kitepower_orchestrator::KiteSystem

#![deny(rust_2018_idioms)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::print_stdout)]

pub mod fixtures;

pub use fixtures::{KiteRig, RigBuilder, StateObserver, WatchedComponent};

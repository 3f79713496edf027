//! Fixture builders.

use std::sync::Arc;
use std::time::Duration;

use kitepower_state::{ManualClock, StateConfig, SystemState, SystemStateManager};

/// A state manager driven by a manual clock starting at zero.
#[must_use]
pub fn manual_state() -> (Arc<ManualClock>, Arc<SystemStateManager>) {
    manual_state_with(StateConfig::default())
}

/// As [`manual_state`] with a custom configuration.
#[must_use]
pub fn manual_state_with(config: StateConfig) -> (Arc<ManualClock>, Arc<SystemStateManager>) {
    let clock = Arc::new(ManualClock::new());
    let state = Arc::new(SystemStateManager::new(config, clock.clone()));
    (clock, state)
}

/// Walk a fresh manager to `RUNNING` through `READY`.
///
/// # Panics
///
/// Panics if either transition is rejected.
#[track_caller]
pub fn boot_to_running(state: &SystemStateManager) {
    crate::must(state.transition_to(SystemState::Ready, "test boot"));
    crate::must(state.transition_to(SystemState::Running, "test start"));
}

/// Short sleep used where a real thread must get scheduled.
pub fn settle() {
    std::thread::sleep(Duration::from_millis(20));
}

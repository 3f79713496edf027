//! The hardware watchdog driver interface.

use std::fmt::Debug;

use crate::config::WatchdogConfig;
use crate::error::HardwareWatchdogResult;
use crate::state::{WatchdogMetrics, WatchdogStatus};

/// A watchdog that resets or isolates the board when it is not fed.
///
/// Once armed, [`feed`](Self::feed) must be called more often than
/// [`timeout_ms`](Self::timeout_ms). Drivers never block: every method is a
/// handful of atomic operations plus, for device drivers, one write.
pub trait HardwareWatchdog: Send + Sync + Debug {
    /// Feed the watchdog.
    ///
    /// # Errors
    ///
    /// `NotArmed`, `TimedOut` or `SafeStateAlreadyTriggered` by status, or
    /// `Device` if the write failed.
    fn feed(&mut self) -> HardwareWatchdogResult<()>;

    /// Configured expiry.
    fn timeout_ms(&self) -> u32 {
        self.config().timeout_ms
    }

    /// Whether the watchdog is armed.
    fn is_armed(&self) -> bool {
        self.status() == WatchdogStatus::Armed
    }

    /// Start monitoring.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` unless disarmed, or `Device` if the device could
    /// not be opened.
    fn arm(&mut self) -> HardwareWatchdogResult<()>;

    /// Stop monitoring without triggering a reset.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` unless armed, or `Device` if the magic close
    /// failed.
    fn disarm(&mut self) -> HardwareWatchdogResult<()>;

    /// Enter the safe state. For device drivers this lets the hardware
    /// expire.
    ///
    /// # Errors
    ///
    /// `SafeStateAlreadyTriggered` if already triggered.
    fn trigger_safe_state(&mut self) -> HardwareWatchdogResult<()>;

    /// Whether a feed deadline was missed. Checking may move the status to
    /// `TimedOut`.
    fn has_timed_out(&self) -> bool;

    /// Whether the safe state was triggered.
    fn is_safe_state_triggered(&self) -> bool {
        self.status() == WatchdogStatus::SafeState
    }

    /// Current status.
    fn status(&self) -> WatchdogStatus;

    /// Microseconds since the last feed, `None` unless armed.
    fn time_since_last_feed_us(&self) -> Option<u64>;

    /// Back to disarmed.
    fn reset(&mut self);

    /// Configuration.
    fn config(&self) -> &WatchdogConfig;

    /// Counter snapshot.
    fn metrics(&self) -> WatchdogMetrics;

    /// Neither timed out nor in safe state.
    fn is_healthy(&self) -> bool {
        !self.has_timed_out() && !self.is_safe_state_triggered()
    }
}

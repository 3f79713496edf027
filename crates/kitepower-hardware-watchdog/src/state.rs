//! Lock-free status word and counters shared by every driver.
//!
//! ```text
//! Disarmed --arm--> Armed --expire--> TimedOut
//!     ^               |                  |
//!     +----disarm-----+                  |
//!     +------------ reset ---------------+------ any --trigger--> SafeState
//! ```
//!
//! `SafeState` is terminal until `reset()`.

use portable_atomic::{AtomicU32, AtomicU64, Ordering};
use serde::Serialize;

use crate::error::{HardwareWatchdogError, HardwareWatchdogResult};

/// Driver status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u32)]
pub enum WatchdogStatus {
    /// Not armed.
    #[default]
    Disarmed = 0,
    /// Armed and expecting feeds.
    Armed = 1,
    /// A feed deadline was missed.
    TimedOut = 2,
    /// Safe state was triggered.
    SafeState = 3,
}

impl WatchdogStatus {
    /// Decode a raw status word.
    #[must_use]
    pub const fn from_raw(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Disarmed),
            1 => Some(Self::Armed),
            2 => Some(Self::TimedOut),
            3 => Some(Self::SafeState),
            _ => None,
        }
    }

    /// Raw status word.
    #[must_use]
    pub const fn to_raw(self) -> u32 {
        self as u32
    }

    /// Only `reset()` leaves a terminal status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::SafeState)
    }

    /// Armed or timed out.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Armed | Self::TimedOut)
    }

    /// Display token.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disarmed => "DISARMED",
            Self::Armed => "ARMED",
            Self::TimedOut => "TIMED_OUT",
            Self::SafeState => "SAFE_STATE",
        }
    }
}

impl std::fmt::Display for WatchdogStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomic status word and counters.
#[derive(Debug, Default)]
pub struct WatchdogState {
    status: AtomicU32,
    arm_count: AtomicU64,
    feed_count: AtomicU64,
    timeout_count: AtomicU64,
    safe_state_count: AtomicU64,
    consecutive_failures: AtomicU32,
    last_feed_us: AtomicU64,
    max_feed_interval_us: AtomicU64,
}

impl WatchdogState {
    /// Disarmed, all counters zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> WatchdogStatus {
        WatchdogStatus::from_raw(self.status.load(Ordering::Acquire))
            .unwrap_or(WatchdogStatus::Disarmed)
    }

    fn swap_status(
        &self,
        from: WatchdogStatus,
        to: WatchdogStatus,
    ) -> HardwareWatchdogResult<()> {
        self.status
            .compare_exchange(from.to_raw(), to.to_raw(), Ordering::AcqRel, Ordering::Acquire)
            .map(drop)
            .map_err(|current| {
                let current = WatchdogStatus::from_raw(current).unwrap_or_default();
                HardwareWatchdogError::invalid_transition(current.as_str(), to.as_str())
            })
    }

    /// `Disarmed -> Armed`. `now_us` seeds the feed clock.
    ///
    /// # Errors
    ///
    /// [`HardwareWatchdogError::InvalidTransition`] from any other status.
    pub fn arm(&self, now_us: u64) -> HardwareWatchdogResult<()> {
        self.swap_status(WatchdogStatus::Disarmed, WatchdogStatus::Armed)?;
        self.arm_count.fetch_add(1, Ordering::Relaxed);
        self.last_feed_us.store(now_us, Ordering::Release);
        Ok(())
    }

    /// `Armed -> Disarmed`.
    ///
    /// # Errors
    ///
    /// [`HardwareWatchdogError::InvalidTransition`] from any other status.
    pub fn disarm(&self) -> HardwareWatchdogResult<()> {
        self.swap_status(WatchdogStatus::Armed, WatchdogStatus::Disarmed)
    }

    /// Record a feed at `now_us`. Only valid while armed.
    ///
    /// # Errors
    ///
    /// [`HardwareWatchdogError::NotArmed`], [`HardwareWatchdogError::TimedOut`]
    /// or [`HardwareWatchdogError::SafeStateAlreadyTriggered`] depending on
    /// the status; each counts as a consecutive failure.
    pub fn feed(&self, now_us: u64) -> HardwareWatchdogResult<()> {
        let result = match self.status() {
            WatchdogStatus::Armed => Ok(()),
            WatchdogStatus::Disarmed => Err(HardwareWatchdogError::NotArmed),
            WatchdogStatus::TimedOut => Err(HardwareWatchdogError::TimedOut),
            WatchdogStatus::SafeState => Err(HardwareWatchdogError::SafeStateAlreadyTriggered),
        };
        match result {
            Ok(()) => {
                let previous = self.last_feed_us.swap(now_us, Ordering::AcqRel);
                self.max_feed_interval_us
                    .fetch_max(now_us.saturating_sub(previous), Ordering::Relaxed);
                self.feed_count.fetch_add(1, Ordering::Relaxed);
                self.consecutive_failures.store(0, Ordering::Relaxed);
            }
            Err(_) => {
                self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
            }
        }
        result
    }

    /// `Armed -> TimedOut`.
    ///
    /// # Errors
    ///
    /// [`HardwareWatchdogError::InvalidTransition`] from any other status.
    pub fn expire(&self) -> HardwareWatchdogResult<()> {
        self.swap_status(WatchdogStatus::Armed, WatchdogStatus::TimedOut)?;
        self.timeout_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Any status `-> SafeState`.
    ///
    /// # Errors
    ///
    /// [`HardwareWatchdogError::SafeStateAlreadyTriggered`] if already there.
    pub fn trigger_safe_state(&self) -> HardwareWatchdogResult<()> {
        let previous = self
            .status
            .swap(WatchdogStatus::SafeState.to_raw(), Ordering::AcqRel);
        if previous == WatchdogStatus::SafeState.to_raw() {
            return Err(HardwareWatchdogError::SafeStateAlreadyTriggered);
        }
        self.safe_state_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Expire the watchdog if it is armed and more than `timeout_us` passed
    /// since the last feed. Returns whether the watchdog is timed out.
    pub fn check_expiry(&self, now_us: u64, timeout_us: u64) -> bool {
        match self.status() {
            WatchdogStatus::TimedOut => true,
            WatchdogStatus::Armed => {
                let elapsed = now_us.saturating_sub(self.last_feed_us());
                elapsed > timeout_us
                    && (self.expire().is_ok() || self.status() == WatchdogStatus::TimedOut)
            }
            WatchdogStatus::Disarmed | WatchdogStatus::SafeState => false,
        }
    }

    /// Back to `Disarmed`. Counters are kept.
    pub fn reset(&self) {
        self.status
            .store(WatchdogStatus::Disarmed.to_raw(), Ordering::Release);
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    /// Microseconds of the last feed (or arm).
    #[must_use]
    pub fn last_feed_us(&self) -> u64 {
        self.last_feed_us.load(Ordering::Acquire)
    }

    /// Copy of the counters.
    #[must_use]
    pub fn metrics(&self) -> WatchdogMetrics {
        WatchdogMetrics {
            feed_count: self.feed_count.load(Ordering::Relaxed),
            arm_count: self.arm_count.load(Ordering::Relaxed),
            timeout_count: self.timeout_count.load(Ordering::Relaxed),
            safe_state_count: self.safe_state_count.load(Ordering::Relaxed),
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
            max_feed_interval_us: self.max_feed_interval_us.load(Ordering::Relaxed),
            last_feed_us: self.last_feed_us(),
        }
    }
}

/// Counter snapshot for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct WatchdogMetrics {
    /// Successful feeds.
    pub feed_count: u64,
    /// Successful arms.
    pub arm_count: u64,
    /// Expiries.
    pub timeout_count: u64,
    /// Safe-state triggers.
    pub safe_state_count: u64,
    /// Failed feeds since the last successful one.
    pub consecutive_failures: u32,
    /// Longest gap between two feeds.
    pub max_feed_interval_us: u64,
    /// Time of the last feed.
    pub last_feed_us: u64,
}

impl WatchdogMetrics {
    /// Share of successful feeds among recent attempts (0.0 to 1.0).
    #[expect(
        clippy::cast_precision_loss,
        reason = "ratio of counters, precision beyond 2^52 is irrelevant"
    )]
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        let total = self
            .feed_count
            .saturating_add(u64::from(self.consecutive_failures));
        if total == 0 {
            1.0
        } else {
            self.feed_count as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_arm_disarm_cycle() -> TestResult {
        let state = WatchdogState::new();
        state.arm(0)?;
        assert_eq!(state.status(), WatchdogStatus::Armed);
        assert!(state.arm(0).is_err());
        state.disarm()?;
        assert_eq!(state.status(), WatchdogStatus::Disarmed);
        assert_eq!(state.metrics().arm_count, 1);
        Ok(())
    }

    #[test]
    fn test_feed_tracks_interval_and_failures() -> TestResult {
        let state = WatchdogState::new();
        assert_eq!(state.feed(10), Err(HardwareWatchdogError::NotArmed));
        state.arm(100)?;
        state.feed(400)?;
        state.feed(500)?;
        let metrics = state.metrics();
        assert_eq!(metrics.feed_count, 2);
        assert_eq!(metrics.max_feed_interval_us, 300);
        assert_eq!(metrics.consecutive_failures, 0);
        assert_eq!(metrics.last_feed_us, 500);
        Ok(())
    }

    #[test]
    fn test_expired_watchdog_refuses_feed() -> TestResult {
        let state = WatchdogState::new();
        state.arm(0)?;
        state.expire()?;
        assert_eq!(state.feed(1), Err(HardwareWatchdogError::TimedOut));
        assert_eq!(state.metrics().consecutive_failures, 1);
        assert!(state.metrics().success_rate() < 1.0);
        Ok(())
    }

    #[test]
    fn test_check_expiry_fires_once() -> TestResult {
        let state = WatchdogState::new();
        state.arm(0)?;
        assert!(!state.check_expiry(1_000, 1_000));
        assert!(state.check_expiry(1_001, 1_000));
        assert!(state.check_expiry(5_000, 1_000));
        assert_eq!(state.metrics().timeout_count, 1);
        Ok(())
    }

    #[test]
    fn test_safe_state_is_terminal_until_reset() -> TestResult {
        let state = WatchdogState::new();
        state.trigger_safe_state()?;
        assert!(state.status().is_terminal());
        assert_eq!(
            state.trigger_safe_state(),
            Err(HardwareWatchdogError::SafeStateAlreadyTriggered)
        );
        assert!(state.arm(0).is_err());
        state.reset();
        state.arm(0)?;
        Ok(())
    }
}

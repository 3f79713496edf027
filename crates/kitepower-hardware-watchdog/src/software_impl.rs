//! In-process watchdog for development hosts and tests.

use std::time::Instant;

use portable_atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{info, warn};

use crate::config::WatchdogConfig;
use crate::error::HardwareWatchdogResult;
use crate::state::{WatchdogMetrics, WatchdogState, WatchdogStatus};
use crate::watchdog::HardwareWatchdog;

/// Software watchdog. Expiry is detected when the watchdog is polled; it
/// never resets the host.
///
/// ```rust
/// use kitepower_hardware_watchdog::{HardwareWatchdog, SoftwareWatchdog, WatchdogConfig};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut watchdog = SoftwareWatchdog::new(WatchdogConfig::new(100)?);
/// watchdog.set_elapsed_us(0);
/// watchdog.arm()?;
/// watchdog.set_elapsed_us(50_000);
/// watchdog.feed()?;
/// watchdog.set_elapsed_us(200_000);
/// assert!(watchdog.has_timed_out());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SoftwareWatchdog {
    config: WatchdogConfig,
    state: WatchdogState,
    origin: Instant,
    manual_time: AtomicBool,
    manual_us: AtomicU64,
}

impl SoftwareWatchdog {
    /// New disarmed watchdog using the monotonic clock.
    #[must_use]
    pub fn new(config: WatchdogConfig) -> Self {
        Self {
            config,
            state: WatchdogState::new(),
            origin: Instant::now(),
            manual_time: AtomicBool::new(false),
            manual_us: AtomicU64::new(0),
        }
    }

    /// Drive time by hand from now on. Used by tests.
    pub fn set_elapsed_us(&self, elapsed_us: u64) {
        self.manual_us.store(elapsed_us, Ordering::Release);
        self.manual_time.store(true, Ordering::Release);
    }

    fn now_us(&self) -> u64 {
        if self.manual_time.load(Ordering::Acquire) {
            self.manual_us.load(Ordering::Acquire)
        } else {
            u64::try_from(self.origin.elapsed().as_micros()).unwrap_or(u64::MAX)
        }
    }
}

impl HardwareWatchdog for SoftwareWatchdog {
    fn feed(&mut self) -> HardwareWatchdogResult<()> {
        let now = self.now_us();
        if self.state.check_expiry(now, self.config.timeout_us()) {
            warn!(timeout_ms = self.config.timeout_ms, "Software watchdog expired before feed");
        }
        self.state.feed(now)
    }

    fn arm(&mut self) -> HardwareWatchdogResult<()> {
        self.state.arm(self.now_us())?;
        info!(timeout_ms = self.config.timeout_ms, "Software watchdog armed");
        Ok(())
    }

    fn disarm(&mut self) -> HardwareWatchdogResult<()> {
        self.state.disarm()?;
        info!("Software watchdog disarmed");
        Ok(())
    }

    fn trigger_safe_state(&mut self) -> HardwareWatchdogResult<()> {
        self.state.trigger_safe_state()?;
        warn!("Software watchdog safe state triggered");
        Ok(())
    }

    fn has_timed_out(&self) -> bool {
        self.state
            .check_expiry(self.now_us(), self.config.timeout_us())
    }

    fn status(&self) -> WatchdogStatus {
        self.state.status()
    }

    fn time_since_last_feed_us(&self) -> Option<u64> {
        self.state
            .status()
            .is_active()
            .then(|| self.now_us().saturating_sub(self.state.last_feed_us()))
    }

    fn reset(&mut self) {
        self.state.reset();
    }

    fn config(&self) -> &WatchdogConfig {
        &self.config
    }

    fn metrics(&self) -> WatchdogMetrics {
        self.state.metrics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HardwareWatchdogError;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn manual(timeout_ms: u32) -> Result<SoftwareWatchdog, HardwareWatchdogError> {
        let watchdog = SoftwareWatchdog::new(WatchdogConfig::new(timeout_ms)?);
        watchdog.set_elapsed_us(0);
        Ok(watchdog)
    }

    #[test]
    fn test_feed_keeps_watchdog_alive() -> TestResult {
        let mut watchdog = manual(100)?;
        watchdog.arm()?;
        for step in 1..=10u64 {
            watchdog.set_elapsed_us(step * 90_000);
            watchdog.feed()?;
        }
        assert!(watchdog.is_healthy());
        assert_eq!(watchdog.metrics().feed_count, 10);
        assert_eq!(watchdog.metrics().max_feed_interval_us, 90_000);
        Ok(())
    }

    #[test]
    fn test_missed_deadline_times_out() -> TestResult {
        let mut watchdog = manual(100)?;
        watchdog.arm()?;
        watchdog.set_elapsed_us(100_001);
        assert_eq!(watchdog.feed(), Err(HardwareWatchdogError::TimedOut));
        assert_eq!(watchdog.status(), WatchdogStatus::TimedOut);
        assert!(!watchdog.is_healthy());
        Ok(())
    }

    #[test]
    fn test_time_since_last_feed_only_when_active() -> TestResult {
        let mut watchdog = manual(100)?;
        assert_eq!(watchdog.time_since_last_feed_us(), None);
        watchdog.arm()?;
        watchdog.set_elapsed_us(40_000);
        assert_eq!(watchdog.time_since_last_feed_us(), Some(40_000));
        Ok(())
    }

    #[test]
    fn test_reset_recovers_from_safe_state() -> TestResult {
        let mut watchdog = manual(100)?;
        watchdog.arm()?;
        watchdog.trigger_safe_state()?;
        assert!(watchdog.is_safe_state_triggered());
        watchdog.reset();
        assert_eq!(watchdog.status(), WatchdogStatus::Disarmed);
        watchdog.arm()?;
        Ok(())
    }
}

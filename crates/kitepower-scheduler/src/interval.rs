//! Interval throttling against an external monotonic time.

use std::time::Duration;

/// Fires at most once per `period` of the supplied time.
///
/// ```
/// use std::time::Duration;
/// use kitepower_scheduler::Interval;
///
/// let mut refresh = Interval::new(Duration::from_secs(1));
/// assert!(refresh.ready(Duration::from_millis(0)));
/// assert!(!refresh.ready(Duration::from_millis(999)));
/// assert!(refresh.ready(Duration::from_millis(1000)));
/// ```
#[derive(Debug, Clone)]
pub struct Interval {
    period: Duration,
    last: Option<Duration>,
}

impl Interval {
    /// An interval that fires on its first check.
    #[must_use]
    pub fn new(period: Duration) -> Self {
        Self { period, last: None }
    }

    /// The throttle period.
    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// `true` if at least one period elapsed since the last time this
    /// returned `true`. Records `now` when it fires.
    pub fn ready(&mut self, now: Duration) -> bool {
        let due = match self.last {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.period,
        };
        if due {
            self.last = Some(now);
        }
        due
    }

    /// Forget the last firing so the next check fires.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

//! Property tests for interval throttling.

use std::time::Duration;

use kitepower_scheduler::Interval;
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_interval_fires_at_most_once_per_period(
        period_ms in 1u64..5_000,
        steps in prop::collection::vec(0u64..2_000, 1..200),
    ) {
        let period = Duration::from_millis(period_ms);
        let mut interval = Interval::new(period);
        let mut now = Duration::ZERO;
        let mut last_fire: Option<Duration> = None;

        for step in steps {
            now += Duration::from_millis(step);
            if interval.ready(now) {
                if let Some(prev) = last_fire {
                    prop_assert!(now - prev >= period);
                }
                last_fire = Some(now);
            } else {
                let prev = last_fire.ok_or_else(|| TestCaseError::fail("must fire first"))?;
                prop_assert!(now - prev < period);
            }
        }
    }
}

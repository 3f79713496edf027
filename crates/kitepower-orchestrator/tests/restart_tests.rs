//! The deferred restart path.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use kitepower_orchestrator::{
    ChannelReset, PlatformReset, RestartJob, RestartScheduler, RestartSignal, RestartSpawner,
};
use kitepower_scheduler::SchedulerError;
use kitepower_state::RestartRequester;
use kitepower_test_helpers::prelude::*;
use tracing_test::traced_test;

#[derive(Debug, Default)]
struct CountingReset {
    resets: AtomicU32,
}

impl PlatformReset for CountingReset {
    fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

fn wait_for(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn test_requests_while_pending_coalesce() -> TestResult {
    let platform = Arc::new(CountingReset::default());
    let scheduler = RestartScheduler::new(platform.clone(), Duration::from_millis(10));
    assert!(!scheduler.is_pending());

    scheduler.request_system_restart(Duration::from_millis(30));
    scheduler.request_system_restart(Duration::from_millis(30));
    scheduler.request_system_restart(Duration::ZERO);

    assert_eq!(scheduler.requests(), 3);
    assert!(scheduler.is_pending());
    assert!(wait_for(|| platform.resets.load(Ordering::SeqCst) == 1));
    thread::sleep(Duration::from_millis(50));
    assert_eq!(platform.resets.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn test_restart_waits_for_delay() {
    let platform = Arc::new(CountingReset::default());
    let scheduler = RestartScheduler::new(platform.clone(), Duration::from_millis(10));

    scheduler.request_system_restart(Duration::from_millis(200));

    assert_eq!(platform.resets.load(Ordering::SeqCst), 0);
    assert!(wait_for(|| platform.resets.load(Ordering::SeqCst) == 1));
}

#[test]
fn test_channel_reset_signals_owner() -> TestResult {
    let (reset, rx) = ChannelReset::new();
    let scheduler = RestartScheduler::new(Arc::new(reset), Duration::from_millis(10));

    scheduler.request_system_restart(Duration::from_millis(20));

    let signal = rx.recv_timeout(Duration::from_secs(2))?;
    assert_eq!(signal, RestartSignal { requests: 1 });
    Ok(())
}

#[test]
#[traced_test]
fn test_restart_request_is_logged() {
    let platform = Arc::new(CountingReset::default());
    let scheduler = RestartScheduler::new(platform.clone(), Duration::from_millis(10));

    scheduler.request_system_restart(Duration::from_millis(5));
    scheduler.request_system_restart(Duration::from_millis(5));

    assert!(logs_contain("System restart requested"));
    assert!(logs_contain("Restart already pending"));
    assert!(wait_for(|| platform.resets.load(Ordering::SeqCst) == 1));
}

#[test]
#[traced_test]
fn test_failed_spawn_resets_directly_after_fallback_delay() {
    let platform = Arc::new(CountingReset::default());
    let attempts = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&attempts);
    let spawner: RestartSpawner = Arc::new(move |name: &str, _delay: Duration, _job: RestartJob| {
        seen.fetch_add(1, Ordering::SeqCst);
        Err(SchedulerError::SpawnFailed {
            name: name.to_owned(),
            source: io::Error::other("thread limit reached"),
        })
    });
    let scheduler =
        RestartScheduler::new(platform.clone(), Duration::from_millis(100)).with_spawner(spawner);

    let started = Instant::now();
    scheduler.request_system_restart(Duration::from_secs(5));
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_secs(5));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert_eq!(platform.resets.load(Ordering::SeqCst), 1);
    assert!(!scheduler.is_pending());
    assert!(logs_contain("Restart task not created"));
}

#[test]
fn test_returning_reset_accepts_a_new_request() {
    let platform = Arc::new(CountingReset::default());
    let scheduler = RestartScheduler::new(platform.clone(), Duration::from_millis(10));

    scheduler.request_system_restart(Duration::ZERO);
    assert!(wait_for(|| platform.resets.load(Ordering::SeqCst) == 1));
    assert!(wait_for(|| !scheduler.is_pending()));

    scheduler.request_system_restart(Duration::ZERO);
    assert!(wait_for(|| platform.resets.load(Ordering::SeqCst) == 2));
    assert_eq!(scheduler.requests(), 2);
}

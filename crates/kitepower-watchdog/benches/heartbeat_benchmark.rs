//! Benchmarks for the heartbeat and sweep paths.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use kitepower_error_manager::{ErrorManager, ErrorManagerConfig};
use kitepower_state::{MonotonicClock, StateConfig, SystemComponent, SystemStateManager};
use kitepower_watchdog::{WatchdogManager, WatchdogManagerConfig};

fn manager() -> WatchdogManager {
    let state = Arc::new(SystemStateManager::new(
        StateConfig::default(),
        Arc::new(MonotonicClock::new()),
    ));
    let errors = Arc::new(ErrorManager::new(
        ErrorManagerConfig::default(),
        Arc::clone(&state),
    ));
    let watchdog = WatchdogManager::builder(WatchdogManagerConfig::default(), state, errors).build();
    for component in SystemComponent::ALL {
        if watchdog.register_from_policy(component).is_err() {
            eprintln!("no policy for {component}");
        }
    }
    watchdog
}

fn bench_heartbeat(c: &mut Criterion) {
    let watchdog = manager();
    c.bench_function("watchdog_heartbeat", |b| {
        b.iter(|| black_box(watchdog.heartbeat(black_box(SystemComponent::Imu))));
    });
}

fn bench_quiet_sweep(c: &mut Criterion) {
    let watchdog = manager();
    c.bench_function("watchdog_sweep_all_healthy", |b| {
        b.iter(|| black_box(watchdog.sweep()));
    });
}

criterion_group!(benches, bench_heartbeat, bench_quiet_sweep);
criterion_main!(benches);

//! Breach detection and the built-in watchdog actions.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use kitepower_component::{ComponentDirectory, ComponentKind, LifecycleState, share};
use kitepower_error_manager::{ErrorManager, ErrorManagerConfig};
use kitepower_errors::ErrorCode;
use kitepower_state::{ComponentState, ManualClock, SystemState, SystemStateManager};
use kitepower_test_helpers::prelude::*;
use kitepower_watchdog::prelude::*;

struct Rig {
    clock: Arc<ManualClock>,
    state: Arc<SystemStateManager>,
    errors: Arc<ErrorManager>,
}

fn rig() -> Result<Rig, Box<dyn std::error::Error>> {
    let (clock, state) = manual_state();
    let config = ErrorManagerConfig::builder().without_default_strategies().build()?;
    let errors = Arc::new(ErrorManager::new(config, Arc::clone(&state)));
    Ok(Rig {
        clock,
        state,
        errors,
    })
}

impl Rig {
    fn watchdog(&self) -> WatchdogManager {
        WatchdogManager::builder(
            WatchdogManagerConfig::default(),
            Arc::clone(&self.state),
            Arc::clone(&self.errors),
        )
        .build()
    }
}

#[test]
fn test_sustained_breach_fires_once() -> TestResult {
    let rig = rig()?;
    let watchdog = rig.watchdog();
    watchdog.register_component(SystemComponent::Imu, 500, WatchdogAction::LogOnly)?;

    rig.clock.advance_ms(600);
    let first = watchdog.sweep()?;
    rig.clock.advance_ms(100);
    let second = watchdog.sweep()?;
    rig.clock.advance_ms(100);
    let third = watchdog.sweep()?;

    assert_eq!(first.len(), 1);
    assert!(second.is_empty());
    assert!(third.is_empty());
    assert_eq!(rig.errors.error_count(ErrorCode::WatchdogTimeout), 1);
    assert_eq!(watchdog.total_breaches(), 1);

    let entry = watchdog.entry(SystemComponent::Imu).ok_or("not registered")?;
    assert!(entry.in_breach);
    assert_eq!(entry.error_count, 1);
    Ok(())
}

#[test]
fn test_heartbeat_ends_breach_and_rearms() -> TestResult {
    let rig = rig()?;
    let watchdog = rig.watchdog();
    watchdog.register_component(SystemComponent::Wifi, 200, WatchdogAction::LogOnly)?;

    rig.clock.advance_ms(300);
    assert_eq!(watchdog.sweep()?.len(), 1);
    watchdog.heartbeat(SystemComponent::Wifi)?;
    assert!(!watchdog.entry(SystemComponent::Wifi).ok_or("not registered")?.in_breach);

    rig.clock.advance_ms(300);
    let outcomes = watchdog.sweep()?;
    assert_eq!(outcomes.len(), 1);
    let outcome = outcomes.first().ok_or("no outcome")?;
    assert_eq!(outcome.breach.error_count, 2);
    assert_eq!(outcome.breach.elapsed, Duration::from_millis(300));
    Ok(())
}

#[test]
fn test_regular_heartbeats_never_breach() -> TestResult {
    let rig = rig()?;
    let watchdog = rig.watchdog();
    watchdog.register_component(SystemComponent::Autopilot, 1000, WatchdogAction::SafeMode)?;
    for _ in 0..50 {
        rig.clock.advance_ms(900);
        watchdog.heartbeat(SystemComponent::Autopilot)?;
        assert!(watchdog.sweep()?.is_empty());
    }
    assert_eq!(rig.state.current_state(), SystemState::Init);
    Ok(())
}

#[test]
fn test_breach_report_names_the_component() -> TestResult {
    let rig = rig()?;
    let watchdog = rig.watchdog();
    watchdog.register_component(SystemComponent::LineSensor, 1000, WatchdogAction::LogOnly)?;
    rig.clock.advance_ms(1500);
    watchdog.sweep()?;

    let history = rig.errors.error_history();
    let report = history.last().ok_or("nothing reported")?;
    assert_eq!(report.code, ErrorCode::WatchdogTimeout);
    assert_eq!(report.module, SystemComponent::LineSensor.as_str());
    assert!(report.description.contains("1500 ms"));
    assert!(!report.resolved);
    Ok(())
}

#[test]
fn test_safe_mode_action_escalates_running_system() -> TestResult {
    let rig = rig()?;
    boot_to_running(&rig.state);
    let watchdog = rig.watchdog();
    watchdog.register_component(SystemComponent::Servos, 500, WatchdogAction::SafeMode)?;

    rig.clock.advance_ms(501);
    let outcomes = watchdog.sweep()?;
    assert!(matches!(outcomes.as_slice(), [outcome] if outcome.succeeded));
    assert_eq!(rig.state.current_state(), SystemState::SafeMode);
    assert_eq!(rig.state.safe_mode_entries(), 1);
    Ok(())
}

#[test]
fn test_reset_system_action_uses_restart_path() -> TestResult {
    let rig = rig()?;
    let restart = CountingRestart::new();
    let config = WatchdogManagerConfig::builder().restart_delay_ms(40).build()?;
    let watchdog = WatchdogManager::builder(config, Arc::clone(&rig.state), Arc::clone(&rig.errors))
        .restart_requester(restart.clone())
        .build();
    watchdog.register_from_policy(SystemComponent::Power)?;

    rig.clock.advance_ms(2001);
    watchdog.sweep()?;
    rig.clock.advance_ms(2001);
    watchdog.sweep()?;

    assert_eq!(restart.requests(), 1);
    assert_eq!(restart.delays(), vec![Duration::from_millis(40)]);
    Ok(())
}

#[test]
fn test_reset_system_without_restart_path_fails() -> TestResult {
    let rig = rig()?;
    let watchdog = rig.watchdog();
    watchdog.register_component(SystemComponent::Power, 100, WatchdogAction::ResetSystem)?;
    rig.clock.advance_ms(200);
    let outcomes = watchdog.sweep()?;
    assert!(matches!(outcomes.as_slice(), [outcome] if !outcome.succeeded));
    Ok(())
}

#[test]
fn test_reset_component_recovers_and_refreshes_heartbeat() -> TestResult {
    let rig = rig()?;
    let directory = Arc::new(ComponentDirectory::new());
    let imu = MockComponent::new("imu", ComponentKind::Sensor);
    let probe = imu.probe();
    let imu = share(imu);
    directory.bind(SystemComponent::Imu, imu.clone())?;
    {
        let mut guard = imu.lock();
        guard.initialize()?;
        guard.enable()?;
    }

    let watchdog = WatchdogManager::builder(
        WatchdogManagerConfig::default(),
        Arc::clone(&rig.state),
        Arc::clone(&rig.errors),
    )
    .directory(directory)
    .build();
    watchdog.register_from_policy(SystemComponent::Imu)?;

    rig.clock.advance_ms(700);
    let outcomes = watchdog.sweep()?;
    assert!(matches!(outcomes.as_slice(), [outcome] if outcome.succeeded));
    assert_eq!(probe.initializations(), 2);
    assert_eq!(imu.lock().state(), LifecycleState::Active);
    assert_eq!(
        rig.state.component_state(SystemComponent::Imu),
        ComponentState::Operational
    );

    let entry = watchdog.entry(SystemComponent::Imu).ok_or("not registered")?;
    assert!(!entry.in_breach);
    assert_eq!(entry.last_heartbeat, Duration::from_millis(700));
    assert_eq!(rig.errors.unresolved_error_count()?, 0);
    Ok(())
}

#[test]
fn test_failed_reset_leaves_component_in_error() -> TestResult {
    let rig = rig()?;
    let directory = Arc::new(ComponentDirectory::new());
    let wifi = MockComponent::new("wifi", ComponentKind::Service);
    let probe = wifi.probe();
    directory.bind(SystemComponent::Wifi, share(wifi))?;
    probe.set_fail_initialize(true);

    let watchdog = WatchdogManager::builder(
        WatchdogManagerConfig::default(),
        Arc::clone(&rig.state),
        Arc::clone(&rig.errors),
    )
    .directory(directory)
    .build();
    watchdog.register_component(SystemComponent::Wifi, 100, WatchdogAction::ResetComponent)?;

    rig.clock.advance_ms(150);
    let outcomes = watchdog.sweep()?;
    assert!(matches!(outcomes.as_slice(), [outcome] if !outcome.succeeded));
    assert_eq!(rig.state.component_state(SystemComponent::Wifi), ComponentState::Error);
    assert!(watchdog.entry(SystemComponent::Wifi).ok_or("not registered")?.in_breach);
    Ok(())
}

#[test]
fn test_custom_handler_replaces_builtin() -> TestResult {
    let rig = rig()?;
    let watchdog = rig.watchdog();
    let calls = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&calls);
    watchdog.set_action_handler(WatchdogAction::SafeMode, move |breach| {
        assert_eq!(breach.component, SystemComponent::Winch);
        seen.fetch_add(1, Ordering::SeqCst);
        true
    });
    watchdog.register_from_policy(SystemComponent::Winch)?;

    rig.clock.advance_ms(501);
    watchdog.sweep()?;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(rig.state.current_state(), SystemState::Init);
    Ok(())
}

#[test]
fn test_handler_may_heartbeat_from_inside_sweep() -> TestResult {
    let rig = rig()?;
    let watchdog = Arc::new(rig.watchdog());
    let inner = Arc::downgrade(&watchdog);
    watchdog.set_action_handler(WatchdogAction::LogOnly, move |breach| {
        inner
            .upgrade()
            .is_some_and(|watchdog| watchdog.heartbeat(breach.component).is_ok())
    });
    watchdog.register_component(SystemComponent::Display, 100, WatchdogAction::LogOnly)?;

    rig.clock.advance_ms(200);
    let outcomes = watchdog.sweep()?;
    assert!(matches!(outcomes.as_slice(), [outcome] if outcome.succeeded));
    assert!(!watchdog.entry(SystemComponent::Display).ok_or("not registered")?.in_breach);
    Ok(())
}

#[test]
fn test_register_from_policy_rejects_missing_row() -> TestResult {
    let rig = rig()?;
    let config = WatchdogManagerConfig {
        policies: Vec::new(),
        ..WatchdogManagerConfig::default()
    };
    let watchdog = WatchdogManager::builder(config, Arc::clone(&rig.state), Arc::clone(&rig.errors)).build();
    assert!(matches!(
        watchdog.register_from_policy(SystemComponent::Imu),
        Err(WatchdogError::InvalidConfiguration(_))
    ));
    Ok(())
}

#[test]
fn test_zero_timeout_is_rejected() -> TestResult {
    let rig = rig()?;
    let watchdog = rig.watchdog();
    assert_eq!(
        watchdog.register_component(SystemComponent::Imu, 0, WatchdogAction::LogOnly),
        Err(WatchdogError::InvalidTimeout(SystemComponent::Imu))
    );
    assert!(watchdog.registered_components().is_empty());
    Ok(())
}

#[test]
fn test_entry_snapshot() -> TestResult {
    let rig = rig()?;
    let watchdog = rig.watchdog();
    watchdog.register_from_policy(SystemComponent::Buttons)?;
    rig.clock.advance_ms(5001);
    watchdog.sweep()?;
    let entry = watchdog.entry(SystemComponent::Buttons).ok_or("not registered")?;
    insta::assert_snapshot!(serde_json::to_string_pretty(&entry)?, @r###"
    {
      "component": "BUTTONS",
      "timeout": {
        "secs": 5,
        "nanos": 0
      },
      "action": "LOG_ONLY",
      "last_heartbeat": {
        "secs": 0,
        "nanos": 0
      },
      "error_count": 1,
      "suspended": false,
      "in_breach": true
    }
    "###);
    Ok(())
}

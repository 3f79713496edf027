//! Heartbeat breaches flowing into the error manager and the restart path.

use std::time::Duration;

use kitepower_component::ComponentKind;
use kitepower_errors::ErrorCode;
use kitepower_integration_tests::KiteRig;
use kitepower_orchestrator::RestartSignal;
use kitepower_state::{SystemComponent, SystemState};
use kitepower_test_helpers::prelude::*;
use kitepower_watchdog::WatchdogAction;
use tracing_test::traced_test;

#[test]
fn test_sustained_breach_is_reported_once() -> TestResult {
    let rig = KiteRig::builder().required(&[]).build()?;
    rig.system.orchestrator.initialize()?;
    rig.system
        .watchdog
        .register_component(SystemComponent::Display, 500, WatchdogAction::LogOnly)?;

    for _ in 0..3 {
        rig.advance_ms(500);
        rig.system.watchdog.sweep()?;
    }
    assert_eq!(rig.system.errors.error_count(ErrorCode::WatchdogTimeout), 1);

    rig.system.watchdog.heartbeat(SystemComponent::Display)?;
    rig.advance_ms(400);
    assert!(rig.system.watchdog.sweep()?.is_empty());
    rig.advance_ms(200);
    assert_eq!(rig.system.watchdog.sweep()?.len(), 1);
    assert_eq!(rig.system.errors.error_count(ErrorCode::WatchdogTimeout), 2);

    let history = rig.system.errors.error_history();
    assert!(history.iter().all(|entry| entry.module == "DISPLAY"));
    assert_eq!(rig.system.state.current_state(), SystemState::Init);
    Ok(())
}

#[test]
#[traced_test]
fn test_breach_and_action_are_logged() -> TestResult {
    let rig = KiteRig::builder()
        .required(&[SystemComponent::Imu])
        .component(
            SystemComponent::Imu,
            MockComponent::new("imu", ComponentKind::Sensor),
        )
        .build()?;
    rig.boot_to_running()?;
    rig.advance_ms(501);
    rig.system.watchdog.sweep()?;

    assert!(logs_contain("Watchdog breach"));
    assert!(logs_contain("IMU"));
    Ok(())
}

#[test]
fn test_power_silence_requests_one_restart() -> TestResult {
    let rig = KiteRig::builder()
        .required(&[SystemComponent::Power])
        .config(|config| config.watchdog.restart_delay_ms = 250)
        .component(
            SystemComponent::Power,
            MockComponent::new("power", ComponentKind::Service),
        )
        .build()?;
    rig.boot_to_running()?;

    rig.advance_ms(2001);
    rig.system.watchdog.sweep()?;
    rig.advance_ms(2001);
    rig.system.watchdog.sweep()?;

    assert_eq!(rig.restart.requests(), 1);
    assert_eq!(rig.restart.delays(), vec![Duration::from_millis(250)]);
    assert_eq!(rig.system.state.current_state(), SystemState::Running);
    Ok(())
}

#[test]
fn test_scheduled_restart_signals_once() -> TestResult {
    let rig = KiteRig::builder()
        .scheduled_restart()
        .required(&[SystemComponent::Power])
        .config(|config| config.watchdog.restart_delay_ms = 10)
        .component(
            SystemComponent::Power,
            MockComponent::new("power", ComponentKind::Service),
        )
        .build()?;
    rig.boot_to_running()?;
    let signal = rig.system.restart_signal().ok_or("no restart channel")?;

    rig.advance_ms(2001);
    rig.system.watchdog.sweep()?;
    rig.system.watchdog.heartbeat(SystemComponent::Power)?;
    rig.advance_ms(2001);
    rig.system.watchdog.sweep()?;

    assert_eq!(
        signal.recv_timeout(Duration::from_secs(2))?,
        RestartSignal { requests: 1 }
    );
    std::thread::sleep(Duration::from_millis(50));
    assert!(signal.try_recv().is_err());
    assert_eq!(rig.restart.requests(), 0);
    Ok(())
}

#[test]
fn test_suspended_component_survives_long_silence() -> TestResult {
    let rig = KiteRig::builder()
        .required(&[SystemComponent::Winch])
        .component(
            SystemComponent::Winch,
            MockComponent::new("winch", ComponentKind::Actuator).with_safe_state(),
        )
        .build()?;
    rig.boot_to_running()?;

    rig.system
        .watchdog
        .suspend_component_monitoring(SystemComponent::Winch, true)?;
    rig.advance_ms(10_000);
    assert!(rig.system.watchdog.sweep()?.is_empty());

    rig.system
        .watchdog
        .suspend_component_monitoring(SystemComponent::Winch, false)?;
    rig.advance_ms(400);
    assert!(rig.system.watchdog.sweep()?.is_empty());
    assert_eq!(rig.system.state.current_state(), SystemState::Running);
    Ok(())
}

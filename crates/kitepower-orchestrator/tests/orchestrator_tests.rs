//! Boot sequencing, the orchestrator tick and system-wide requests.

use std::sync::Arc;
use std::time::Duration;

use kitepower_component::{ComponentKind, LifecycleState, share};
use kitepower_errors::{ErrorCode, ErrorSeverity};
use kitepower_hardware_watchdog::{DevWatchdog, SoftwareWatchdog, WatchdogConfig, WatchdogStatus};
use kitepower_orchestrator::prelude::*;
use kitepower_state::ManualClock;
use kitepower_test_helpers::prelude::*;
use kitepower_watchdog::WatchdogAction;
use tracing_test::traced_test;

struct Rig {
    clock: Arc<ManualClock>,
    restart: Arc<CountingRestart>,
    system: KiteSystem,
}

fn sample() -> ResourceSample {
    ResourceSample {
        free_memory: 180_000,
        total_memory: 320_000,
        cpu_count: 2,
    }
}

fn rig(components: Vec<(SystemComponent, MockComponent)>) -> Result<Rig, Box<dyn std::error::Error>> {
    let clock = Arc::new(ManualClock::new());
    let restart = CountingRestart::new();
    let mut builder = KiteSystem::builder(KiteConfig::default())
        .clock(clock.clone())
        .restart_requester(restart.clone())
        .hardware_watchdog(Box::new(SoftwareWatchdog::new(WatchdogConfig::default())))
        .info_probe(Box::new(FixedProbe::new(sample())));
    for (id, component) in components {
        builder = builder.component(id, share(component));
    }
    Ok(Rig {
        clock,
        restart,
        system: builder.build()?,
    })
}

fn flight_set() -> Vec<(SystemComponent, MockComponent)> {
    vec![
        (SystemComponent::Imu, MockComponent::new("imu", ComponentKind::Sensor).with_calibration()),
        (SystemComponent::Servos, MockComponent::new("servos", ComponentKind::Actuator).with_safe_state()),
        (SystemComponent::Winch, MockComponent::new("winch", ComponentKind::Actuator).with_safe_state()),
    ]
}

fn probes(components: &[(SystemComponent, MockComponent)]) -> Vec<Arc<MockProbe>> {
    components.iter().map(|(_, c)| c.probe()).collect()
}

#[test]
fn test_initialize_is_idempotent() -> TestResult {
    let rig = rig(Vec::new())?;
    let orchestrator = &rig.system.orchestrator;
    assert_eq!(orchestrator.lifecycle(), LifecycleState::Uninitialized);

    orchestrator.initialize()?;
    orchestrator.initialize()?;

    assert_eq!(orchestrator.lifecycle(), LifecycleState::Active);
    assert_eq!(orchestrator.hardware_watchdog_status(), Some(WatchdogStatus::Armed));
    let metrics = orchestrator.hardware_watchdog_metrics().ok_or("watchdog busy")?;
    assert_eq!(metrics.arm_count, 1);
    assert!(orchestrator.is_system_healthy());
    Ok(())
}

#[test]
fn test_missing_hardware_watchdog_is_critical_but_not_fatal() -> TestResult {
    let dir = tempfile::tempdir()?;
    let device = DevWatchdog::new(WatchdogConfig::default(), dir.path().join("absent"));
    let clock = Arc::new(ManualClock::new());
    let system = KiteSystem::builder(KiteConfig::default())
        .clock(clock)
        .hardware_watchdog(Box::new(device))
        .info_probe(Box::new(FixedProbe::new(sample())))
        .build()?;

    system.orchestrator.initialize()?;

    assert_eq!(system.orchestrator.lifecycle(), LifecycleState::Active);
    let history = system.errors.error_history();
    let report = history.first().ok_or("nothing reported")?;
    assert_eq!(report.code, ErrorCode::HardwareWatchdogFailure);
    assert_eq!(report.severity, ErrorSeverity::Critical);
    assert!(!system.orchestrator.is_system_healthy());
    assert_eq!(system.state.current_state(), SystemState::Init);
    Ok(())
}

#[test]
fn test_start_components_reaches_ready() -> TestResult {
    let components = flight_set();
    let probes = probes(&components);
    let rig = rig(components)?;
    rig.system.orchestrator.initialize()?;

    let summary = rig.system.orchestrator.start_components()?;

    assert_eq!(
        summary.started,
        vec![SystemComponent::Imu, SystemComponent::Servos, SystemComponent::Winch]
    );
    assert!(summary.failed.is_empty());
    assert_eq!(summary.monitored, summary.started);
    assert_eq!(rig.system.state.current_state(), SystemState::Ready);
    assert!(rig.system.state.are_components_in_state(&summary.started, ComponentState::Operational));
    assert!(probes.iter().all(|p| p.initializations() == 1 && p.enables() == 1));
    assert_eq!(rig.system.registry.names(), vec!["imu", "servos", "winch"]);

    let imu = rig
        .system
        .watchdog
        .entry(SystemComponent::Imu)
        .ok_or("imu not monitored")?;
    assert_eq!(imu.action, WatchdogAction::ResetComponent);
    Ok(())
}

#[test]
fn test_failed_required_component_moves_to_error() -> TestResult {
    let components = flight_set();
    let probes = probes(&components);
    probes.first().ok_or("no imu")?.set_fail_initialize(true);
    let rig = rig(components)?;
    rig.system.orchestrator.initialize()?;

    let result = rig.system.orchestrator.start_components();

    assert!(matches!(
        result,
        Err(OrchestratorError::StartupFailed(ref missing)) if missing == &[SystemComponent::Imu]
    ));
    assert_eq!(rig.system.state.current_state(), SystemState::Error);
    assert_eq!(
        rig.system.state.component_state(SystemComponent::Imu),
        ComponentState::Error
    );
    assert_eq!(rig.system.errors.error_count(ErrorCode::ComponentInitFailed), 1);
    assert!(rig.system.watchdog.entry(SystemComponent::Imu).is_none());
    Ok(())
}

#[test]
fn test_optional_component_failure_does_not_block_ready() -> TestResult {
    let mut components = flight_set();
    let display = MockComponent::new("display", ComponentKind::Output);
    display.probe().set_fail_initialize(true);
    components.push((SystemComponent::Display, display));
    let rig = rig(components)?;
    rig.system.orchestrator.initialize()?;

    let summary = rig.system.orchestrator.start_components()?;

    assert_eq!(
        summary.failed,
        vec![(SystemComponent::Display, ErrorCode::ComponentInitFailed)]
    );
    assert_eq!(rig.system.state.current_state(), SystemState::Ready);
    assert!(!rig.system.orchestrator.is_system_healthy());
    Ok(())
}

#[test]
fn test_start_requires_initialize() -> TestResult {
    let rig = rig(flight_set())?;
    assert!(matches!(
        rig.system.orchestrator.start_components(),
        Err(OrchestratorError::NotInitialized)
    ));
    assert_eq!(rig.system.state.current_state(), SystemState::Init);
    Ok(())
}

#[test]
fn test_run_feeds_watchdog_and_throttles_info() -> TestResult {
    let rig = rig(Vec::new())?;
    let orchestrator = &rig.system.orchestrator;
    orchestrator.run();
    assert_eq!(orchestrator.system_info().refreshes, 0);

    orchestrator.initialize()?;
    orchestrator.run();
    rig.clock.advance_ms(400);
    orchestrator.run();
    rig.clock.advance_ms(400);
    orchestrator.run();

    let info = orchestrator.system_info();
    assert_eq!(info.refreshes, 1);
    assert_eq!(info.free_memory, 180_000);

    rig.clock.advance_ms(200);
    orchestrator.run();
    let info = orchestrator.system_info();
    assert_eq!(info.refreshes, 2);
    assert_eq!(info.uptime_ms, 1000);

    let metrics = orchestrator.hardware_watchdog_metrics().ok_or("watchdog busy")?;
    assert_eq!(metrics.feed_count, 4);
    Ok(())
}

#[test]
fn test_safe_posture_applied_once_per_entry() -> TestResult {
    let components = flight_set();
    let probes = probes(&components);
    let rig = rig(components)?;
    rig.system.boot()?;
    rig.system.state.transition_to(SystemState::Running, "start")?;

    rig.system.state.escalate_to_safe_mode("winch jammed")?;
    rig.system.orchestrator.run();
    rig.system.orchestrator.run();
    let servos = probes.get(1).ok_or("no servos")?;
    let imu = probes.first().ok_or("no imu")?;
    assert_eq!(servos.safe_states(), 1);
    assert_eq!(imu.safe_states(), 0);

    rig.system.state.transition_to(SystemState::Init, "recovered")?;
    rig.system.state.transition_to(SystemState::Ready, "ready")?;
    rig.system.state.transition_to(SystemState::Running, "start")?;
    rig.system.orchestrator.run();
    assert_eq!(servos.safe_states(), 1);

    rig.system.state.escalate_to_safe_mode("line tension exceeded")?;
    rig.system.orchestrator.run();
    assert_eq!(servos.safe_states(), 2);
    Ok(())
}

#[test]
fn test_calibration_suspends_monitoring() -> TestResult {
    let components = flight_set();
    let imu_probe = probes(&components).into_iter().next().ok_or("no imu")?;
    let rig = rig(components)?;
    rig.system.boot()?;

    let calibrating = rig.system.orchestrator.request_enter_calibration_mode()?;
    assert_eq!(calibrating, vec![SystemComponent::Imu]);
    assert_eq!(rig.system.state.current_state(), SystemState::Calibration);
    assert_eq!(
        rig.system.state.component_state(SystemComponent::Imu),
        ComponentState::Calibrating
    );
    assert_eq!(imu_probe.calibrations(), 1);

    rig.clock.advance_ms(5_000);
    rig.system.watchdog.heartbeat(SystemComponent::Servos)?;
    rig.system.watchdog.heartbeat(SystemComponent::Winch)?;
    assert!(rig.system.watchdog.sweep()?.is_empty());
    assert!(rig
        .system
        .watchdog
        .entry(SystemComponent::Imu)
        .is_some_and(|entry| entry.suspended));

    rig.system.orchestrator.request_exit_calibration_mode()?;
    assert_eq!(rig.system.state.current_state(), SystemState::Ready);
    assert_eq!(
        rig.system.state.component_state(SystemComponent::Imu),
        ComponentState::Operational
    );
    let entry = rig
        .system
        .watchdog
        .entry(SystemComponent::Imu)
        .ok_or("imu not monitored")?;
    assert!(!entry.suspended);
    assert_eq!(entry.last_heartbeat, Duration::from_millis(5_000));
    Ok(())
}

#[test]
fn test_exit_calibration_requires_calibration_state() -> TestResult {
    let rig = rig(flight_set())?;
    rig.system.boot()?;
    assert!(matches!(
        rig.system.orchestrator.request_exit_calibration_mode(),
        Err(OrchestratorError::State(_))
    ));
    assert_eq!(rig.system.state.current_state(), SystemState::Ready);
    Ok(())
}

#[test]
fn test_power_save_round_trip() -> TestResult {
    let rig = rig(flight_set())?;
    rig.system.boot()?;
    let orchestrator = &rig.system.orchestrator;

    assert!(orchestrator.request_enter_power_save_mode().is_err());
    assert_eq!(rig.system.state.current_state(), SystemState::Ready);

    orchestrator.request_system_state_change(SystemState::Running, "operator start")?;
    orchestrator.request_enter_power_save_mode()?;
    assert_eq!(rig.system.state.current_state(), SystemState::PowerSave);
    orchestrator.request_exit_power_save_mode()?;
    assert_eq!(rig.system.state.current_state(), SystemState::Running);
    Ok(())
}

#[test]
fn test_health_follows_unresolved_errors() -> TestResult {
    let rig = rig(flight_set())?;
    rig.system.boot()?;
    assert!(rig.system.orchestrator.is_system_healthy());

    rig.system.errors.report(ErrorCode::ReceiveFailed, "WIFI", "dropped frame")?;
    assert!(!rig.system.orchestrator.is_system_healthy());

    assert!(rig.system.errors.resolve_error(ErrorCode::ReceiveFailed, None));
    assert!(rig.system.orchestrator.is_system_healthy());
    Ok(())
}

#[test]
fn test_restart_request_is_delegated_once() -> TestResult {
    let rig = rig(Vec::new())?;
    rig.system
        .orchestrator
        .request_system_restart(Duration::from_millis(500));
    assert_eq!(rig.restart.requests(), 1);
    assert_eq!(rig.restart.delays(), vec![Duration::from_millis(500)]);
    Ok(())
}

#[test]
fn test_update_components_heartbeats_successful_updates() -> TestResult {
    let components = flight_set();
    let imu_probe = probes(&components).into_iter().next().ok_or("no imu")?;
    let rig = rig(components)?;
    rig.system.boot()?;

    rig.clock.advance_ms(400);
    assert_eq!(rig.system.orchestrator.update_components(), 3);
    rig.clock.advance_ms(400);
    assert!(rig.system.watchdog.sweep()?.is_empty());

    imu_probe.set_fail_update(true);
    rig.clock.advance_ms(50);
    assert_eq!(rig.system.orchestrator.update_components(), 2);
    rig.clock.advance_ms(100);
    rig.system.orchestrator.update_components();
    let fired = rig.system.watchdog.sweep()?;
    assert!(matches!(fired.as_slice(), [o] if o.breach.component == SystemComponent::Imu));
    Ok(())
}

#[test]
#[traced_test]
fn test_failing_update_warns_once_per_run() -> TestResult {
    let components = flight_set();
    let imu_probe = probes(&components).into_iter().next().ok_or("no imu")?;
    let rig = rig(components)?;
    rig.system.boot()?;

    imu_probe.set_fail_update(true);
    for _ in 0..3 {
        assert_eq!(rig.system.orchestrator.update_components(), 2);
    }
    imu_probe.set_fail_update(false);
    assert_eq!(rig.system.orchestrator.update_components(), 3);

    logs_assert(|lines: &[&str]| {
        let warned = lines
            .iter()
            .filter(|line| line.contains("WARN") && line.contains("Component update failed"))
            .count();
        if warned == 1 {
            Ok(())
        } else {
            Err(format!("expected one update warning, saw {warned}"))
        }
    });
    assert!(logs_contain("Component updates succeeding again"));
    Ok(())
}

#[test]
fn test_status_report_reflects_fault_states() -> TestResult {
    let rig = rig(flight_set())?;
    rig.system.boot()?;
    rig.system.state.transition_to(SystemState::Running, "start")?;
    rig.clock.advance_ms(250);
    rig.system.state.escalate_to_safe_mode("servo stalled")?;

    let report = rig.system.orchestrator.status_report();
    assert_eq!(report.state, SystemState::SafeMode);
    insta::assert_snapshot!(report.state_label, @"FAULT - safe mode");
    assert_eq!(report.previous_state, Some(SystemState::Running));
    assert_eq!(report.state_reason, "servo stalled");
    assert_eq!(report.modules.len(), 3);
    assert_eq!(report.watchdog.len(), 3);
    assert_eq!(report.hardware_watchdog, Some(WatchdogStatus::Armed));
    assert!(report.healthy);

    let json = serde_json::to_value(&report)?;
    assert_eq!(json["state"], "SAFE_MODE");
    assert_eq!(json["components"]["IMU"], "OPERATIONAL");
    Ok(())
}

#[test]
fn test_shutdown_from_power_save_goes_through_error() -> TestResult {
    let components = flight_set();
    let probes = probes(&components);
    let rig = rig(components)?;
    rig.system.boot()?;
    let orchestrator = &rig.system.orchestrator;
    orchestrator.request_system_state_change(SystemState::Running, "start")?;
    orchestrator.request_enter_power_save_mode()?;

    orchestrator.shutdown("operator power off")?;

    assert_eq!(rig.system.state.current_state(), SystemState::Shutdown);
    assert_eq!(rig.system.state.previous_state(), Some(SystemState::Error));
    assert!(rig.system.watchdog.registered_components().is_empty());
    assert!(probes.iter().all(|p| p.shutdowns() == 1));
    assert_eq!(
        rig.system.state.component_state(SystemComponent::Winch),
        ComponentState::Inactive
    );
    assert_eq!(orchestrator.hardware_watchdog_status(), Some(WatchdogStatus::Disarmed));
    assert_eq!(orchestrator.lifecycle(), LifecycleState::Disabled);
    Ok(())
}

//! Registry behavior: unique names, insertion order, weak observation.

use std::sync::Arc;

use kitepower_component::prelude::*;
use proptest::prelude::*;

type TestResult = Result<(), Box<dyn std::error::Error>>;

struct Plain {
    core: ComponentCore,
}

impl Plain {
    fn shared(name: &str, kind: ComponentKind) -> SharedComponent {
        share(Plain {
            core: ComponentCore::new(name, kind),
        })
    }
}

impl ManagedComponent for Plain {
    fn core(&self) -> &ComponentCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut ComponentCore {
        &mut self.core
    }
}

#[test]
fn test_names_keep_registration_order() -> TestResult {
    let registry = ComponentRegistry::new();
    let imu = Plain::shared("imu", ComponentKind::Sensor);
    let winch = Plain::shared("winch", ComponentKind::Actuator);
    let display = Plain::shared("display", ComponentKind::Output);
    registry.register(&imu)?;
    registry.register(&winch)?;
    registry.register(&display)?;

    assert_eq!(registry.names(), vec!["imu", "winch", "display"]);
    assert_eq!(registry.len(), 3);
    assert!(registry.contains("winch"));
    assert!(!registry.contains("radar"));
    Ok(())
}

#[test]
fn test_duplicate_name_is_rejected() -> TestResult {
    let registry = ComponentRegistry::new();
    let first = Plain::shared("imu", ComponentKind::Sensor);
    let second = Plain::shared("imu", ComponentKind::Sensor);
    registry.register(&first)?;

    let err = registry.register(&second);
    assert_eq!(err, Err(ComponentError::DuplicateName("imu".into())));
    assert_eq!(registry.len(), 1);
    Ok(())
}

#[test]
fn test_get_returns_same_component() -> TestResult {
    let registry = ComponentRegistry::new();
    let imu = Plain::shared("imu", ComponentKind::Sensor);
    registry.register(&imu)?;

    let found = registry.get("imu").ok_or("imu not found")?;
    assert!(Arc::ptr_eq(&found, &imu));
    found.lock().initialize()?;
    assert_eq!(imu.lock().state(), LifecycleState::Idle);
    Ok(())
}

#[test]
fn test_registry_does_not_own_components() -> TestResult {
    let registry = ComponentRegistry::new();
    let temp = Plain::shared("temp", ComponentKind::Service);
    registry.register(&temp)?;
    drop(temp);

    assert!(registry.get("temp").is_none());
    assert!(registry.contains("temp"));
    let listing = registry.list();
    let row = listing.first().ok_or("missing row")?;
    assert!(!row.alive);
    assert_eq!(row.state, "UNKNOWN");
    Ok(())
}

#[test]
fn test_list_reports_live_state() -> TestResult {
    let registry = ComponentRegistry::new();
    let servo = Plain::shared("servo", ComponentKind::Actuator);
    registry.register(&servo)?;
    {
        let mut guard = servo.lock();
        guard.initialize()?;
        guard.enable()?;
    }

    let listing = registry.list();
    let row = listing.first().ok_or("missing row")?;
    assert_eq!(row.name, "servo");
    assert_eq!(row.kind, ComponentKind::Actuator);
    assert_eq!(row.state, "ACTIVE");
    assert!(row.enabled);
    assert!(row.alive);
    Ok(())
}

#[test]
fn test_busy_component_shows_unknown() -> TestResult {
    let registry = ComponentRegistry::with_lock_timeout(std::time::Duration::from_millis(1));
    let busy = Plain::shared("busy", ComponentKind::Sensor);
    registry.register(&busy)?;

    let _held = busy.lock();
    let listing = registry.list();
    let row = listing.first().ok_or("missing row")?;
    assert!(row.alive);
    assert_eq!(row.state, "UNKNOWN");
    Ok(())
}

#[test]
fn test_listing_snapshot() -> TestResult {
    let registry = ComponentRegistry::new();
    let imu = Plain::shared("imu", ComponentKind::Sensor);
    let winch = Plain::shared("winch", ComponentKind::Actuator);
    let display = Plain::shared("display", ComponentKind::Output);
    let temp = Plain::shared("temp", ComponentKind::Sensor);
    for component in [&imu, &winch, &display, &temp] {
        registry.register(component)?;
    }
    {
        let mut guard = imu.lock();
        guard.initialize()?;
        guard.enable()?;
    }
    winch.lock().initialize()?;
    drop(temp);

    let rows: Vec<String> = registry
        .list()
        .iter()
        .map(|row| {
            format!(
                "{} {} {} enabled={} alive={}",
                row.name, row.kind, row.state, row.enabled, row.alive
            )
        })
        .collect();
    insta::assert_snapshot!(rows.join("\n"), @r"
    imu sensor ACTIVE enabled=true alive=true
    winch actuator IDLE enabled=false alive=true
    display output UNINIT enabled=false alive=true
    temp sensor UNKNOWN enabled=false alive=false
    ");
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_first_registration_of_a_name_wins(picks in prop::collection::vec(0usize..6, 0..24)) {
        const POOL: [&str; 6] = ["imu", "wind", "servos", "winch", "display", "wifi"];
        let registry = ComponentRegistry::new();
        let mut held = Vec::new();
        let mut expected: Vec<String> = Vec::new();

        for pick in picks {
            let name = POOL.get(pick).copied().unwrap_or("imu");
            let component = Plain::shared(name, ComponentKind::Service);
            let outcome = registry.register(&component);
            if expected.iter().any(|n| n == name) {
                prop_assert_eq!(outcome, Err(ComponentError::DuplicateName(name.to_owned())));
            } else {
                prop_assert_eq!(outcome, Ok(()));
                expected.push(name.to_owned());
            }
            held.push(component);
        }

        prop_assert_eq!(registry.names(), expected.clone());
        prop_assert_eq!(registry.len(), expected.len());
        prop_assert!(expected.iter().all(|n| registry.get(n).is_some()));
    }
}

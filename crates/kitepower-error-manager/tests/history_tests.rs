//! History ring, counters and resolution.

use kitepower_error_manager::prelude::*;
use kitepower_test_helpers::prelude::*;
use proptest::prelude::*;

fn manager(capacity: usize) -> Result<ErrorManager, ErrorManagerError> {
    let (_clock, state) = manual_state();
    let config = ErrorManagerConfig::builder()
        .history_capacity(capacity)
        .without_default_strategies()
        .build()?;
    Ok(ErrorManager::new(config, state))
}

fn failure_codes() -> Vec<ErrorCode> {
    ErrorCode::ALL.into_iter().filter(|c| !c.is_ok()).collect()
}

#[test]
fn test_ring_keeps_most_recent_in_order() -> TestResult {
    let errors = manager(20)?;
    let codes: Vec<ErrorCode> = failure_codes().into_iter().take(25).collect();
    for code in &codes {
        errors.report(*code, "TEST", "ring")?;
    }

    let history: Vec<ErrorCode> = errors.error_history().iter().map(|e| e.code).collect();
    let expected: Vec<ErrorCode> = codes.iter().copied().skip(5).collect();
    assert_eq!(history, expected);
    assert_eq!(errors.total_error_count(), 25);
    Ok(())
}

#[test]
fn test_resolve_is_idempotent() -> TestResult {
    let errors = manager(20)?;
    errors.report(ErrorCode::SendFailed, "WEBSERVER", "socket closed")?;
    assert!(errors.resolve_error(ErrorCode::SendFailed, None));
    assert!(!errors.resolve_error(ErrorCode::SendFailed, None));
    Ok(())
}

#[test]
fn test_resolve_filters_by_module() -> TestResult {
    let errors = manager(20)?;
    errors.report(ErrorCode::SensorFailure, "IMU", "a")?;
    errors.report(ErrorCode::SensorFailure, "LINE_SENSOR", "b")?;

    assert!(errors.resolve_error(ErrorCode::SensorFailure, Some("IMU")));
    assert!(!errors.resolve_error(ErrorCode::SensorFailure, Some("IMU")));
    assert_eq!(errors.unresolved_error_count()?, 1);
    assert!(!errors.resolve_error(ErrorCode::SensorFailure, Some("WIFI")));
    Ok(())
}

#[test]
fn test_clear_resets_counts_but_not_total() -> TestResult {
    let errors = manager(20)?;
    errors.report(ErrorCode::ApiError, "WEBSERVER", "bad route")?;
    errors.report(ErrorCode::ApiError, "WEBSERVER", "bad route")?;
    assert_eq!(errors.error_count(ErrorCode::ApiError), 2);

    errors.clear_error_history()?;
    assert_eq!(errors.error_count(ErrorCode::ApiError), 0);
    assert!(errors.error_history().is_empty());
    assert_eq!(errors.unresolved_error_count()?, 0);
    assert_eq!(errors.total_error_count(), 2);
    Ok(())
}

#[test]
fn test_three_argument_report_uses_banding() -> TestResult {
    let errors = manager(20)?;
    errors.report(ErrorCode::Timeout, "AUTOPILOT", "slow loop")?;
    errors.report(ErrorCode::NetworkTimeout, "WIFI", "dhcp")?;
    errors.report(ErrorCode::TaskCreationFailed, "POWER", "no stack")?;

    let severities: Vec<ErrorSeverity> = errors.error_history().iter().map(|e| e.severity).collect();
    assert_eq!(
        severities,
        vec![ErrorSeverity::Low, ErrorSeverity::High, ErrorSeverity::Critical]
    );
    Ok(())
}

#[test]
fn test_log_unresolved_counts_only_open_entries() -> TestResult {
    let errors = manager(20)?;
    errors.report(ErrorCode::FileReadFailed, "WEBSERVER", "index.html")?;
    errors.report(ErrorCode::InputFailure, "BUTTONS", "bounce")?;
    errors.resolve_error(ErrorCode::InputFailure, None);
    assert_eq!(errors.log_unresolved_errors(), 1);
    Ok(())
}

#[test]
fn test_evicted_error_stays_unresolved_until_resolved() -> TestResult {
    let errors = manager(3)?;
    errors.report(ErrorCode::ImuFailure, "IMU", "no samples")?;
    for _ in 0..3 {
        errors.report(ErrorCode::ReceiveFailed, "WIFI", "short read")?;
    }
    assert!(errors.resolve_error(ErrorCode::ReceiveFailed, None));

    let ring: Vec<String> = errors
        .error_history()
        .iter()
        .map(|e| format!("{} #{} resolved={}", e.code.name(), e.occurrence, e.resolved))
        .collect();
    insta::assert_snapshot!(ring.join("\n"), @r"
    RECEIVE_FAILED #1 resolved=true
    RECEIVE_FAILED #2 resolved=true
    RECEIVE_FAILED #3 resolved=true
    ");
    assert_eq!(errors.unresolved_error_count()?, 1);
    assert_eq!(errors.log_unresolved_errors(), 0);

    assert!(errors.resolve_error(ErrorCode::ImuFailure, Some("IMU")));
    assert_eq!(errors.unresolved_error_count()?, 0);
    Ok(())
}

#[test]
fn test_clear_drops_evicted_unresolved_errors() -> TestResult {
    let errors = manager(1)?;
    errors.report(ErrorCode::TensionSensorFailure, "LINE_SENSOR", "open circuit")?;
    errors.report(ErrorCode::DisplayFailure, "DISPLAY", "blank")?;
    assert_eq!(errors.unresolved_error_count()?, 2);

    errors.clear_error_history()?;
    assert_eq!(errors.unresolved_error_count()?, 0);
    assert!(!errors.resolve_error(ErrorCode::TensionSensorFailure, None));
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_ring_never_exceeds_capacity(
        capacity in 1usize..32,
        picks in prop::collection::vec(0usize..40, 0..100),
    ) {
        let errors = manager(capacity).map_err(|e| TestCaseError::fail(e.to_string()))?;
        let codes = failure_codes();
        let mut reported = Vec::new();
        for pick in picks {
            let code = codes.get(pick % codes.len()).copied().unwrap_or(ErrorCode::Unknown);
            errors.report(code, "PROP", "ring").map_err(|e| TestCaseError::fail(e.to_string()))?;
            reported.push(code);
        }

        let history: Vec<ErrorCode> = errors.error_history().iter().map(|e| e.code).collect();
        let keep = reported.len().min(capacity);
        let expected: Vec<ErrorCode> = reported.iter().copied().skip(reported.len() - keep).collect();
        prop_assert_eq!(history, expected);
        prop_assert_eq!(errors.total_error_count(), reported.len() as u64);
    }
}

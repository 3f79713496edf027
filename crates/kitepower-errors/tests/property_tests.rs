//! Property tests for severity banding.

use kitepower_errors::prelude::*;
use proptest::prelude::*;

proptest! {
    #[test]
    fn test_banding_is_monotonic(a in any::<u16>(), b in any::<u16>()) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(ErrorSeverity::from_code_value(lo) <= ErrorSeverity::from_code_value(hi));
    }

    #[test]
    fn test_only_zero_is_info(value in 1u16..=u16::MAX) {
        prop_assert_ne!(ErrorSeverity::from_code_value(value), ErrorSeverity::Info);
    }

    #[test]
    fn test_known_codes_agree_with_banding(index in 0usize..ErrorCode::ALL.len()) {
        let code = ErrorCode::ALL.get(index).copied().ok_or_else(|| TestCaseError::fail("index"))?;
        prop_assert_eq!(code.default_severity(), ErrorSeverity::from_code_value(code.value()));
    }

    #[test]
    fn test_from_value_is_partial_inverse(value in any::<u16>()) {
        if let Some(code) = ErrorCode::from_value(value) {
            prop_assert_eq!(code.value(), value);
        }
    }
}

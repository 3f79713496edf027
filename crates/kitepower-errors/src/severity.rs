//! Error severity levels and the numeric banding rule.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Error severity level.
///
/// Ordered from least to most severe, so `severity >= ErrorSeverity::High`
/// is a valid escalation test.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum ErrorSeverity {
    /// Informational, no action required
    #[default]
    Info = 0,
    /// Degraded but fully functional
    Low = 1,
    /// A subsystem is impaired
    Medium = 2,
    /// A subsystem is lost
    High = 3,
    /// System integrity is threatened
    Critical = 4,
}

impl ErrorSeverity {
    /// All severities in ascending order.
    pub const ALL: [ErrorSeverity; 5] = [
        ErrorSeverity::Info,
        ErrorSeverity::Low,
        ErrorSeverity::Medium,
        ErrorSeverity::High,
        ErrorSeverity::Critical,
    ];

    /// Severity implied by the numeric value of an error code.
    ///
    /// `0` is `Info`; below `100` is `Low`, below `200` `Medium`, below `300`
    /// `High`; everything else is `Critical`.
    ///
    /// ```
    /// use kitepower_errors::ErrorSeverity;
    ///
    /// assert_eq!(ErrorSeverity::from_code_value(0), ErrorSeverity::Info);
    /// assert_eq!(ErrorSeverity::from_code_value(42), ErrorSeverity::Low);
    /// assert_eq!(ErrorSeverity::from_code_value(399), ErrorSeverity::Critical);
    /// ```
    #[must_use]
    pub const fn from_code_value(value: u16) -> Self {
        match value {
            0 => ErrorSeverity::Info,
            1..=99 => ErrorSeverity::Low,
            100..=199 => ErrorSeverity::Medium,
            200..=299 => ErrorSeverity::High,
            _ => ErrorSeverity::Critical,
        }
    }

    /// Upper-case label used in logs and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorSeverity::Info => "INFO",
            ErrorSeverity::Low => "LOW",
            ErrorSeverity::Medium => "MEDIUM",
            ErrorSeverity::High => "HIGH",
            ErrorSeverity::Critical => "CRITICAL",
        }
    }

    /// `true` for `Critical`.
    #[must_use]
    pub const fn is_critical(self) -> bool {
        matches!(self, ErrorSeverity::Critical)
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

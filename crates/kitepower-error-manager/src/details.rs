//! History entries.

use std::time::Duration;

use kitepower_errors::{ErrorCode, ErrorSeverity, RecoveryStrategy};
use serde::Serialize;

/// One reported error.
///
/// Only `resolved` changes after the entry is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetails {
    /// Error code.
    pub code: ErrorCode,
    /// Severity.
    pub severity: ErrorSeverity,
    /// Reporting module, usually a `SystemComponent` token.
    pub module: String,
    /// Human description.
    pub description: String,
    /// Strategy assigned when the error was reported.
    pub strategy: RecoveryStrategy,
    /// Clock time of the report.
    pub timestamp: Duration,
    /// Occurrences of this code so far, this one included.
    pub occurrence: u32,
    /// Whether the error was resolved.
    pub resolved: bool,
}

impl ErrorDetails {
    /// Whether this entry matches `code` and, if given, `module`.
    #[must_use]
    pub fn matches(&self, code: ErrorCode, module: Option<&str>) -> bool {
        self.code == code && module.is_none_or(|m| self.module == m)
    }
}

/// What a recovery handler is told about the error it handles.
#[derive(Debug, Clone, Copy)]
pub struct RecoveryContext<'a> {
    /// Error code.
    pub code: ErrorCode,
    /// Severity of the triggering report.
    pub severity: ErrorSeverity,
    /// Reporting module.
    pub module: &'a str,
    /// Human description.
    pub description: &'a str,
    /// Strategy being applied.
    pub strategy: RecoveryStrategy,
}

//! Recovery strategies attached to error codes.

use core::fmt;

use serde::{Deserialize, Serialize};

/// What the error path should do about a reported failure.
///
/// `Retry`, `Reinitialize` and `Fallback` are performed by the module that
/// reported the error; the error manager only records the intent. The
/// remaining strategies are mechanisms the error manager triggers itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum RecoveryStrategy {
    /// No recovery
    #[default]
    None = 0,
    /// Retry the failed operation
    Retry = 1,
    /// Re-run the component's initialization
    Reinitialize = 2,
    /// Switch to a degraded fallback mode
    Fallback = 3,
    /// Reset the failing component
    ResetComponent = 4,
    /// Restart the whole system
    ResetSystem = 5,
    /// Force the system into SAFE_MODE
    SafeMode = 6,
}

impl RecoveryStrategy {
    /// All strategies.
    pub const ALL: [RecoveryStrategy; 7] = [
        RecoveryStrategy::None,
        RecoveryStrategy::Retry,
        RecoveryStrategy::Reinitialize,
        RecoveryStrategy::Fallback,
        RecoveryStrategy::ResetComponent,
        RecoveryStrategy::ResetSystem,
        RecoveryStrategy::SafeMode,
    ];

    /// `true` when the strategy is carried out by the reporting module.
    #[must_use]
    pub const fn is_delegated(self) -> bool {
        matches!(
            self,
            RecoveryStrategy::Retry | RecoveryStrategy::Reinitialize | RecoveryStrategy::Fallback
        )
    }

    /// Upper-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            RecoveryStrategy::None => "NONE",
            RecoveryStrategy::Retry => "RETRY",
            RecoveryStrategy::Reinitialize => "REINITIALIZE",
            RecoveryStrategy::Fallback => "FALLBACK",
            RecoveryStrategy::ResetComponent => "RESET_COMPONENT",
            RecoveryStrategy::ResetSystem => "RESET_SYSTEM",
            RecoveryStrategy::SafeMode => "SAFE_MODE",
        }
    }
}

impl fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//! Common imports.

pub use crate::config::ErrorManagerConfig;
pub use crate::details::{ErrorDetails, RecoveryContext};
pub use crate::error::{ErrorManagerError, ErrorManagerResult};
pub use crate::manager::ErrorManager;
pub use kitepower_errors::{ErrorCode, ErrorSeverity, RecoveryStrategy};

//! Error ingestion and recovery dispatch for the kite controller.
//!
//! Components report failures to one [`ErrorManager`]. Each report is
//! counted per code, appended to a bounded history ring, logged at a level
//! derived from its severity and, for `CRITICAL` reports, passed to a
//! callback. If the report carries a [`RecoveryStrategy`] (explicitly or as
//! the code's default) the matching handler runs before the report returns.
//!
//! | Strategy | Handler |
//! |---|---|
//! | `RETRY`, `REINITIALIZE`, `FALLBACK` | logged; the reporting module acts and resolves |
//! | `RESET_COMPONENT` | reset the subsystem named by the module through the directory |
//! | `RESET_SYSTEM` | request a restart |
//! | `SAFE_MODE` | escalate the system state to `SAFE_MODE` |
//!
//! Handlers can be replaced with
//! [`ErrorManager::set_recovery_handler`].
//!
//! [`RecoveryStrategy`]: kitepower_errors::RecoveryStrategy

pub mod config;
pub mod details;
pub mod error;
pub mod manager;
pub mod prelude;
pub mod recovery;

pub use config::{ErrorManagerConfig, ErrorManagerConfigBuilder, default_strategies};
pub use details::{ErrorDetails, RecoveryContext};
pub use error::{ErrorManagerError, ErrorManagerResult};
pub use manager::{CriticalErrorCallback, ErrorManager, ErrorManagerBuilder};
pub use recovery::RecoveryHandler;

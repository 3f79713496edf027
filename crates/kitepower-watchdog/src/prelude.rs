//! Common imports.

pub use crate::actions::Breach;
pub use crate::config::{WatchdogAction, WatchdogManagerConfig, WatchdogPolicy};
pub use crate::error::{WatchdogError, WatchdogResult};
pub use crate::manager::{SweepOutcome, WatchdogEntry, WatchdogManager};
pub use kitepower_state::SystemComponent;

//! Common imports.

pub use crate::config::{WatchdogBackend, WatchdogConfig};
pub use crate::error::{HardwareWatchdogError, HardwareWatchdogResult};
pub use crate::software_impl::SoftwareWatchdog;
pub use crate::state::{WatchdogMetrics, WatchdogStatus};
pub use crate::watchdog::HardwareWatchdog;

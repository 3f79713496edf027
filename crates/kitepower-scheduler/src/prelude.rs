//! Prelude module for common scheduler types.

pub use crate::deferred::spawn_deferred;
pub use crate::error::{SchedulerError, SchedulerResult};
pub use crate::interval::Interval;
pub use crate::task::{PeriodicTask, TaskHandle, TaskStats};

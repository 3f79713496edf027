//! Periodic task primitives for the KitePower orchestration core.
//!
//! Every long-running activity (sensor sampling, watchdog sweep, orchestrator
//! tick) is a named thread that does one bounded unit of work per tick and
//! sleeps until the next absolute deadline. There is no async runtime.
//!
//! - [`PeriodicTask`] spawns such a thread and returns a [`TaskHandle`] that
//!   stops it cooperatively.
//! - [`Interval`] throttles work inside a faster tick (e.g. a 1 s refresh in a
//!   100 ms loop) against any monotonic time source.
//! - [`spawn_deferred`] runs a one-shot job on its own thread after a delay.
//!
//! # Example
//!
//! ```no_run
//! use std::ops::ControlFlow;
//! use std::time::Duration;
//! use kitepower_scheduler::PeriodicTask;
//!
//! let handle = PeriodicTask::spawn("sensors", Duration::from_millis(20), || {
//!     // sample, filter, publish
//!     ControlFlow::Continue(())
//! })?;
//! handle.stop()?;
//! # Ok::<(), kitepower_scheduler::SchedulerError>(())
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]
#![deny(unused_must_use)]
#![warn(missing_docs, missing_debug_implementations)]

pub mod deferred;
pub mod error;
pub mod interval;
pub mod task;

pub mod prelude;

pub use deferred::spawn_deferred;
pub use error::{SchedulerError, SchedulerResult};
pub use interval::Interval;
pub use task::{PeriodicTask, TaskHandle, TaskStats};

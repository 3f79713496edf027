//! Error types for the scheduler crate.

use thiserror::Error;

/// Scheduler errors.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A period of zero was requested.
    #[error("task {0}: period must be greater than zero")]
    InvalidPeriod(String),

    /// The OS refused to create the thread.
    #[error("task {name}: thread could not be spawned")]
    SpawnFailed {
        /// Task name.
        name: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The task's thread panicked.
    #[error("task {0} panicked")]
    Panicked(String),
}

/// Scheduler result type.
pub type SchedulerResult<T = ()> = Result<T, SchedulerError>;

//! One-shot delayed jobs.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;

use crate::error::{SchedulerError, SchedulerResult};

/// Run `job` on a new named thread after `delay`.
///
/// # Errors
///
/// [`SchedulerError::SpawnFailed`] if the thread could not be created; `job`
/// is dropped without running and the caller must fall back.
pub fn spawn_deferred<F>(name: &str, delay: Duration, job: F) -> SchedulerResult<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    let task = name.to_owned();
    thread::Builder::new()
        .name(name.to_owned())
        .spawn(move || {
            debug!(task = %task, ?delay, "Deferred job waiting");
            thread::sleep(delay);
            job();
        })
        .map_err(|source| SchedulerError::SpawnFailed {
            name: name.to_owned(),
            source,
        })
}

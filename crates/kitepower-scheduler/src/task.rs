//! Periodic tasks with absolute deadlines.
//!
//! Deadlines advance by whole periods from the task's start, so a slow tick
//! does not shift every later tick. Missed deadlines are skipped and counted
//! as overruns rather than run back to back.

use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use tracing::{debug, info, warn};

use crate::error::{SchedulerError, SchedulerResult};

/// Counters shared between a running task and its handle.
#[derive(Debug, Default)]
pub struct TaskStats {
    ticks: AtomicU64,
    overruns: AtomicU64,
    last_work_us: AtomicU64,
    max_work_us: AtomicU64,
}

impl TaskStats {
    /// Completed ticks.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Ticks whose work ran past the next deadline.
    #[must_use]
    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    /// Duration of the most recent tick's work.
    #[must_use]
    pub fn last_work(&self) -> Duration {
        Duration::from_micros(self.last_work_us.load(Ordering::Relaxed))
    }

    /// Longest work duration seen.
    #[must_use]
    pub fn max_work(&self) -> Duration {
        Duration::from_micros(self.max_work_us.load(Ordering::Relaxed))
    }

    fn record(&self, work: Duration, overrun: bool) {
        let us = u64::try_from(work.as_micros()).unwrap_or(u64::MAX);
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.last_work_us.store(us, Ordering::Relaxed);
        self.max_work_us.fetch_max(us, Ordering::Relaxed);
        if overrun {
            self.overruns.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Handle to a running periodic task.
///
/// Dropping the handle stops the task at its next deadline without waiting
/// for it; [`TaskHandle::stop`] also joins the thread.
pub struct TaskHandle {
    name: String,
    stop_tx: Sender<()>,
    thread: Option<JoinHandle<()>>,
    stats: Arc<TaskStats>,
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("name", &self.name)
            .field("finished", &self.is_finished())
            .field("stats", &self.stats)
            .finish()
    }
}

impl TaskHandle {
    /// Task name, also the thread name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared counters.
    #[must_use]
    pub fn stats(&self) -> &Arc<TaskStats> {
        &self.stats
    }

    /// `true` once the task's thread has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Signal the task to stop and wait for the current tick to finish.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::Panicked`] if the task's work panicked.
    pub fn stop(mut self) -> SchedulerResult<()> {
        if self.stop_tx.send(()).is_err() {
            debug!(task = %self.name, "Task already exited");
        }
        match self.thread.take().map(JoinHandle::join) {
            None | Some(Ok(())) => Ok(()),
            Some(Err(_payload)) => Err(SchedulerError::Panicked(self.name.clone())),
        }
    }
}

/// Builder-less entry point for periodic tasks.
#[derive(Debug)]
pub struct PeriodicTask;

impl PeriodicTask {
    /// Spawn a named thread that calls `work` every `period` until `work`
    /// returns [`ControlFlow::Break`] or the handle stops it.
    ///
    /// `work` runs first immediately, then at `start + n * period`.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::InvalidPeriod`] for a zero period,
    /// [`SchedulerError::SpawnFailed`] if the thread cannot be created.
    pub fn spawn<F>(name: &str, period: Duration, mut work: F) -> SchedulerResult<TaskHandle>
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        if period.is_zero() {
            return Err(SchedulerError::InvalidPeriod(name.to_owned()));
        }

        let (stop_tx, stop_rx) = channel::bounded::<()>(1);
        let stats = Arc::new(TaskStats::default());
        let task_stats = Arc::clone(&stats);
        let task_name = name.to_owned();

        let thread = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                info!(task = %task_name, ?period, "Periodic task started");
                let mut deadline = Instant::now();
                loop {
                    let started = Instant::now();
                    let flow = work();
                    let finished = Instant::now();

                    deadline = deadline.checked_add(period).unwrap_or(finished);
                    let overrun = finished > deadline;
                    if overrun {
                        while deadline < finished {
                            deadline = match deadline.checked_add(period) {
                                Some(next) => next,
                                None => finished,
                            };
                        }
                    }
                    task_stats.record(finished.saturating_duration_since(started), overrun);
                    if overrun {
                        warn!(task = %task_name, "Periodic task overran its period");
                    }

                    if flow.is_break() {
                        debug!(task = %task_name, "Periodic task finished by its work");
                        break;
                    }

                    let wait = deadline.saturating_duration_since(Instant::now());
                    match stop_rx.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                info!(task = %task_name, ticks = task_stats.ticks(), "Periodic task stopped");
            })
            .map_err(|source| SchedulerError::SpawnFailed {
                name: name.to_owned(),
                source,
            })?;

        Ok(TaskHandle {
            name: name.to_owned(),
            stop_tx,
            thread: Some(thread),
            stats,
        })
    }
}

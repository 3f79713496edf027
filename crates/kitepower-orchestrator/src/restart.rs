//! Deferred system restart.
//!
//! A restart, once requested, must happen. [`RestartScheduler`] performs it
//! on a dedicated thread after the requested delay; if that thread cannot be
//! created it waits a short fixed delay on the caller's thread and resets
//! immediately. Requests made while a restart is pending are counted and
//! otherwise ignored. A [`PlatformReset`] that returns ends the pending
//! restart, so the next request schedules a new one.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use kitepower_scheduler::{SchedulerResult, spawn_deferred};
use kitepower_state::RestartRequester;
use tracing::{error, info, warn};

/// Performs the actual reset. On a device this reboots the board; in the
/// service binary it ends the process with a restart exit code.
pub trait PlatformReset: Send + Sync + fmt::Debug {
    /// Reset now. Usually does not return; if it does, the scheduler
    /// accepts new restart requests again.
    fn reset(&self);
}

/// Job run by a [`RestartSpawner`] once the restart is due.
pub type RestartJob = Box<dyn FnOnce() + Send + 'static>;

/// Starts the restart job on its own thread after a delay.
pub type RestartSpawner = Arc<dyn Fn(&str, Duration, RestartJob) -> SchedulerResult<()> + Send + Sync>;

fn deferred_spawner() -> RestartSpawner {
    Arc::new(|name: &str, delay: Duration, job: RestartJob| {
        spawn_deferred(name, delay, job).map(drop)
    })
}

/// Sent by [`ChannelReset`] when the reset is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartSignal {
    /// Restart requests received before the reset ran.
    pub requests: u64,
}

/// Delivers the reset as a message to whoever owns the process lifetime.
#[derive(Debug)]
pub struct ChannelReset {
    tx: Sender<RestartSignal>,
    requests: Arc<AtomicU64>,
}

impl ChannelReset {
    /// A reset endpoint and the receiver the process owner waits on.
    #[must_use]
    pub fn new() -> (Self, Receiver<RestartSignal>) {
        let (tx, rx) = channel::bounded(1);
        (
            Self {
                tx,
                requests: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }
}

impl PlatformReset for ChannelReset {
    fn reset(&self) {
        let requests = self.requests.fetch_add(1, Ordering::Relaxed).saturating_add(1);
        if self.tx.try_send(RestartSignal { requests }).is_err() {
            warn!("Restart signal not delivered; receiver gone or signal already queued");
        }
    }
}

/// The system's only restart path.
pub struct RestartScheduler {
    platform: Arc<dyn PlatformReset>,
    fallback_delay: Duration,
    spawner: RestartSpawner,
    pending: Arc<AtomicBool>,
    requests: AtomicU64,
}

impl fmt::Debug for RestartScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestartScheduler")
            .field("platform", &self.platform)
            .field("pending", &self.is_pending())
            .field("requests", &self.requests())
            .finish_non_exhaustive()
    }
}

impl RestartScheduler {
    /// Name of the restart thread.
    pub const TASK_NAME: &'static str = "system-restart";

    /// A scheduler resetting through `platform`. `fallback_delay` is waited
    /// on the caller's thread when the restart thread cannot be spawned.
    #[must_use]
    pub fn new(platform: Arc<dyn PlatformReset>, fallback_delay: Duration) -> Self {
        Self {
            platform,
            fallback_delay,
            spawner: deferred_spawner(),
            pending: Arc::new(AtomicBool::new(false)),
            requests: AtomicU64::new(0),
        }
    }

    /// Replace how the restart thread is started. Defaults to
    /// [`spawn_deferred`].
    #[must_use]
    pub fn with_spawner(mut self, spawner: RestartSpawner) -> Self {
        self.spawner = spawner;
        self
    }

    /// Restart requests received, coalesced ones included.
    #[must_use]
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Whether a restart has been scheduled.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

impl RestartRequester for RestartScheduler {
    fn request_system_restart(&self, delay: Duration) {
        let request = self.requests.fetch_add(1, Ordering::Relaxed).saturating_add(1);
        if self.pending.swap(true, Ordering::AcqRel) {
            info!(request, "Restart already pending, request coalesced");
            return;
        }

        warn!(delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX), "System restart requested");
        let platform = Arc::clone(&self.platform);
        let pending = Arc::clone(&self.pending);
        let job: RestartJob = Box::new(move || {
            info!("Restarting system");
            platform.reset();
            pending.store(false, Ordering::Release);
        });
        if let Err(e) = (self.spawner)(Self::TASK_NAME, delay, job) {
            error!(error = %e, fallback_ms = u64::try_from(self.fallback_delay.as_millis()).unwrap_or(u64::MAX), "Restart task not created, restarting directly");
            thread::sleep(self.fallback_delay);
            self.platform.reset();
            self.pending.store(false, Ordering::Release);
        }
    }
}

//! Process lifetime of the controller.
//!
//! [`KiteDaemon`] boots a [`KiteSystem`] backed by simulated drivers, runs
//! the periodic tasks and waits for one of three exits: the system reaching
//! `SHUTDOWN`, a restart signal from the restart scheduler, or an operator
//! interrupt. A restart ends the process with [`EXIT_RESTART`] so the
//! supervisor starts it again.

use std::collections::BTreeMap;
use std::fmt;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use kitepower_component::share;
use kitepower_orchestrator::{KiteConfig, KiteSystem, OrchestratorError};
use kitepower_scheduler::TaskHandle;
use kitepower_state::{SystemComponent, SystemState};
use tracing::{error, info, warn};

use crate::drivers::{SimFaults, simulated_fleet};

/// Exit status asking the supervisor to restart the process.
pub const EXIT_RESTART: u8 = 75;

/// Why the daemon stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonExit {
    /// The system reached `SHUTDOWN`.
    Shutdown,
    /// SIGINT, SIGTERM or Ctrl-C.
    Interrupted,
    /// The restart scheduler fired.
    Restart {
        /// Restart requests received before the reset ran.
        requests: u64,
    },
}

impl DaemonExit {
    /// Numeric process exit status.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            DaemonExit::Shutdown | DaemonExit::Interrupted => 0,
            DaemonExit::Restart { .. } => EXIT_RESTART,
        }
    }

    /// Process exit status.
    #[must_use]
    pub fn exit_code(self) -> ExitCode {
        ExitCode::from(self.code())
    }

    fn reason(self) -> &'static str {
        match self {
            DaemonExit::Shutdown => "shutdown requested",
            DaemonExit::Interrupted => "operator interrupt",
            DaemonExit::Restart { .. } => "system restart",
        }
    }
}

impl fmt::Display for DaemonExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

/// Fault injection and timing knobs of the simulated run.
#[derive(Debug, Clone)]
pub struct DaemonOptions {
    /// Subsystems whose driver fails to initialize.
    pub fail_initialize: Vec<SystemComponent>,
    /// Subsystems whose driver stops heartbeating once booted.
    pub stall: Vec<SystemComponent>,
    /// How often the exit conditions are checked.
    pub poll_interval: Duration,
}

impl Default for DaemonOptions {
    fn default() -> Self {
        Self {
            fail_initialize: Vec::new(),
            stall: Vec::new(),
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// A booted controller and its running tasks.
pub struct KiteDaemon {
    system: KiteSystem,
    faults: BTreeMap<SystemComponent, Arc<SimFaults>>,
    tasks: Vec<TaskHandle>,
    poll_interval: Duration,
}

impl fmt::Debug for KiteDaemon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KiteDaemon")
            .field("system", &self.system)
            .field("tasks", &self.tasks)
            .finish_non_exhaustive()
    }
}

impl KiteDaemon {
    /// Wire the system with a simulated driver for every subsystem, boot
    /// it and start the sweep, tick and update tasks.
    ///
    /// A required subsystem failing to start leaves the system in `ERROR`
    /// but running, so the failure stays visible and recoverable.
    ///
    /// # Errors
    ///
    /// An invalid configuration, a failed hardware watchdog backend or a
    /// task that cannot be spawned.
    pub fn start(config: KiteConfig, options: &DaemonOptions) -> Result<Self> {
        let mut builder = KiteSystem::builder(config);
        let mut faults = BTreeMap::new();
        for (id, driver, switches) in simulated_fleet() {
            if options.fail_initialize.contains(&id) {
                switches.set_fail_initialize(true);
            }
            builder = builder.component(id, share(driver));
            faults.insert(id, switches);
        }
        let system = builder.build().context("failed to wire the system")?;

        match system.boot() {
            Ok(()) => {
                system
                    .orchestrator
                    .request_system_state_change(SystemState::Running, "boot complete")
                    .context("failed to enter RUNNING")?;
            }
            Err(OrchestratorError::StartupFailed(missing)) => {
                error!(?missing, "Required components did not start, staying in ERROR");
            }
            Err(e) => return Err(e).context("boot failed"),
        }

        for id in &options.stall {
            if let Some(switches) = faults.get(id) {
                warn!(component = %id, "Injecting stall");
                switches.set_stalled(true);
            }
        }

        let tasks = vec![
            system
                .watchdog
                .spawn_sweep_task()
                .context("failed to start the watchdog sweep")?,
            system
                .orchestrator
                .spawn_tick_task()
                .context("failed to start the orchestrator tick")?,
            system
                .orchestrator
                .spawn_update_task()
                .context("failed to start component updates")?,
        ];

        info!(state = %system.state.current_state(), "Controller started");
        Ok(Self {
            system,
            faults,
            tasks,
            poll_interval: options.poll_interval,
        })
    }

    /// The wired system.
    #[must_use]
    pub fn system(&self) -> &KiteSystem {
        &self.system
    }

    /// Fault switches of `id`'s simulated driver.
    #[must_use]
    pub fn faults(&self, id: SystemComponent) -> Option<&Arc<SimFaults>> {
        self.faults.get(&id)
    }

    /// Check the exit conditions once.
    #[must_use]
    pub fn poll_exit(&self) -> Option<DaemonExit> {
        if let Some(signal) = self.system.restart_signal().and_then(|rx| rx.try_recv().ok()) {
            return Some(DaemonExit::Restart {
                requests: signal.requests,
            });
        }
        (self.system.state.current_state() == SystemState::Shutdown).then_some(DaemonExit::Shutdown)
    }

    /// Wait until the system shuts down, restarts or the operator
    /// interrupts it.
    pub async fn wait_for_exit(&self) -> DaemonExit {
        let interrupt = shutdown_signal();
        tokio::pin!(interrupt);
        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                () = &mut interrupt => return DaemonExit::Interrupted,
                _ = ticker.tick() => {
                    if let Some(exit) = self.poll_exit() {
                        return exit;
                    }
                }
            }
        }
    }

    /// Stop the tasks, log the final status and shut the system down.
    ///
    /// # Errors
    ///
    /// The orchestrator refusing to shut down.
    pub fn stop(self, exit: DaemonExit) -> Result<()> {
        info!(%exit, "Stopping controller");
        for task in self.tasks {
            let name = task.name().to_owned();
            if let Err(e) = task.stop() {
                error!(task = %name, error = %e, "Task did not stop cleanly");
            }
        }

        match serde_json::to_string(&self.system.orchestrator.status_report()) {
            Ok(status) => info!(%status, "Final status"),
            Err(e) => warn!(error = %e, "Final status not serialized"),
        }

        self.system
            .orchestrator
            .shutdown(exit.reason())
            .context("shutdown refused")
    }
}

/// Resolves on SIGINT or SIGTERM (Ctrl-C elsewhere). Never resolves if no
/// handler can be installed.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let (mut sigterm, mut sigint) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(term), Ok(int)) => (term, int),
            (Err(e), _) | (_, Err(e)) => {
                error!(error = %e, "Signal handlers not installed");
                return std::future::pending().await;
            }
        };
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Error waiting for Ctrl+C");
            return std::future::pending().await;
        }
        info!("Received Ctrl+C");
    }
}

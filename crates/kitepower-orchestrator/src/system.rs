//! The composition root.
//!
//! Every service exists once and is constructed here, in dependency order,
//! then handed to its consumers as an `Arc`. Nothing in the core is a global.

use std::fmt;
use std::sync::Arc;

use crossbeam::channel::Receiver;
use kitepower_component::{ComponentDirectory, ComponentRegistry, SharedComponent};
use kitepower_error_manager::ErrorManager;
use kitepower_hardware_watchdog::{HardwareWatchdog, from_config};
use kitepower_state::{Clock, MonotonicClock, RestartRequester, SystemComponent, SystemStateManager};
use kitepower_watchdog::WatchdogManager;
use tracing::info;

use crate::config::KiteConfig;
use crate::error::OrchestratorResult;
use crate::info::{SysinfoProbe, SystemInfoProbe};
use crate::orchestrator::{OrchestratorParts, SystemOrchestrator};
use crate::restart::{ChannelReset, PlatformReset, RestartScheduler, RestartSignal};

/// The wired system.
pub struct KiteSystem {
    /// Time source shared by every service.
    pub clock: Arc<dyn Clock>,
    /// Global and per-subsystem state.
    pub state: Arc<SystemStateManager>,
    /// Error ingestion and recovery dispatch.
    pub errors: Arc<ErrorManager>,
    /// Heartbeat monitoring.
    pub watchdog: Arc<WatchdogManager>,
    /// Subsystem bindings.
    pub directory: Arc<ComponentDirectory>,
    /// Name index for listings.
    pub registry: Arc<ComponentRegistry>,
    /// Boot sequencing and system-wide requests.
    pub orchestrator: Arc<SystemOrchestrator>,
    restart_signal: Option<Receiver<RestartSignal>>,
}

impl fmt::Debug for KiteSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KiteSystem")
            .field("orchestrator", &self.orchestrator)
            .field("bound", &self.directory.ids())
            .finish_non_exhaustive()
    }
}

impl KiteSystem {
    /// Start wiring a system from `config`.
    #[must_use]
    pub fn builder(config: KiteConfig) -> KiteSystemBuilder {
        KiteSystemBuilder {
            config,
            clock: None,
            platform: None,
            restart: None,
            hardware: None,
            probe: None,
            components: Vec::new(),
        }
    }

    /// Receiver of the restart signal, when the default channel reset is
    /// in use.
    #[must_use]
    pub fn restart_signal(&self) -> Option<&Receiver<RestartSignal>> {
        self.restart_signal.as_ref()
    }

    /// Initialize the orchestrator and start the bound components.
    ///
    /// # Errors
    ///
    /// As [`SystemOrchestrator::start_components`].
    pub fn boot(&self) -> OrchestratorResult<()> {
        self.orchestrator.initialize()?;
        let summary = self.orchestrator.start_components()?;
        info!(
            started = ?summary.started,
            monitored = ?summary.monitored,
            "System booted"
        );
        Ok(())
    }
}

/// Collects the pieces that differ between the device, the service binary
/// and tests.
pub struct KiteSystemBuilder {
    config: KiteConfig,
    clock: Option<Arc<dyn Clock>>,
    platform: Option<Arc<dyn PlatformReset>>,
    restart: Option<Arc<dyn RestartRequester>>,
    hardware: Option<Box<dyn HardwareWatchdog>>,
    probe: Option<Box<dyn SystemInfoProbe>>,
    components: Vec<(SystemComponent, SharedComponent)>,
}

impl fmt::Debug for KiteSystemBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KiteSystemBuilder")
            .field("config", &self.config)
            .field(
                "components",
                &self.components.iter().map(|(id, _)| *id).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl KiteSystemBuilder {
    /// Time source. Defaults to a monotonic clock starting now.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Platform reset behind the restart scheduler. Defaults to a
    /// [`ChannelReset`] whose receiver is
    /// [`KiteSystem::restart_signal`].
    #[must_use]
    pub fn platform_reset(mut self, platform: Arc<dyn PlatformReset>) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Replace the restart scheduler altogether.
    #[must_use]
    pub fn restart_requester(mut self, restart: Arc<dyn RestartRequester>) -> Self {
        self.restart = Some(restart);
        self
    }

    /// Hardware watchdog. Defaults to the configured backend.
    #[must_use]
    pub fn hardware_watchdog(mut self, hardware: Box<dyn HardwareWatchdog>) -> Self {
        self.hardware = Some(hardware);
        self
    }

    /// System info source. Defaults to [`SysinfoProbe`].
    #[must_use]
    pub fn info_probe(mut self, probe: Box<dyn SystemInfoProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Bind a component to a subsystem. Startup follows bind order.
    #[must_use]
    pub fn component(mut self, id: SystemComponent, component: SharedComponent) -> Self {
        self.components.push((id, component));
        self
    }

    /// Validate the configuration and wire everything.
    ///
    /// # Errors
    ///
    /// [`ConfigError`](crate::ConfigError) for an invalid configuration,
    /// a hardware watchdog backend error, or
    /// [`ComponentError::AlreadyBound`](kitepower_component::ComponentError)
    /// for a subsystem bound twice.
    pub fn build(self) -> OrchestratorResult<KiteSystem> {
        self.config.validate()?;
        let config = self.config;

        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(MonotonicClock::new()),
        };
        let state = Arc::new(SystemStateManager::new(config.state.clone(), Arc::clone(&clock)));
        let directory = Arc::new(ComponentDirectory::new());
        let registry = Arc::new(ComponentRegistry::new());

        let mut restart_signal = None;
        let restart: Arc<dyn RestartRequester> = match self.restart {
            Some(restart) => restart,
            None => {
                let platform: Arc<dyn PlatformReset> = match self.platform {
                    Some(platform) => platform,
                    None => {
                        let (reset, rx) = ChannelReset::new();
                        restart_signal = Some(rx);
                        Arc::new(reset)
                    }
                };
                Arc::new(RestartScheduler::new(
                    platform,
                    config.orchestrator.restart_fallback(),
                ))
            }
        };

        let errors = Arc::new(
            ErrorManager::builder(config.error_manager.clone(), Arc::clone(&state))
                .directory(Arc::clone(&directory))
                .restart_requester(Arc::clone(&restart))
                .build(),
        );
        let watchdog = Arc::new(
            WatchdogManager::builder(
                config.watchdog.clone(),
                Arc::clone(&state),
                Arc::clone(&errors),
            )
            .directory(Arc::clone(&directory))
            .restart_requester(Arc::clone(&restart))
            .build(),
        );

        for (id, component) in self.components {
            directory.bind(id, component)?;
        }

        let hardware = match self.hardware {
            Some(hardware) => hardware,
            None => from_config(config.hardware_watchdog.clone())?,
        };
        let probe: Box<dyn SystemInfoProbe> = match self.probe {
            Some(probe) => probe,
            None => Box::new(SysinfoProbe::new()),
        };

        let orchestrator = Arc::new(SystemOrchestrator::new(
            config.orchestrator.clone(),
            OrchestratorParts {
                state: Arc::clone(&state),
                errors: Arc::clone(&errors),
                watchdog: Arc::clone(&watchdog),
                directory: Arc::clone(&directory),
                registry: Arc::clone(&registry),
                restart,
            },
            hardware,
            probe,
        ));

        Ok(KiteSystem {
            clock,
            state,
            errors,
            watchdog,
            directory,
            registry,
            orchestrator,
            restart_signal,
        })
    }
}

//! The shared rig and components that observe the orchestrator.

use std::sync::{Arc, OnceLock};

use kitepower_component::{
    ComponentCore, ComponentKind, LifecycleState, ManagedComponent, SharedComponent, share,
};
use kitepower_errors::CodeResult;
use kitepower_hardware_watchdog::SoftwareWatchdog;
use kitepower_orchestrator::{
    FixedProbe, KiteConfig, KiteSystem, OrchestratorResult, ResourceSample, StartupSummary,
};
use kitepower_state::{ComponentState, ManualClock, SystemComponent, SystemState, SystemStateManager};
use kitepower_test_helpers::mock::CountingRestart;
use parking_lot::Mutex;

/// A wired system on manual time.
#[derive(Debug)]
pub struct KiteRig {
    /// Drives every timestamp in the system.
    pub clock: Arc<ManualClock>,
    /// Restart requests, unless the rig uses the real scheduler.
    pub restart: Arc<CountingRestart>,
    /// The system under test.
    pub system: KiteSystem,
}

impl KiteRig {
    /// Start configuring a rig.
    #[must_use]
    pub fn builder() -> RigBuilder {
        RigBuilder {
            config: KiteConfig::default(),
            components: Vec::new(),
            observers: Vec::new(),
            scheduled_restart: false,
        }
    }

    /// Move manual time forward.
    pub fn advance_ms(&self, ms: u64) {
        self.clock.advance_ms(ms);
    }

    /// Initialize, start every bound component and enter `RUNNING`.
    ///
    /// # Errors
    ///
    /// Any orchestrator failure along the way.
    pub fn boot_to_running(&self) -> OrchestratorResult<StartupSummary> {
        self.system.orchestrator.initialize()?;
        let summary = self.system.orchestrator.start_components()?;
        self.system
            .orchestrator
            .request_system_state_change(SystemState::Running, "Démarrage")?;
        Ok(summary)
    }
}

/// Builder for [`KiteRig`].
pub struct RigBuilder {
    config: KiteConfig,
    components: Vec<(SystemComponent, SharedComponent)>,
    observers: Vec<Arc<StateObserver>>,
    scheduled_restart: bool,
}

impl RigBuilder {
    /// Adjust the configuration.
    #[must_use]
    pub fn config(mut self, edit: impl FnOnce(&mut KiteConfig)) -> Self {
        edit(&mut self.config);
        self
    }

    /// Subsystems that must start for `READY`.
    #[must_use]
    pub fn required(mut self, ids: &[SystemComponent]) -> Self {
        self.config.orchestrator.required_components = ids.to_vec();
        self
    }

    /// Bind a component.
    #[must_use]
    pub fn component(mut self, id: SystemComponent, component: impl ManagedComponent + 'static) -> Self {
        self.components.push((id, share(component)));
        self
    }

    /// Bind a [`WatchedComponent`] and attach its observer once built.
    #[must_use]
    pub fn watched(mut self, component: WatchedComponent) -> Self {
        self.observers.push(Arc::clone(&component.observer));
        let id = component.id;
        self.component(id, component)
    }

    /// Use the real restart scheduler and channel reset instead of counting
    /// requests.
    #[must_use]
    pub fn scheduled_restart(mut self) -> Self {
        self.scheduled_restart = true;
        self
    }

    /// Wire the system.
    ///
    /// # Errors
    ///
    /// As [`KiteSystemBuilder::build`](kitepower_orchestrator::KiteSystemBuilder::build).
    pub fn build(self) -> OrchestratorResult<KiteRig> {
        let clock = Arc::new(ManualClock::new());
        let restart = CountingRestart::new();
        let hardware = SoftwareWatchdog::new(self.config.hardware_watchdog.clone());

        let mut builder = KiteSystem::builder(self.config)
            .clock(clock.clone())
            .hardware_watchdog(Box::new(hardware))
            .info_probe(Box::new(FixedProbe::new(ResourceSample {
                free_memory: 96_000,
                total_memory: 320_000,
                cpu_count: 2,
            })));
        if !self.scheduled_restart {
            builder = builder.restart_requester(restart.clone());
        }
        for (id, component) in self.components {
            builder = builder.component(id, component);
        }
        let system = builder.build()?;
        for observer in &self.observers {
            observer.attach(&system.state);
        }

        Ok(KiteRig {
            clock,
            restart,
            system,
        })
    }
}

/// Records the orchestrator's view of one subsystem whenever the
/// component is initialized.
#[derive(Debug, Default)]
pub struct StateObserver {
    state: OnceLock<Arc<SystemStateManager>>,
    seen: Mutex<Vec<ComponentState>>,
}

impl StateObserver {
    /// Attach to the state manager. Returns `false` if already attached.
    pub fn attach(&self, state: &Arc<SystemStateManager>) -> bool {
        self.state.set(Arc::clone(state)).is_ok()
    }

    /// Orchestrator states seen at each initialization, oldest first.
    #[must_use]
    pub fn seen(&self) -> Vec<ComponentState> {
        self.seen.lock().clone()
    }

    fn record(&self, id: SystemComponent) {
        if let Some(state) = self.state.get() {
            self.seen.lock().push(state.component_state(id));
        }
    }
}

/// A component that reports what the orchestrator thinks of it while it
/// is being (re)initialized.
#[derive(Debug)]
pub struct WatchedComponent {
    core: ComponentCore,
    id: SystemComponent,
    observer: Arc<StateObserver>,
}

impl WatchedComponent {
    /// A component bound to `id`, and its observer.
    #[must_use]
    pub fn new(id: SystemComponent, kind: ComponentKind) -> (Self, Arc<StateObserver>) {
        let observer = Arc::new(StateObserver::default());
        (
            Self {
                core: ComponentCore::new(id.as_str().to_lowercase(), kind),
                id,
                observer: Arc::clone(&observer),
            },
            observer,
        )
    }
}

impl ManagedComponent for WatchedComponent {
    fn core(&self) -> &ComponentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ComponentCore {
        &mut self.core
    }

    fn initialize(&mut self) -> CodeResult {
        self.observer.record(self.id);
        self.core.set_state(LifecycleState::Initializing);
        self.core.set_state(LifecycleState::Idle);
        Ok(())
    }
}

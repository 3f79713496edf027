//! The system orchestrator.

use std::collections::HashSet;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::time::Duration;

use kitepower_component::{ComponentDirectory, ComponentError, ComponentRegistry, LifecycleState};
use kitepower_error_manager::ErrorManager;
use kitepower_errors::{ErrorCode, ErrorSeverity};
use kitepower_hardware_watchdog::{
    HardwareWatchdog, HardwareWatchdogError, WatchdogMetrics, WatchdogStatus,
};
use kitepower_scheduler::{Interval, PeriodicTask, SchedulerResult, TaskHandle};
use kitepower_state::{
    Clock, ComponentState, RestartRequester, StateError, StateResult, SystemComponent,
    SystemState, SystemStateManager,
};
use kitepower_watchdog::{WatchdogError, WatchdogManager};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::info::{SystemInfo, SystemInfoProbe};
use crate::status::StatusReport;

const LOCK_TIMEOUT: Duration = Duration::from_millis(100);

/// Module name used in the orchestrator's own error reports.
pub const MODULE: &str = "ORCHESTRATOR";

/// Outcome of [`SystemOrchestrator::start_components`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StartupSummary {
    /// Subsystems initialized and enabled, in bind order.
    pub started: Vec<SystemComponent>,
    /// Subsystems whose initialization failed, with the failure.
    pub failed: Vec<(SystemComponent, ErrorCode)>,
    /// Subsystems under heartbeat monitoring.
    pub monitored: Vec<SystemComponent>,
}

/// Services the orchestrator sequences.
#[derive(Debug, Clone)]
pub struct OrchestratorParts {
    /// Global state.
    pub state: Arc<SystemStateManager>,
    /// Error ingestion.
    pub errors: Arc<ErrorManager>,
    /// Heartbeat monitoring.
    pub watchdog: Arc<WatchdogManager>,
    /// Subsystem bindings.
    pub directory: Arc<ComponentDirectory>,
    /// Name index for listings.
    pub registry: Arc<ComponentRegistry>,
    /// The restart path.
    pub restart: Arc<dyn RestartRequester>,
}

/// Sequences startup and owns the sanctioned entry points for system-wide
/// state changes and restarts.
///
/// [`run`](Self::run) is the cooperative tick: it feeds the hardware
/// watchdog, refreshes [`SystemInfo`] at most once per refresh period and
/// applies the safe posture once each time the system enters `SAFE_MODE`.
pub struct SystemOrchestrator {
    config: OrchestratorConfig,
    parts: OrchestratorParts,
    clock: Arc<dyn Clock>,
    lifecycle: AtomicU8,
    hardware: Mutex<Box<dyn HardwareWatchdog>>,
    feed_failing: AtomicBool,
    update_failing: Mutex<HashSet<SystemComponent>>,
    probe: Mutex<Box<dyn SystemInfoProbe>>,
    info: Mutex<SystemInfo>,
    info_refresh: Mutex<Interval>,
    safe_mode_entries_handled: AtomicU64,
}

impl fmt::Debug for SystemOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemOrchestrator")
            .field("lifecycle", &self.lifecycle())
            .field("state", &self.parts.state.current_state())
            .finish_non_exhaustive()
    }
}

impl SystemOrchestrator {
    /// An uninitialized orchestrator. The hardware watchdog is armed by
    /// [`initialize`](Self::initialize).
    #[must_use]
    pub fn new(
        config: OrchestratorConfig,
        parts: OrchestratorParts,
        hardware: Box<dyn HardwareWatchdog>,
        probe: Box<dyn SystemInfoProbe>,
    ) -> Self {
        let info_refresh = Interval::new(config.info_refresh());
        Self {
            clock: Arc::clone(parts.state.clock()),
            config,
            parts,
            lifecycle: AtomicU8::new(LifecycleState::Uninitialized as u8),
            hardware: Mutex::new(hardware),
            feed_failing: AtomicBool::new(false),
            update_failing: Mutex::new(HashSet::new()),
            probe: Mutex::new(probe),
            info: Mutex::new(SystemInfo::default()),
            info_refresh: Mutex::new(info_refresh),
            safe_mode_entries_handled: AtomicU64::new(0),
        }
    }

    /// The services this orchestrator drives.
    #[must_use]
    pub fn parts(&self) -> &OrchestratorParts {
        &self.parts
    }

    /// Configuration.
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// The orchestrator's own lifecycle state.
    #[must_use]
    pub fn lifecycle(&self) -> LifecycleState {
        LifecycleState::from_raw(self.lifecycle.load(Ordering::Acquire))
            .unwrap_or(LifecycleState::Error)
    }

    fn set_lifecycle(&self, state: LifecycleState) {
        self.lifecycle.store(state as u8, Ordering::Release);
    }

    fn ensure_active(&self) -> OrchestratorResult<()> {
        if self.lifecycle() == LifecycleState::Active {
            Ok(())
        } else {
            Err(OrchestratorError::NotInitialized)
        }
    }

    /// Arm the hardware watchdog and become `ACTIVE`. Calling it again is a
    /// no-op.
    ///
    /// A hardware watchdog that cannot be armed is reported as `CRITICAL`
    /// and boot continues without it.
    ///
    /// # Errors
    ///
    /// None today; the result is kept for boot steps that may fail.
    pub fn initialize(&self) -> OrchestratorResult<()> {
        if self.lifecycle() == LifecycleState::Active {
            debug!("Orchestrator already initialized");
            return Ok(());
        }
        self.set_lifecycle(LifecycleState::Initializing);
        info!("Initializing system orchestrator");

        let armed = match self.hardware.try_lock_for(LOCK_TIMEOUT) {
            Some(mut hardware) => hardware.arm().map(|()| hardware.timeout_ms()),
            None => Err(HardwareWatchdogError::device(
                "hardware watchdog lock not acquired",
            )),
        };
        match armed {
            Ok(timeout_ms) => info!(timeout_ms, "Hardware watchdog armed"),
            Err(e) => {
                error!(error = %e, "Hardware watchdog not armed, continuing without it");
                self.report(
                    ErrorCode::HardwareWatchdogFailure,
                    ErrorSeverity::Critical,
                    MODULE,
                    &format!("hardware watchdog not armed: {e}"),
                );
            }
        }

        self.set_lifecycle(LifecycleState::Active);
        info!("System orchestrator active");
        Ok(())
    }

    fn report(&self, code: ErrorCode, severity: ErrorSeverity, module: &str, description: &str) {
        if let Err(e) = self
            .parts
            .errors
            .report_error(code, severity, module, description, None)
        {
            warn!(%code, module, error = %e, "Error report dropped");
        }
    }

    /// One cooperative tick. Does nothing until initialized.
    pub fn run(&self) {
        if self.lifecycle() != LifecycleState::Active {
            return;
        }
        self.feed_hardware_watchdog();

        let now = self.clock.now();
        let due = self
            .info_refresh
            .try_lock_for(LOCK_TIMEOUT)
            .is_some_and(|mut interval| interval.ready(now));
        if due {
            self.refresh_system_info(now);
        }

        self.observe_safe_mode();
    }

    fn feed_hardware_watchdog(&self) {
        let Some(mut hardware) = self.hardware.try_lock_for(LOCK_TIMEOUT) else {
            warn!("Hardware watchdog busy, feed skipped");
            return;
        };
        if !hardware.is_armed() {
            return;
        }
        match hardware.feed() {
            Ok(()) => {
                if self.feed_failing.swap(false, Ordering::AcqRel) {
                    info!("Hardware watchdog feeds recovered");
                }
            }
            Err(e) => {
                drop(hardware);
                if !self.feed_failing.swap(true, Ordering::AcqRel) {
                    error!(error = %e, "Hardware watchdog feed failed");
                    self.report(
                        ErrorCode::HardwareWatchdogFailure,
                        ErrorSeverity::High,
                        MODULE,
                        &format!("hardware watchdog feed failed: {e}"),
                    );
                }
            }
        }
    }

    fn refresh_system_info(&self, now: Duration) {
        let Some(mut probe) = self.probe.try_lock_for(LOCK_TIMEOUT) else {
            return;
        };
        let sample = probe.sample();
        drop(probe);
        if let Some(mut info) = self.info.try_lock_for(LOCK_TIMEOUT) {
            info.update(now, sample);
            debug!(
                uptime_ms = info.uptime_ms,
                free_memory = info.free_memory,
                "System info refreshed"
            );
        }
    }

    fn observe_safe_mode(&self) {
        let entries = self.parts.state.safe_mode_entries();
        let handled = self.safe_mode_entries_handled.swap(entries, Ordering::AcqRel);
        if entries > handled {
            warn!(entries, "Safe mode entered, applying safe posture");
            let applied = self.apply_safe_posture();
            info!(applied, "Safe posture applied");
        }
    }

    /// Put every component with a safe posture into it. Returns how many
    /// confirmed; failures are reported.
    pub fn apply_safe_posture(&self) -> usize {
        let mut applied = 0usize;
        for id in self.parts.directory.ids() {
            let outcome = self.parts.directory.with_component(id, |component| {
                component
                    .as_safe_state()
                    .map(|posture| posture.apply_safe_state())
            });
            match outcome {
                Ok(None) => {}
                Ok(Some(Ok(()))) => {
                    applied = applied.saturating_add(1);
                    debug!(component = %id, "Safe posture confirmed");
                }
                Ok(Some(Err(code))) => {
                    error!(component = %id, %code, "Safe posture not confirmed");
                    self.report(code, ErrorSeverity::High, id.as_str(), "safe posture not confirmed");
                }
                Err(e) => error!(component = %id, error = %e, "Safe posture not applied"),
            }
        }
        applied
    }

    /// Schedule a system restart after `delay`. Never silently dropped.
    pub fn request_system_restart(&self, delay: Duration) {
        info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "System restart requested by orchestrator"
        );
        self.parts.restart.request_system_restart(delay);
    }

    /// The sanctioned entry point for global state changes.
    ///
    /// # Errors
    ///
    /// The state manager's rejection or lock timeout.
    pub fn request_system_state_change(&self, state: SystemState, reason: &str) -> StateResult<()> {
        info!(to = %state, reason, "System state change requested");
        self.parts
            .state
            .transition_to(state, reason)
            .inspect_err(|e| warn!(to = %state, reason, error = %e, "System state change refused"))
    }

    /// `RUNNING -> POWER_SAVE`.
    ///
    /// # Errors
    ///
    /// As [`request_system_state_change`](Self::request_system_state_change).
    pub fn request_enter_power_save_mode(&self) -> StateResult<()> {
        self.request_system_state_change(SystemState::PowerSave, "entering power save")
    }

    /// `POWER_SAVE -> RUNNING`.
    ///
    /// # Errors
    ///
    /// As [`request_system_state_change`](Self::request_system_state_change).
    pub fn request_exit_power_save_mode(&self) -> StateResult<()> {
        self.request_system_state_change(SystemState::Running, "leaving power save")
    }

    /// `READY -> CALIBRATION`, then start calibrating every calibratable
    /// component. Their heartbeat monitoring is suspended while they
    /// calibrate. Returns the components calibrating.
    ///
    /// # Errors
    ///
    /// The refused state change. A component that cannot start calibrating
    /// is reported and left out.
    pub fn request_enter_calibration_mode(&self) -> OrchestratorResult<Vec<SystemComponent>> {
        self.request_system_state_change(SystemState::Calibration, "calibration requested")?;

        let mut calibrating = Vec::new();
        for id in self.calibratable_components() {
            self.set_monitoring(id, true);
            let started = self.parts.directory.with_component(id, |component| {
                component
                    .as_calibratable()
                    .map(|calibration| calibration.start_calibration())
            });
            match started {
                Ok(Some(Ok(()))) => {
                    self.mirror(id, ComponentState::Calibrating, "calibration started");
                    calibrating.push(id);
                }
                Ok(Some(Err(code))) => {
                    self.set_monitoring(id, false);
                    self.mirror(id, ComponentState::Error, "calibration did not start");
                    self.report(code, ErrorSeverity::Medium, id.as_str(), "calibration did not start");
                }
                Ok(None) => self.set_monitoring(id, false),
                Err(e) => {
                    self.set_monitoring(id, false);
                    warn!(component = %id, error = %e, "Calibration not started");
                }
            }
        }
        info!(?calibrating, "Calibration mode entered");
        Ok(calibrating)
    }

    /// Finish calibrating, resume monitoring and return to `READY`.
    ///
    /// # Errors
    ///
    /// [`StateError::InvalidTransition`] if the system is not calibrating,
    /// or the refused state change.
    pub fn request_exit_calibration_mode(&self) -> OrchestratorResult<()> {
        let current = self.parts.state.try_current_state()?;
        if current != SystemState::Calibration {
            return Err(StateError::invalid_transition(
                current,
                SystemState::Ready,
                "not calibrating",
            )
            .into());
        }

        for id in self.calibratable_components() {
            let finished = self.parts.directory.with_component(id, |component| {
                component
                    .as_calibratable()
                    .map(|calibration| calibration.finish_calibration())
            });
            match finished {
                Ok(Some(Ok(()))) => self.mirror(id, ComponentState::Operational, "calibration complete"),
                Ok(Some(Err(code))) => {
                    self.mirror(id, ComponentState::Error, "calibration failed");
                    self.report(code, ErrorSeverity::Medium, id.as_str(), "calibration failed");
                }
                Ok(None) => {}
                Err(e) => warn!(component = %id, error = %e, "Calibration not finished"),
            }
            self.set_monitoring(id, false);
        }

        self.request_system_state_change(SystemState::Ready, "calibration complete")?;
        Ok(())
    }

    fn calibratable_components(&self) -> Vec<SystemComponent> {
        self.parts
            .directory
            .ids()
            .into_iter()
            .filter(|id| {
                self.parts
                    .directory
                    .with_component(*id, |component| component.as_calibratable().is_some())
                    .unwrap_or(false)
            })
            .collect()
    }

    fn set_monitoring(&self, id: SystemComponent, suspend: bool) {
        match self.parts.watchdog.suspend_component_monitoring(id, suspend) {
            Ok(()) | Err(WatchdogError::NotRegistered(_)) => {}
            Err(e) => warn!(component = %id, suspend, error = %e, "Watchdog monitoring not changed"),
        }
    }

    fn mirror(&self, id: SystemComponent, state: ComponentState, reason: &str) {
        if let Err(e) = self.parts.state.update_component_state(id, state, reason) {
            warn!(component = %id, %state, error = %e, "Component state not recorded");
        }
    }

    /// `true` iff the orchestrator is `ACTIVE` and no reported error is
    /// unresolved. Any unresolved error, whatever its severity, makes the
    /// system unhealthy.
    #[must_use]
    pub fn is_system_healthy(&self) -> bool {
        self.lifecycle() == LifecycleState::Active
            && matches!(self.parts.errors.unresolved_error_count(), Ok(0))
    }

    /// Last system info snapshot.
    #[must_use]
    pub fn system_info(&self) -> SystemInfo {
        self.info
            .try_lock_for(LOCK_TIMEOUT)
            .map(|info| *info)
            .unwrap_or_default()
    }

    /// Hardware watchdog status, if its lock is free.
    #[must_use]
    pub fn hardware_watchdog_status(&self) -> Option<WatchdogStatus> {
        self.hardware.try_lock_for(LOCK_TIMEOUT).map(|hardware| hardware.status())
    }

    /// Hardware watchdog counters, if its lock is free.
    #[must_use]
    pub fn hardware_watchdog_metrics(&self) -> Option<WatchdogMetrics> {
        self.hardware.try_lock_for(LOCK_TIMEOUT).map(|hardware| hardware.metrics())
    }

    /// Initialize and enable every bound component in bind order, register
    /// them for listing and heartbeat monitoring, then move `INIT -> READY`
    /// if every required subsystem came up, `INIT -> ERROR` otherwise.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::NotInitialized`] before
    /// [`initialize`](Self::initialize), [`OrchestratorError::StartupFailed`]
    /// naming the missing required subsystems, or the refused transition.
    pub fn start_components(&self) -> OrchestratorResult<StartupSummary> {
        self.ensure_active()?;
        let mut summary = StartupSummary::default();

        for (id, component) in self.parts.directory.snapshot() {
            match self.parts.registry.register(&component) {
                Ok(()) | Err(ComponentError::DuplicateName(_)) => {}
                Err(e) => warn!(component = %id, error = %e, "Component not listed"),
            }

            self.mirror(id, ComponentState::Initializing, "starting");
            let started = self.parts.directory.with_component(id, |component| {
                component.initialize()?;
                component.enable()
            });
            let failure = match started {
                Ok(Ok(())) => None,
                Ok(Err(code)) => Some(code),
                Err(e) => Some(e.code()),
            };

            if let Some(code) = failure {
                self.mirror(id, ComponentState::Error, "initialization failed");
                self.report(
                    ErrorCode::ComponentInitFailed,
                    ErrorSeverity::High,
                    id.as_str(),
                    &format!("initialization failed: {code}"),
                );
                summary.failed.push((id, code));
                continue;
            }

            self.mirror(id, ComponentState::Operational, "initialized");
            summary.started.push(id);
            match self.parts.watchdog.register_from_policy(id) {
                Ok(_) => summary.monitored.push(id),
                Err(WatchdogError::InvalidConfiguration(_)) => {
                    debug!(component = %id, "No watchdog policy, not monitored");
                }
                Err(e) => warn!(component = %id, error = %e, "Watchdog registration failed"),
            }
        }

        let missing: Vec<SystemComponent> = self
            .config
            .required_components
            .iter()
            .copied()
            .filter(|id| !summary.started.contains(id))
            .collect();

        if missing.is_empty() {
            self.request_system_state_change(SystemState::Ready, "initialization complete")?;
            info!(started = summary.started.len(), "Components started");
            Ok(summary)
        } else {
            error!(?missing, "Required components did not start");
            self.request_system_state_change(SystemState::Error, "required components failed")?;
            Err(OrchestratorError::StartupFailed(missing))
        }
    }

    /// Run one update on every enabled component. A successful update is
    /// the component's heartbeat. Returns the number of successful updates.
    ///
    /// The first failure of a run of failed updates is logged as a warning,
    /// repeats at debug level; persistent failures surface as watchdog
    /// breaches.
    pub fn update_components(&self) -> usize {
        let mut updated = 0usize;
        for id in self.parts.directory.ids() {
            let outcome = self.parts.directory.with_component(id, |component| {
                component.is_enabled().then(|| component.update())
            });
            match outcome {
                Ok(Some(Ok(()))) => {
                    updated = updated.saturating_add(1);
                    if self.update_failing.lock().remove(&id) {
                        info!(component = %id, "Component updates succeeding again");
                    }
                    match self.parts.watchdog.heartbeat(id) {
                        Ok(()) | Err(WatchdogError::NotRegistered(_)) => {}
                        Err(e) => debug!(component = %id, error = %e, "Heartbeat dropped"),
                    }
                }
                Ok(Some(Err(code))) => {
                    if self.update_failing.lock().insert(id) {
                        warn!(component = %id, %code, "Component update failed");
                    } else {
                        debug!(component = %id, %code, "Update failed");
                    }
                }
                Ok(None) => {}
                Err(e) => debug!(component = %id, error = %e, "Update skipped"),
            }
        }
        updated
    }

    /// Snapshot for the API and display layers.
    #[must_use]
    pub fn status_report(&self) -> StatusReport {
        let state = self.parts.state.current_state();
        StatusReport {
            state,
            state_label: state.label(),
            previous_state: self.parts.state.previous_state(),
            state_reason: self.parts.state.state_reason(),
            time_in_state_ms: u64::try_from(self.parts.state.time_in_state().as_millis())
                .unwrap_or(u64::MAX),
            healthy: self.is_system_healthy(),
            unresolved_errors: self.parts.errors.unresolved_error_count().unwrap_or(0),
            total_errors: self.parts.errors.total_error_count(),
            components: self.parts.state.all_component_states().unwrap_or_default(),
            modules: self.parts.registry.list(),
            watchdog: self.parts.watchdog.entries(),
            hardware_watchdog: self.hardware_watchdog_status(),
            system_info: self.system_info(),
        }
    }

    /// Move to `SHUTDOWN` (through `ERROR` where the table requires it),
    /// stop monitoring, shut components down in reverse bind order and
    /// disarm the hardware watchdog.
    ///
    /// # Errors
    ///
    /// The refused transition; components are not touched in that case.
    pub fn shutdown(&self, reason: &str) -> OrchestratorResult<()> {
        let current = self.parts.state.try_current_state()?;
        if current != SystemState::Shutdown {
            if !self.parts.state.can_transition(SystemState::Shutdown) {
                self.request_system_state_change(SystemState::Error, reason)?;
            }
            self.request_system_state_change(SystemState::Shutdown, reason)?;
        }

        for id in self.parts.watchdog.registered_components() {
            match self.parts.watchdog.unregister_component(id) {
                Ok(()) | Err(WatchdogError::NotRegistered(_)) => {}
                Err(e) => warn!(component = %id, error = %e, "Watchdog entry not removed"),
            }
        }

        for id in self.parts.directory.ids().into_iter().rev() {
            match self.parts.directory.with_component(id, |component| component.shutdown()) {
                Ok(Ok(())) => {}
                Ok(Err(code)) => warn!(component = %id, %code, "Component shutdown reported a failure"),
                Err(e) => warn!(component = %id, error = %e, "Component not shut down"),
            }
            self.mirror(id, ComponentState::Inactive, reason);
        }

        match self.hardware.try_lock_for(LOCK_TIMEOUT) {
            Some(mut hardware) if hardware.is_armed() => {
                if let Err(e) = hardware.disarm() {
                    error!(error = %e, "Hardware watchdog not disarmed");
                }
            }
            Some(_) => {}
            None => error!("Hardware watchdog busy, not disarmed"),
        }

        self.set_lifecycle(LifecycleState::Disabled);
        info!(reason, "System shut down");
        Ok(())
    }

    /// Run [`run`](Self::run) on a named periodic task.
    ///
    /// # Errors
    ///
    /// A scheduler error if the thread cannot be spawned.
    pub fn spawn_tick_task(self: &Arc<Self>) -> SchedulerResult<TaskHandle> {
        let orchestrator = Arc::downgrade(self);
        PeriodicTask::spawn("orchestrator-tick", self.config.tick_interval(), move || {
            match orchestrator.upgrade() {
                Some(orchestrator) => {
                    orchestrator.run();
                    ControlFlow::Continue(())
                }
                None => ControlFlow::Break(()),
            }
        })
    }

    /// Run [`update_components`](Self::update_components) on a named
    /// periodic task.
    ///
    /// # Errors
    ///
    /// A scheduler error if the thread cannot be spawned.
    pub fn spawn_update_task(self: &Arc<Self>) -> SchedulerResult<TaskHandle> {
        let orchestrator = Arc::downgrade(self);
        PeriodicTask::spawn("component-update", self.config.update_interval(), move || {
            match orchestrator.upgrade() {
                Some(orchestrator) => {
                    orchestrator.update_components();
                    ControlFlow::Continue(())
                }
                None => ControlFlow::Break(()),
            }
        })
    }
}

//! The watchdog manager.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use kitepower_component::ComponentDirectory;
use kitepower_error_manager::ErrorManager;
use kitepower_errors::{ErrorCode, ErrorSeverity, RecoveryStrategy};
use kitepower_scheduler::{PeriodicTask, SchedulerResult, TaskHandle};
use kitepower_state::{Clock, RestartRequester, SystemComponent, SystemStateManager};
use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::actions::{ActionHandler, ActionTargets, Breach, builtin_handlers};
use crate::config::{WatchdogAction, WatchdogManagerConfig, WatchdogPolicy};
use crate::error::{WatchdogError, WatchdogResult};

/// Monitoring state of one subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WatchdogEntry {
    /// Monitored subsystem.
    pub component: SystemComponent,
    /// Allowed silence.
    pub timeout: Duration,
    /// Action on breach.
    pub action: WatchdogAction,
    /// Clock time of the last heartbeat.
    pub last_heartbeat: Duration,
    /// Breaches since registration.
    pub error_count: u32,
    /// Exempt from checks.
    pub suspended: bool,
    /// A breach fired and no heartbeat arrived since.
    pub in_breach: bool,
}

impl WatchdogEntry {
    /// Silence at `now`.
    #[must_use]
    pub fn elapsed(&self, now: Duration) -> Duration {
        now.saturating_sub(self.last_heartbeat)
    }
}

/// Result of one fired action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepOutcome {
    /// The breach.
    pub breach: Breach,
    /// Whether the action succeeded.
    pub succeeded: bool,
}

/// Per-component liveness monitor.
///
/// Each registered subsystem must call [`heartbeat`](Self::heartbeat) more
/// often than its timeout. [`sweep`](Self::sweep) runs on its own cadence,
/// and fires the configured action once per sustained breach: the entry
/// stays in breach until the next heartbeat.
pub struct WatchdogManager {
    config: WatchdogManagerConfig,
    clock: Arc<dyn Clock>,
    lock_timeout: Duration,
    entries: Mutex<BTreeMap<SystemComponent, WatchdogEntry>>,
    handlers: RwLock<HashMap<WatchdogAction, ActionHandler>>,
    errors: Arc<ErrorManager>,
    breaches: AtomicU64,
}

impl fmt::Debug for WatchdogManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchdogManager")
            .field("registered", &self.registered_components())
            .field("breaches", &self.total_breaches())
            .finish_non_exhaustive()
    }
}

/// Wires the watchdog manager to the mechanisms its actions trigger.
#[derive(Debug)]
pub struct WatchdogManagerBuilder {
    config: WatchdogManagerConfig,
    state: Arc<SystemStateManager>,
    errors: Arc<ErrorManager>,
    directory: Option<Arc<ComponentDirectory>>,
    restart: Option<Arc<dyn RestartRequester>>,
}

impl WatchdogManagerBuilder {
    /// Components reset by `RESET_COMPONENT`.
    #[must_use]
    pub fn directory(mut self, directory: Arc<ComponentDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Restart path used by `RESET_SYSTEM`.
    #[must_use]
    pub fn restart_requester(mut self, restart: Arc<dyn RestartRequester>) -> Self {
        self.restart = Some(restart);
        self
    }

    /// Build the manager with the built-in action table. No component is
    /// registered yet.
    #[must_use]
    pub fn build(self) -> WatchdogManager {
        let targets = ActionTargets {
            state: Arc::clone(&self.state),
            directory: self.directory,
            restart: self.restart,
            restart_delay: self.config.restart_delay(),
        };
        WatchdogManager {
            lock_timeout: self.config.lock_timeout(),
            clock: Arc::clone(self.state.clock()),
            config: self.config,
            entries: Mutex::new(BTreeMap::new()),
            handlers: RwLock::new(builtin_handlers(&targets)),
            errors: self.errors,
            breaches: AtomicU64::new(0),
        }
    }
}

impl WatchdogManager {
    /// Start wiring a manager. Heartbeat times come from the state
    /// manager's clock.
    #[must_use]
    pub fn builder(
        config: WatchdogManagerConfig,
        state: Arc<SystemStateManager>,
        errors: Arc<ErrorManager>,
    ) -> WatchdogManagerBuilder {
        WatchdogManagerBuilder {
            config,
            state,
            errors,
            directory: None,
            restart: None,
        }
    }

    /// Configuration, including the policy table.
    #[must_use]
    pub fn config(&self) -> &WatchdogManagerConfig {
        &self.config
    }

    fn lock(&self) -> WatchdogResult<MutexGuard<'_, BTreeMap<SystemComponent, WatchdogEntry>>> {
        self.entries
            .try_lock_for(self.lock_timeout)
            .ok_or(WatchdogError::LockTimeout(self.lock_timeout))
    }

    /// Start monitoring `component`, replacing any existing entry. The
    /// heartbeat clock starts now.
    ///
    /// # Errors
    ///
    /// [`WatchdogError::InvalidTimeout`] for a zero timeout,
    /// [`WatchdogError::LockTimeout`] if the lock is wedged.
    pub fn register_component(
        &self,
        component: SystemComponent,
        timeout_ms: u64,
        action: WatchdogAction,
    ) -> WatchdogResult<()> {
        if timeout_ms == 0 {
            return Err(WatchdogError::InvalidTimeout(component));
        }
        let entry = WatchdogEntry {
            component,
            timeout: Duration::from_millis(timeout_ms),
            action,
            last_heartbeat: self.clock.now(),
            error_count: 0,
            suspended: false,
            in_breach: false,
        };
        self.lock()?.insert(component, entry);
        info!(%component, timeout_ms, %action, "Component registered with watchdog");
        Ok(())
    }

    /// Register `component` with its row of the policy table.
    ///
    /// # Errors
    ///
    /// [`WatchdogError::InvalidConfiguration`] if the policy has no row for
    /// it, otherwise as [`register_component`](Self::register_component).
    pub fn register_from_policy(&self, component: SystemComponent) -> WatchdogResult<WatchdogPolicy> {
        let policy = self.config.policy_for(component).ok_or_else(|| {
            WatchdogError::invalid_configuration(format!("no watchdog policy for {component}"))
        })?;
        self.register_component(policy.component, policy.timeout_ms, policy.action)?;
        Ok(policy)
    }

    /// Stop monitoring `component`.
    ///
    /// # Errors
    ///
    /// [`WatchdogError::NotRegistered`] or [`WatchdogError::LockTimeout`].
    pub fn unregister_component(&self, component: SystemComponent) -> WatchdogResult<()> {
        self.lock()?
            .remove(&component)
            .ok_or(WatchdogError::NotRegistered(component))?;
        info!(%component, "Component unregistered from watchdog");
        Ok(())
    }

    /// Record a liveness signal. Ends any ongoing breach.
    ///
    /// # Errors
    ///
    /// [`WatchdogError::NotRegistered`] if the caller should register first,
    /// [`WatchdogError::LockTimeout`] if the lock is wedged.
    pub fn heartbeat(&self, component: SystemComponent) -> WatchdogResult<()> {
        let now = self.clock.now();
        let mut entries = self.lock()?;
        let entry = entries
            .get_mut(&component)
            .ok_or(WatchdogError::NotRegistered(component))?;
        entry.last_heartbeat = now;
        let recovered = std::mem::replace(&mut entry.in_breach, false);
        drop(entries);
        if recovered {
            info!(%component, "Heartbeat resumed");
        }
        Ok(())
    }

    /// Exempt `component` from timeout checks, or resume checking. Resuming
    /// restarts its heartbeat clock.
    ///
    /// # Errors
    ///
    /// [`WatchdogError::NotRegistered`] or [`WatchdogError::LockTimeout`].
    pub fn suspend_component_monitoring(
        &self,
        component: SystemComponent,
        suspend: bool,
    ) -> WatchdogResult<()> {
        let now = self.clock.now();
        let mut entries = self.lock()?;
        let entry = entries
            .get_mut(&component)
            .ok_or(WatchdogError::NotRegistered(component))?;
        entry.suspended = suspend;
        if !suspend {
            entry.last_heartbeat = now;
            entry.in_breach = false;
        }
        drop(entries);
        info!(%component, suspend, "Watchdog monitoring {}", if suspend { "suspended" } else { "resumed" });
        Ok(())
    }

    /// Copy of the entry of `component`.
    #[must_use]
    pub fn entry(&self, component: SystemComponent) -> Option<WatchdogEntry> {
        self.lock().ok()?.get(&component).copied()
    }

    /// Copies of every entry, in enum order. Empty if the lock is wedged.
    #[must_use]
    pub fn entries(&self) -> Vec<WatchdogEntry> {
        self.lock()
            .map(|entries| entries.values().copied().collect())
            .unwrap_or_default()
    }

    /// Monitored subsystems, in enum order. Empty if the lock is wedged.
    #[must_use]
    pub fn registered_components(&self) -> Vec<SystemComponent> {
        self.lock()
            .map(|entries| entries.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Breaches fired since construction.
    #[must_use]
    pub fn total_breaches(&self) -> u64 {
        self.breaches.load(Ordering::Relaxed)
    }

    /// Replace the handler of one action.
    pub fn set_action_handler<F>(&self, action: WatchdogAction, handler: F)
    where
        F: Fn(&Breach) -> bool + Send + Sync + 'static,
    {
        self.handlers.write().insert(action, Arc::new(handler));
    }

    /// Check every active entry and fire the action of each new breach.
    ///
    /// Breaches are collected under the lock; reports and actions run after
    /// it is released, so handlers may call back into the manager.
    ///
    /// # Errors
    ///
    /// [`WatchdogError::LockTimeout`] if the lock is wedged; nothing fires.
    pub fn sweep(&self) -> WatchdogResult<Vec<SweepOutcome>> {
        let now = self.clock.now();
        let breaches: Vec<Breach> = {
            let mut entries = self.lock()?;
            entries
                .values_mut()
                .filter(|entry| !entry.suspended && !entry.in_breach)
                .filter(|entry| entry.elapsed(now) > entry.timeout)
                .map(|entry| {
                    entry.in_breach = true;
                    entry.error_count = entry.error_count.saturating_add(1);
                    Breach {
                        component: entry.component,
                        elapsed: entry.elapsed(now),
                        timeout: entry.timeout,
                        action: entry.action,
                        error_count: entry.error_count,
                    }
                })
                .collect()
        };

        Ok(breaches.into_iter().map(|breach| self.fire(breach)).collect())
    }

    fn fire(&self, breach: Breach) -> SweepOutcome {
        self.breaches.fetch_add(1, Ordering::Relaxed);
        let description = breach.describe();
        warn!(
            component = %breach.component,
            elapsed_ms = u64::try_from(breach.elapsed.as_millis()).unwrap_or(u64::MAX),
            action = %breach.action,
            error_count = breach.error_count,
            "Watchdog breach"
        );
        if let Err(e) = self.errors.report_error(
            ErrorCode::WatchdogTimeout,
            ErrorSeverity::Medium,
            breach.component.as_str(),
            &description,
            Some(RecoveryStrategy::None),
        ) {
            error!(component = %breach.component, error = %e, "Could not report watchdog breach");
        }

        let handler = self
            .handlers
            .try_read_for(self.lock_timeout)
            .and_then(|handlers| handlers.get(&breach.action).cloned());
        let succeeded = handler.is_some_and(|handler| handler(&breach));

        if succeeded {
            info!(component = %breach.component, action = %breach.action, "Watchdog action succeeded");
            if breach.action == WatchdogAction::ResetComponent {
                self.refresh_after_reset(breach.component);
            }
        } else {
            error!(component = %breach.component, action = %breach.action, "Watchdog action failed");
        }
        SweepOutcome { breach, succeeded }
    }

    fn refresh_after_reset(&self, component: SystemComponent) {
        match self.heartbeat(component) {
            Ok(()) => {
                if self.errors.resolve_error(ErrorCode::WatchdogTimeout, Some(component.as_str())) {
                    debug!(%component, "Watchdog timeout resolved by reset");
                }
            }
            Err(e) => debug!(%component, error = %e, "No heartbeat refresh after reset"),
        }
    }

    /// Run [`sweep`](Self::sweep) on a named periodic task at the configured
    /// cadence. The task ends when the manager is dropped or the handle is
    /// stopped.
    ///
    /// # Errors
    ///
    /// A scheduler error if the thread cannot be spawned.
    pub fn spawn_sweep_task(self: &Arc<Self>) -> SchedulerResult<TaskHandle> {
        let manager = Arc::downgrade(self);
        PeriodicTask::spawn("watchdog-sweep", self.config.sweep_interval(), move || {
            let Some(manager) = manager.upgrade() else {
                return ControlFlow::Break(());
            };
            if let Err(e) = manager.sweep() {
                warn!(error = %e, "Watchdog sweep skipped");
            }
            ControlFlow::Continue(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kitepower_error_manager::ErrorManagerConfig;
    use kitepower_state::{ManualClock, StateConfig};
    use tracing_test::traced_test;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn fixture() -> (Arc<ManualClock>, Arc<ErrorManager>, WatchdogManager) {
        let clock = Arc::new(ManualClock::new());
        let state = Arc::new(SystemStateManager::new(StateConfig::default(), clock.clone()));
        let errors = Arc::new(ErrorManager::new(ErrorManagerConfig::default(), Arc::clone(&state)));
        let watchdog =
            WatchdogManager::builder(WatchdogManagerConfig::default(), state, Arc::clone(&errors)).build();
        (clock, errors, watchdog)
    }

    #[test]
    fn test_heartbeat_requires_registration() {
        let (_clock, _errors, watchdog) = fixture();
        assert_eq!(
            watchdog.heartbeat(SystemComponent::Imu),
            Err(WatchdogError::NotRegistered(SystemComponent::Imu))
        );
    }

    #[test]
    fn test_register_overwrites_entry() -> TestResult {
        let (clock, _errors, watchdog) = fixture();
        watchdog.register_component(SystemComponent::Imu, 500, WatchdogAction::LogOnly)?;
        clock.advance_ms(600);
        watchdog.sweep()?;
        watchdog.register_component(SystemComponent::Imu, 800, WatchdogAction::SafeMode)?;

        let entry = watchdog.entry(SystemComponent::Imu).ok_or("not registered")?;
        assert_eq!(entry.timeout, Duration::from_millis(800));
        assert_eq!(entry.action, WatchdogAction::SafeMode);
        assert_eq!(entry.error_count, 0);
        assert_eq!(entry.last_heartbeat, Duration::from_millis(600));
        Ok(())
    }

    #[test]
    fn test_timeout_boundary_is_exclusive() -> TestResult {
        let (clock, _errors, watchdog) = fixture();
        watchdog.register_component(SystemComponent::Display, 500, WatchdogAction::LogOnly)?;
        clock.advance_ms(500);
        assert!(watchdog.sweep()?.is_empty());
        clock.advance_ms(1);
        assert_eq!(watchdog.sweep()?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_suspended_component_is_not_checked() -> TestResult {
        let (clock, _errors, watchdog) = fixture();
        watchdog.register_component(SystemComponent::Servos, 100, WatchdogAction::LogOnly)?;
        watchdog.suspend_component_monitoring(SystemComponent::Servos, true)?;
        clock.advance_ms(5_000);
        assert!(watchdog.sweep()?.is_empty());

        watchdog.suspend_component_monitoring(SystemComponent::Servos, false)?;
        assert!(watchdog.sweep()?.is_empty());
        clock.advance_ms(101);
        assert_eq!(watchdog.sweep()?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_unregister() -> TestResult {
        let (_clock, _errors, watchdog) = fixture();
        watchdog.register_component(SystemComponent::Wifi, 100, WatchdogAction::LogOnly)?;
        watchdog.unregister_component(SystemComponent::Wifi)?;
        assert!(watchdog.registered_components().is_empty());
        assert_eq!(
            watchdog.unregister_component(SystemComponent::Wifi),
            Err(WatchdogError::NotRegistered(SystemComponent::Wifi))
        );
        Ok(())
    }

    #[test]
    #[traced_test]
    fn test_breach_is_logged_with_action() -> TestResult {
        let (clock, errors, watchdog) = fixture();
        watchdog.register_component(SystemComponent::Buttons, 200, WatchdogAction::LogOnly)?;
        clock.advance_ms(250);
        assert!(matches!(watchdog.sweep().as_deref(), Ok([outcome]) if outcome.succeeded));
        assert!(logs_contain("Watchdog breach"));
        assert!(logs_contain("LOG_ONLY"));
        assert_eq!(errors.error_count(ErrorCode::WatchdogTimeout), 1);
        Ok(())
    }
}

//! The error manager.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};
use std::time::Duration;

use kitepower_component::ComponentDirectory;
use kitepower_errors::{ErrorCode, ErrorSeverity, RecoveryStrategy};
use kitepower_state::{Clock, RestartRequester, SystemStateManager};
use parking_lot::{Mutex, MutexGuard, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::ErrorManagerConfig;
use crate::details::{ErrorDetails, RecoveryContext};
use crate::error::{ErrorManagerError, ErrorManagerResult};
use crate::recovery::{RecoveryHandler, RecoveryTargets, builtin_handlers};

/// Called synchronously for every `CRITICAL` report, after the entry is
/// recorded and outside the history lock.
pub type CriticalErrorCallback = Arc<dyn Fn(&ErrorDetails) + Send + Sync>;

#[derive(Debug, Default)]
struct History {
    entries: VecDeque<ErrorDetails>,
    counts: HashMap<ErrorCode, u32>,
    /// Open errors per code and module. Survives ring eviction; only
    /// resolution and clearing shrink it.
    unresolved: HashMap<(ErrorCode, String), usize>,
}

impl History {
    fn unresolved_total(&self) -> usize {
        self.unresolved.values().fold(0usize, |acc, n| acc.saturating_add(*n))
    }
}

/// Marks the current thread as running the critical callback until dropped.
struct CriticalGuard<'a> {
    active: &'a Mutex<Vec<ThreadId>>,
    thread: ThreadId,
}

impl<'a> CriticalGuard<'a> {
    fn enter(active: &'a Mutex<Vec<ThreadId>>) -> Option<Self> {
        let thread = thread::current().id();
        let mut threads = active.lock();
        if threads.contains(&thread) {
            return None;
        }
        threads.push(thread);
        Some(Self { active, thread })
    }
}

impl Drop for CriticalGuard<'_> {
    fn drop(&mut self) {
        self.active.lock().retain(|t| *t != self.thread);
    }
}

/// Single point of error ingestion, bounded history and recovery dispatch.
///
/// ```
/// use std::sync::Arc;
///
/// use kitepower_error_manager::{ErrorManager, ErrorManagerConfig};
/// use kitepower_errors::{ErrorCode, ErrorSeverity};
/// use kitepower_state::SystemStateManager;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let state = Arc::new(SystemStateManager::default());
/// let errors = ErrorManager::new(ErrorManagerConfig::default(), state);
///
/// errors.report_error(ErrorCode::ImuFailure, ErrorSeverity::High, "IMU", "no samples", None)?;
/// assert_eq!(errors.error_count(ErrorCode::ImuFailure), 1);
/// assert_eq!(errors.unresolved_error_count()?, 1);
///
/// assert!(errors.resolve_error(ErrorCode::ImuFailure, None));
/// assert_eq!(errors.unresolved_error_count()?, 0);
/// # Ok(())
/// # }
/// ```
pub struct ErrorManager {
    capacity: usize,
    lock_timeout: Duration,
    clock: Arc<dyn Clock>,
    history: Mutex<History>,
    total: AtomicU64,
    strategies: RwLock<HashMap<ErrorCode, RecoveryStrategy>>,
    handlers: RwLock<HashMap<RecoveryStrategy, RecoveryHandler>>,
    critical_callback: RwLock<Option<CriticalErrorCallback>>,
    in_critical_callback: Mutex<Vec<ThreadId>>,
}

impl fmt::Debug for ErrorManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorManager")
            .field("capacity", &self.capacity)
            .field("lock_timeout", &self.lock_timeout)
            .field("total", &self.total_error_count())
            .finish_non_exhaustive()
    }
}

/// Wires the error manager to the mechanisms its built-in recovery
/// handlers trigger.
#[derive(Debug)]
pub struct ErrorManagerBuilder {
    config: ErrorManagerConfig,
    state: Arc<SystemStateManager>,
    directory: Option<Arc<ComponentDirectory>>,
    restart: Option<Arc<dyn RestartRequester>>,
}

impl ErrorManagerBuilder {
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

    /// Build the manager with the built-in handler table.
    #[must_use]
    pub fn build(self) -> ErrorManager {
        let targets = RecoveryTargets {
            state: Arc::clone(&self.state),
            directory: self.directory,
            restart: self.restart,
            restart_delay: self.config.restart_delay(),
        };
        ErrorManager {
            capacity: self.config.history_capacity.max(1),
            lock_timeout: self.config.lock_timeout(),
            clock: Arc::clone(self.state.clock()),
            history: Mutex::new(History::default()),
            total: AtomicU64::new(0),
            strategies: RwLock::new(self.config.default_strategies.into_iter().collect()),
            handlers: RwLock::new(builtin_handlers(&targets)),
            critical_callback: RwLock::new(None),
            in_critical_callback: Mutex::new(Vec::new()),
        }
    }
}

impl ErrorManager {
    /// Manager without a component directory or restart path; those
    /// strategies then report failure.
    #[must_use]
    pub fn new(config: ErrorManagerConfig, state: Arc<SystemStateManager>) -> Self {
        Self::builder(config, state).build()
    }

    /// Start wiring a manager. Timestamps come from the state manager's
    /// clock.
    #[must_use]
    pub fn builder(config: ErrorManagerConfig, state: Arc<SystemStateManager>) -> ErrorManagerBuilder {
        ErrorManagerBuilder {
            config,
            state,
            directory: None,
            restart: None,
        }
    }

    fn lock_history(&self) -> ErrorManagerResult<MutexGuard<'_, History>> {
        self.history
            .try_lock_for(self.lock_timeout)
            .ok_or(ErrorManagerError::LockTimeout(self.lock_timeout))
    }

    /// Record an error and run its recovery.
    ///
    /// `strategy` overrides the code's default strategy. Returns whether a
    /// recovery ran and succeeded; on success the code's unresolved entries
    /// are marked resolved. `OK` is not an error and is ignored.
    ///
    /// # Errors
    ///
    /// [`ErrorManagerError::LockTimeout`] if the history lock is wedged; the
    /// error is then neither recorded nor recovered.
    pub fn report_error(
        &self,
        code: ErrorCode,
        severity: ErrorSeverity,
        module: &str,
        description: &str,
        strategy: Option<RecoveryStrategy>,
    ) -> ErrorManagerResult<bool> {
        if code.is_ok() {
            debug!(module, "Ignoring report of OK");
            return Ok(false);
        }
        let strategy = strategy.unwrap_or_else(|| self.recovery_strategy(code));

        let details = {
            let mut history = self.lock_history().inspect_err(|e| {
                error!(%code, module, description, error = %e, "Error report dropped");
            })?;
            let count = history.counts.entry(code).or_insert(0);
            *count = count.saturating_add(1);
            let details = ErrorDetails {
                code,
                severity,
                module: module.to_owned(),
                description: description.to_owned(),
                strategy,
                timestamp: self.clock.now(),
                occurrence: *count,
                resolved: false,
            };
            let open = history.unresolved.entry((code, module.to_owned())).or_insert(0);
            *open = open.saturating_add(1);
            if history.entries.len() >= self.capacity {
                history.entries.pop_front();
            }
            history.entries.push_back(details.clone());
            details
        };
        self.total.fetch_add(1, Ordering::Relaxed);

        log_report(&details);
        if severity.is_critical() {
            self.notify_critical(&details);
        }

        if strategy == RecoveryStrategy::None {
            return Ok(false);
        }
        Ok(self.recover(&RecoveryContext {
            code,
            severity,
            module,
            description,
            strategy,
        }))
    }

    /// Report with severity derived from the code's numeric band and the
    /// code's default strategy.
    ///
    /// # Errors
    ///
    /// As [`report_error`](Self::report_error).
    pub fn report(&self, code: ErrorCode, module: &str, description: &str) -> ErrorManagerResult<bool> {
        self.report_error(code, code.default_severity(), module, description, None)
    }

    /// Run recovery for the most recent entry of `code`.
    ///
    /// Uses the code's configured strategy, or the strategy recorded with
    /// the entry when none is configured. Returns whether recovery
    /// succeeded; delegated strategies and `NONE` return `false`.
    pub fn attempt_recovery(&self, code: ErrorCode) -> bool {
        let latest = self.lock_history().ok().and_then(|history| {
            history
                .entries
                .iter()
                .rev()
                .find(|entry| entry.code == code)
                .cloned()
        });
        let configured = self.recovery_strategy(code);
        let strategy = match (&latest, configured) {
            (Some(entry), RecoveryStrategy::None) => entry.strategy,
            _ => configured,
        };
        if strategy == RecoveryStrategy::None {
            debug!(%code, "No recovery strategy");
            return false;
        }
        let (severity, module, description) = latest.as_ref().map_or(
            (code.default_severity(), "", ""),
            |entry| (entry.severity, entry.module.as_str(), entry.description.as_str()),
        );
        self.recover(&RecoveryContext {
            code,
            severity,
            module,
            description,
            strategy,
        })
    }

    fn recover(&self, ctx: &RecoveryContext<'_>) -> bool {
        let handler = self
            .handlers
            .try_read_for(self.lock_timeout)
            .and_then(|handlers| handlers.get(&ctx.strategy).cloned());
        let Some(handler) = handler else {
            warn!(code = %ctx.code, strategy = %ctx.strategy, "No recovery handler available");
            return false;
        };

        let recovered = handler(ctx);
        if recovered {
            info!(code = %ctx.code, module = ctx.module, strategy = %ctx.strategy, "Recovery succeeded");
            self.resolve_error(ctx.code, None);
        } else if !ctx.strategy.is_delegated() {
            warn!(code = %ctx.code, module = ctx.module, strategy = %ctx.strategy, "Recovery failed");
        }
        recovered
    }

    fn notify_critical(&self, details: &ErrorDetails) {
        let Some(callback) = self
            .critical_callback
            .try_read_for(self.lock_timeout)
            .and_then(|cb| cb.clone())
        else {
            return;
        };
        let Some(_guard) = CriticalGuard::enter(&self.in_critical_callback) else {
            warn!(code = %details.code, "Critical callback re-entered, skipping nested call");
            return;
        };
        callback(details);
    }

    /// Set the default strategy of `code`.
    pub fn set_recovery_strategy(&self, code: ErrorCode, strategy: RecoveryStrategy) {
        self.strategies.write().insert(code, strategy);
    }

    /// Default strategy of `code`, `NONE` if unset.
    #[must_use]
    pub fn recovery_strategy(&self, code: ErrorCode) -> RecoveryStrategy {
        self.strategies
            .try_read_for(self.lock_timeout)
            .and_then(|strategies| strategies.get(&code).copied())
            .unwrap_or_default()
    }

    /// Replace the handler of one strategy.
    pub fn set_recovery_handler<F>(&self, strategy: RecoveryStrategy, handler: F)
    where
        F: Fn(&RecoveryContext<'_>) -> bool + Send + Sync + 'static,
    {
        self.handlers.write().insert(strategy, Arc::new(handler));
    }

    /// Install the callback run for `CRITICAL` reports. A nested critical
    /// report raised from inside the callback on the same thread does not
    /// call it again; reports from other threads always do.
    pub fn set_critical_error_callback<F>(&self, callback: F)
    where
        F: Fn(&ErrorDetails) + Send + Sync + 'static,
    {
        *self.critical_callback.write() = Some(Arc::new(callback));
    }

    /// Occurrences of `code` since the last clear. `0` if the lock is
    /// wedged.
    #[must_use]
    pub fn error_count(&self, code: ErrorCode) -> u32 {
        self.lock_history()
            .map(|history| history.counts.get(&code).copied().unwrap_or(0))
            .unwrap_or_else(|e| {
                warn!(%code, error = %e, "Returning zero error count");
                0
            })
    }

    /// Every report ever recorded, clears included.
    #[must_use]
    pub fn total_error_count(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Reports not yet resolved or cleared, including those already
    /// evicted from the history ring.
    ///
    /// # Errors
    ///
    /// [`ErrorManagerError::LockTimeout`] if the history lock is wedged.
    pub fn unresolved_error_count(&self) -> ErrorManagerResult<usize> {
        let history = self.lock_history()?;
        Ok(history.unresolved_total())
    }

    /// History, oldest first. Empty if the lock is wedged.
    #[must_use]
    pub fn error_history(&self) -> Vec<ErrorDetails> {
        self.lock_history()
            .map(|history| history.entries.iter().cloned().collect())
            .unwrap_or_else(|e| {
                warn!(error = %e, "Returning empty error history");
                Vec::new()
            })
    }

    /// Mark the unresolved reports of `code` (and `module`, if given)
    /// resolved, evicted ones included. Returns `true` only if at least one
    /// report was open.
    pub fn resolve_error(&self, code: ErrorCode, module: Option<&str>) -> bool {
        let Ok(mut history) = self.lock_history() else {
            warn!(%code, "Could not resolve error, history lock wedged");
            return false;
        };
        let mut flipped = 0usize;
        history.unresolved.retain(|(open_code, open_module), open| {
            let matched = *open_code == code && module.is_none_or(|m| open_module == m);
            if matched {
                flipped = flipped.saturating_add(*open);
            }
            !matched
        });
        for entry in history
            .entries
            .iter_mut()
            .filter(|entry| !entry.resolved && entry.matches(code, module))
        {
            entry.resolved = true;
        }
        drop(history);
        if flipped > 0 {
            info!(%code, module = module.unwrap_or("*"), flipped, "Error resolved");
        }
        flipped > 0
    }

    /// Drop the history and the per-code counters.
    ///
    /// # Errors
    ///
    /// [`ErrorManagerError::LockTimeout`] if the history lock is wedged.
    pub fn clear_error_history(&self) -> ErrorManagerResult<()> {
        let mut history = self.lock_history()?;
        history.entries.clear();
        history.counts.clear();
        history.unresolved.clear();
        drop(history);
        info!("Error history cleared");
        Ok(())
    }

    /// Log every unresolved entry at its severity's level. Returns how many
    /// were logged; open reports already evicted from the ring are only
    /// counted in a summary line.
    pub fn log_unresolved_errors(&self) -> usize {
        let unresolved: Vec<ErrorDetails> = self
            .error_history()
            .into_iter()
            .filter(|entry| !entry.resolved)
            .collect();
        if unresolved.is_empty() {
            info!("No unresolved errors");
        }
        for entry in &unresolved {
            log_report(entry);
        }
        let evicted = self
            .unresolved_error_count()
            .unwrap_or(0)
            .saturating_sub(unresolved.len());
        if evicted > 0 {
            warn!(evicted, "Unresolved errors no longer in history");
        }
        unresolved.len()
    }
}

fn log_report(details: &ErrorDetails) {
    let ErrorDetails {
        code,
        severity,
        module,
        description,
        strategy,
        occurrence,
        ..
    } = details;
    match severity {
        ErrorSeverity::Info | ErrorSeverity::Low => {
            info!(code = code.name(), %severity, module, description, %strategy, occurrence, "Error reported");
        }
        ErrorSeverity::Medium => {
            warn!(code = code.name(), %severity, module, description, %strategy, occurrence, "Error reported");
        }
        ErrorSeverity::High | ErrorSeverity::Critical => {
            error!(code = code.name(), %severity, module, description, %strategy, occurrence, "Error reported");
        }
    }
}

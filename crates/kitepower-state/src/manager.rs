//! The system state manager.
//!
//! [`SystemStateManager`] owns the global [`SystemState`] and the per-subsystem
//! [`ComponentState`] table behind one mutex. All access uses a bounded wait;
//! transitions are validated against [`crate::transitions`] and committed
//! atomically with the check.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::{Clock, MonotonicClock};
use crate::config::StateConfig;
use crate::error::{StateError, StateResult};
use crate::transitions;
use crate::types::{ComponentState, SystemComponent, SystemState};

/// A committed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateChange {
    /// State before the transition.
    pub from: SystemState,
    /// State after the transition.
    pub to: SystemState,
    /// Caller-supplied reason.
    pub reason: String,
    /// Clock time of the commit.
    pub at: Duration,
}

struct StateInner {
    current: SystemState,
    previous: Option<SystemState>,
    entered_at: Duration,
    reason: String,
    components: BTreeMap<SystemComponent, ComponentState>,
    history: VecDeque<StateChange>,
}

/// Single source of truth for the global state and per-component states.
pub struct SystemStateManager {
    inner: Mutex<StateInner>,
    clock: Arc<dyn Clock>,
    lock_timeout: Duration,
    history_capacity: usize,
    safe_mode_entries: AtomicU64,
}

impl fmt::Debug for SystemStateManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemStateManager")
            .field("current", &self.try_current_state())
            .field("lock_timeout", &self.lock_timeout)
            .field("history_capacity", &self.history_capacity)
            .finish_non_exhaustive()
    }
}

impl Default for SystemStateManager {
    fn default() -> Self {
        Self::new(StateConfig::default(), Arc::new(MonotonicClock::new()))
    }
}

impl SystemStateManager {
    /// Create a manager in `INIT` with every component `NOT_INITIALIZED`.
    #[must_use]
    pub fn new(config: StateConfig, clock: Arc<dyn Clock>) -> Self {
        let components = SystemComponent::ALL
            .iter()
            .map(|c| (*c, ComponentState::NotInitialized))
            .collect();
        let history_capacity = config.history_capacity.max(1);
        Self {
            inner: Mutex::new(StateInner {
                current: SystemState::Init,
                previous: None,
                entered_at: clock.now(),
                reason: "power on".to_owned(),
                components,
                history: VecDeque::with_capacity(history_capacity),
            }),
            clock,
            lock_timeout: config.lock_timeout(),
            history_capacity,
            safe_mode_entries: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> StateResult<MutexGuard<'_, StateInner>> {
        self.inner
            .try_lock_for(self.lock_timeout)
            .ok_or(StateError::LockTimeout(self.lock_timeout))
    }

    /// Request a transition of the global state.
    ///
    /// # Errors
    ///
    /// - [`StateError::InvalidTransition`] if the pair is not allowed; the
    ///   state is unchanged.
    /// - [`StateError::LockTimeout`] if the lock is wedged; transient.
    pub fn transition_to(&self, new_state: SystemState, reason: &str) -> StateResult<()> {
        let mut inner = self.lock().inspect_err(|e| {
            warn!(to = %new_state, reason, error = %e, "State transition not attempted");
        })?;
        self.commit(&mut inner, new_state, reason)
    }

    fn commit(&self, inner: &mut StateInner, to: SystemState, reason: &str) -> StateResult<()> {
        let from = inner.current;
        if !transitions::is_allowed(from, to) {
            let why = transitions::rule(from, to)
                .map_or("no transition defined for this pair", |row| row.reason);
            warn!(%from, %to, reason, rejected_because = why, "State transition rejected");
            return Err(StateError::invalid_transition(from, to, why));
        }

        let at = self.clock.now();
        inner.previous = Some(from);
        inner.current = to;
        inner.entered_at = at;
        inner.reason = reason.to_owned();
        if inner.history.len() >= self.history_capacity {
            inner.history.pop_front();
        }
        inner.history.push_back(StateChange {
            from,
            to,
            reason: reason.to_owned(),
            at,
        });
        if to == SystemState::SafeMode {
            self.safe_mode_entries.fetch_add(1, Ordering::AcqRel);
        }

        info!(%from, %to, reason, "System state changed");
        Ok(())
    }

    /// Whether a transition from the current state to `to` would be accepted.
    #[must_use]
    pub fn can_transition(&self, to: SystemState) -> bool {
        self.try_current_state()
            .is_ok_and(|from| transitions::is_allowed(from, to))
    }

    /// Move the system to `SAFE_MODE`, through `ERROR` when the direct
    /// transition is not allowed. Both hops are validated and committed under
    /// one lock acquisition. Already being in `SAFE_MODE` is success.
    ///
    /// # Errors
    ///
    /// [`StateError::InvalidTransition`] when neither path is legal (for
    /// example from `SHUTDOWN`), or [`StateError::LockTimeout`].
    pub fn escalate_to_safe_mode(&self, reason: &str) -> StateResult<()> {
        let mut inner = self.lock()?;
        let from = inner.current;
        if from == SystemState::SafeMode {
            debug!(reason, "Already in safe mode");
            return Ok(());
        }
        if transitions::is_allowed(from, SystemState::SafeMode) {
            return self.commit(&mut inner, SystemState::SafeMode, reason);
        }
        if from != SystemState::Error {
            self.commit(&mut inner, SystemState::Error, reason)?;
        }
        self.commit(&mut inner, SystemState::SafeMode, reason)
    }

    /// Record a new orchestration-level state for a subsystem. Not restricted
    /// by any transition table.
    ///
    /// # Errors
    ///
    /// [`StateError::LockTimeout`] if the lock is wedged.
    pub fn update_component_state(
        &self,
        component: SystemComponent,
        state: ComponentState,
        reason: &str,
    ) -> StateResult<()> {
        let mut inner = self.lock().inspect_err(|e| {
            warn!(%component, %state, reason, error = %e, "Component state update dropped");
        })?;
        let old = inner
            .components
            .insert(component, state)
            .unwrap_or_default();
        drop(inner);

        if old == state {
            debug!(%component, %state, reason, "Component state unchanged");
        } else {
            info!(%component, from = %old, to = %state, reason, "Component state changed");
        }
        Ok(())
    }

    /// Current global state, or the `ERROR` sentinel if the lock is wedged.
    ///
    /// The sentinel makes callers under contention behave as if a fault is
    /// present, never as if everything is fine.
    #[must_use]
    pub fn current_state(&self) -> SystemState {
        self.try_current_state().unwrap_or_else(|e| {
            warn!(error = %e, "Returning degraded system state");
            SystemState::Error
        })
    }

    /// Current global state.
    ///
    /// # Errors
    ///
    /// [`StateError::LockTimeout`] if the lock is wedged.
    pub fn try_current_state(&self) -> StateResult<SystemState> {
        Ok(self.lock()?.current)
    }

    /// State of one subsystem, or `ERROR` if the lock is wedged.
    #[must_use]
    pub fn component_state(&self, component: SystemComponent) -> ComponentState {
        match self.lock() {
            Ok(inner) => inner
                .components
                .get(&component)
                .copied()
                .unwrap_or_default(),
            Err(e) => {
                warn!(%component, error = %e, "Returning degraded component state");
                ComponentState::Error
            }
        }
    }

    /// Snapshot of every subsystem state.
    ///
    /// # Errors
    ///
    /// [`StateError::LockTimeout`] if the lock is wedged.
    pub fn all_component_states(&self) -> StateResult<BTreeMap<SystemComponent, ComponentState>> {
        Ok(self.lock()?.components.clone())
    }

    /// `true` if every subsystem is in `state`. `false` when the lock is wedged.
    #[must_use]
    pub fn are_all_components_in_state(&self, state: ComponentState) -> bool {
        self.lock()
            .is_ok_and(|inner| inner.components.values().all(|s| *s == state))
    }

    /// `true` if every listed subsystem is in `state`.
    #[must_use]
    pub fn are_components_in_state(&self, components: &[SystemComponent], state: ComponentState) -> bool {
        self.lock().is_ok_and(|inner| {
            components
                .iter()
                .all(|c| inner.components.get(c).copied().unwrap_or_default() == state)
        })
    }

    /// `true` if `component` is in `state`.
    #[must_use]
    pub fn is_component_in_state(&self, component: SystemComponent, state: ComponentState) -> bool {
        self.component_state(component) == state
    }

    /// State before the most recent transition.
    #[must_use]
    pub fn previous_state(&self) -> Option<SystemState> {
        self.lock().ok().and_then(|inner| inner.previous)
    }

    /// Time since the most recent transition. Zero if the lock is wedged.
    #[must_use]
    pub fn time_in_state(&self) -> Duration {
        let entered = match self.lock() {
            Ok(inner) => inner.entered_at,
            Err(_) => return Duration::ZERO,
        };
        self.clock.now().saturating_sub(entered)
    }

    /// Reason given for the most recent transition.
    #[must_use]
    pub fn state_reason(&self) -> String {
        self.lock()
            .map(|inner| inner.reason.clone())
            .unwrap_or_default()
    }

    /// Most recent committed transitions, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<StateChange> {
        self.lock()
            .map(|inner| inner.history.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// How many times `SAFE_MODE` has been entered since construction.
    #[must_use]
    pub fn safe_mode_entries(&self) -> u64 {
        self.safe_mode_entries.load(Ordering::Acquire)
    }

    /// The clock used for timestamps.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

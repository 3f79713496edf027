//! Ordered bindings from subsystems to their components.
//!
//! The directory is what the orchestration core uses to act on a subsystem:
//! startup runs in bind order, watchdog recovery resets the bound component
//! and calibration mode finds the calibratable ones.

use std::fmt;
use std::time::Duration;

use kitepower_state::{ComponentState, SystemComponent, SystemStateManager};
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::component::{ManagedComponent, SharedComponent};
use crate::error::{ComponentError, ComponentResult};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(100);

/// `SystemComponent -> SharedComponent` bindings in bind order.
pub struct ComponentDirectory {
    bindings: RwLock<Vec<(SystemComponent, SharedComponent)>>,
    lock_timeout: Duration,
}

impl fmt::Debug for ComponentDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDirectory")
            .field("bound", &self.ids())
            .field("lock_timeout", &self.lock_timeout)
            .finish()
    }
}

impl Default for ComponentDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentDirectory {
    /// An empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    /// An empty directory with a custom bounded wait for component locks.
    #[must_use]
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            bindings: RwLock::new(Vec::new()),
            lock_timeout,
        }
    }

    /// Bind a component to a subsystem.
    ///
    /// # Errors
    ///
    /// [`ComponentError::AlreadyBound`] if the subsystem is taken.
    pub fn bind(&self, id: SystemComponent, component: SharedComponent) -> ComponentResult<()> {
        let mut bindings = self.bindings.write();
        if bindings.iter().any(|(bound, _)| *bound == id) {
            return Err(ComponentError::AlreadyBound(id));
        }
        bindings.push((id, component));
        Ok(())
    }

    /// The component bound to `id`.
    #[must_use]
    pub fn get(&self, id: SystemComponent) -> Option<SharedComponent> {
        self.bindings
            .read()
            .iter()
            .find(|(bound, _)| *bound == id)
            .map(|(_, c)| SharedComponent::clone(c))
    }

    /// Bound subsystems in bind order.
    #[must_use]
    pub fn ids(&self) -> Vec<SystemComponent> {
        self.bindings.read().iter().map(|(id, _)| *id).collect()
    }

    /// Snapshot of the bindings in bind order. The directory lock is not held
    /// while the caller works on the components.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(SystemComponent, SharedComponent)> {
        self.bindings
            .read()
            .iter()
            .map(|(id, c)| (*id, SharedComponent::clone(c)))
            .collect()
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.read().len()
    }

    /// `true` if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.read().is_empty()
    }

    /// Run `f` on the component bound to `id` under a bounded lock wait.
    ///
    /// # Errors
    ///
    /// [`ComponentError::NotBound`] or [`ComponentError::Busy`].
    pub fn with_component<R>(
        &self,
        id: SystemComponent,
        f: impl FnOnce(&mut dyn ManagedComponent) -> R,
    ) -> ComponentResult<R> {
        let component = self.get(id).ok_or(ComponentError::NotBound(id))?;
        let mut guard = component
            .try_lock_for(self.lock_timeout)
            .ok_or_else(|| ComponentError::Busy(id.to_string()))?;
        Ok(f(&mut *guard))
    }

    /// Reset the component bound to `id` with its
    /// [`reinitialize`](ManagedComponent::reinitialize) cycle.
    ///
    /// # Errors
    ///
    /// [`ComponentError::NotBound`], [`ComponentError::Busy`], or
    /// [`ComponentError::Lifecycle`] with the component's failure code.
    pub fn reset_component(&self, id: SystemComponent) -> ComponentResult<()> {
        let outcome = self.with_component(id, |component| {
            let name = component.name().to_owned();
            component.reinitialize().map_err(|code| (name, code))
        })?;
        match outcome {
            Ok(()) => {
                info!(component = %id, "Component reset");
                Ok(())
            }
            Err((name, code)) => {
                warn!(component = %id, %code, "Component reset failed");
                Err(ComponentError::lifecycle(name, code))
            }
        }
    }

    /// Reset `id` and mirror the outcome in `state`: `RECOVERING` while the
    /// cycle runs, then `OPERATIONAL` or `ERROR`.
    ///
    /// A failed component-state update is logged and does not stop the
    /// reset.
    ///
    /// # Errors
    ///
    /// As [`reset_component`](Self::reset_component).
    pub fn recover(
        &self,
        id: SystemComponent,
        state: &SystemStateManager,
        reason: &str,
    ) -> ComponentResult<()> {
        mirror(state, id, ComponentState::Recovering, reason);
        let result = self.reset_component(id);
        let outcome = if result.is_ok() {
            ComponentState::Operational
        } else {
            ComponentState::Error
        };
        mirror(state, id, outcome, reason);
        result
    }
}

fn mirror(state: &SystemStateManager, id: SystemComponent, to: ComponentState, reason: &str) {
    if let Err(e) = state.update_component_state(id, to, reason) {
        warn!(component = %id, error = %e, "Could not record component state during recovery");
    }
}

//! Name-keyed index of every live component.
//!
//! The registry observes components; it never owns them. Entries hold weak
//! references, are kept in registration order and are never removed, so the
//! listing also shows components that have since been dropped.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, warn};

use crate::component::{ManagedComponent, SharedComponent};
use crate::error::{ComponentError, ComponentResult};
use crate::lifecycle::ComponentKind;

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(100);

struct Entry {
    name: String,
    kind: ComponentKind,
    component: Weak<Mutex<dyn ManagedComponent>>,
}

/// One row of [`ComponentRegistry::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentInfo {
    /// Component name.
    pub name: String,
    /// Component kind.
    pub kind: ComponentKind,
    /// Lifecycle token, `UNKNOWN` if the component is busy or gone.
    pub state: String,
    /// Enabled flag; `false` if unknown.
    pub enabled: bool,
    /// Whether the component is still alive.
    pub alive: bool,
}

/// Append-only, insertion-ordered index of components by name.
pub struct ComponentRegistry {
    entries: RwLock<Vec<Entry>>,
    lock_timeout: Duration,
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("names", &self.names())
            .finish()
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    /// An empty registry with a custom bounded wait for component locks.
    #[must_use]
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            lock_timeout,
        }
    }

    /// Add a component.
    ///
    /// # Errors
    ///
    /// - [`ComponentError::Busy`] if the component's lock is held.
    /// - [`ComponentError::DuplicateName`] if the name is taken.
    pub fn register(&self, component: &SharedComponent) -> ComponentResult<()> {
        let (name, kind) = {
            let guard = component
                .try_lock_for(self.lock_timeout)
                .ok_or_else(|| ComponentError::Busy("<unregistered>".into()))?;
            (guard.name().to_owned(), guard.kind())
        };

        let mut entries = self.entries.write();
        if entries.iter().any(|e| e.name == name) {
            warn!(component = %name, "Duplicate component name rejected");
            return Err(ComponentError::DuplicateName(name));
        }
        debug!(component = %name, %kind, "Component registered");
        entries.push(Entry {
            name,
            kind,
            component: Arc::downgrade(component),
        });
        Ok(())
    }

    /// Look up a live component by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<SharedComponent> {
        self.entries
            .read()
            .iter()
            .find(|e| e.name == name)
            .and_then(|e| e.component.upgrade())
    }

    /// Whether a component with this name was registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().iter().any(|e| e.name == name)
    }

    /// Number of registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// `true` if nothing was registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Registered names, in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.entries.read().iter().map(|e| e.name.clone()).collect()
    }

    /// Snapshot of every registration with its current state.
    #[must_use]
    pub fn list(&self) -> Vec<ComponentInfo> {
        let live: Vec<(String, ComponentKind, Option<SharedComponent>)> = self
            .entries
            .read()
            .iter()
            .map(|e| (e.name.clone(), e.kind, e.component.upgrade()))
            .collect();

        live.into_iter()
            .map(|(name, kind, component)| {
                let alive = component.is_some();
                let snapshot = component.as_ref().and_then(|c| {
                    c.try_lock_for(self.lock_timeout)
                        .map(|guard| (guard.state_string(), guard.is_enabled()))
                });
                let (state, enabled) = snapshot.unwrap_or(("UNKNOWN", false));
                ComponentInfo {
                    name,
                    kind,
                    state: state.to_owned(),
                    enabled,
                    alive,
                }
            })
            .collect()
    }
}

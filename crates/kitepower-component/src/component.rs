//! The managed component abstraction.
//!
//! Every driver and service implements [`ManagedComponent`]. Identity and
//! lifecycle bookkeeping live in a [`ComponentCore`] owned by the component;
//! the trait's provided methods implement the default lifecycle on top of it
//! and call the `on_enable`/`on_disable` hooks for hardware side effects.
//!
//! Optional behavior is expressed as capability traits ([`Configurable`],
//! [`Calibratable`], [`SafeStateCapable`]) reachable through the `as_*`
//! accessors, so there is one component hierarchy rather than one per
//! capability.

use std::sync::Arc;

use kitepower_errors::{CodeResult, ErrorCode};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::lifecycle::{ComponentKind, LifecycleState};

/// Identity and lifecycle bookkeeping shared by every component.
#[derive(Debug, Clone)]
pub struct ComponentCore {
    name: String,
    kind: ComponentKind,
    enabled: bool,
    state: LifecycleState,
}

impl ComponentCore {
    /// A disabled, uninitialized core.
    pub fn new(name: impl Into<String>, kind: ComponentKind) -> Self {
        Self {
            name: name.into(),
            kind,
            enabled: false,
            state: LifecycleState::Uninitialized,
        }
    }

    /// Set the initial enabled flag.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Component name. Unique across the registry.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Component kind.
    #[must_use]
    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    /// Whether the component participates in updates.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Set the enabled flag.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Move to a new lifecycle state. Only the owning component calls this.
    pub fn set_state(&mut self, state: LifecycleState) {
        let from = self.state;
        self.state = state;
        if state == LifecycleState::Error {
            warn!(component = %self.name, %from, "Component entered ERROR");
        } else if from != state {
            debug!(component = %self.name, %from, to = %state, "Component lifecycle changed");
        }
    }

    /// Record a failure: move to `ERROR` and hand back the code for `?`.
    pub fn fail(&mut self, code: ErrorCode) -> ErrorCode {
        self.set_state(LifecycleState::Error);
        code
    }
}

/// Accepts runtime parameters as a JSON object.
pub trait Configurable {
    /// Apply parameters. Unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// [`ErrorCode::InvalidArgument`] or [`ErrorCode::ConfigInvalid`] when a
    /// parameter is malformed; nothing is applied in that case.
    fn configure(&mut self, params: &Value) -> CodeResult;

    /// Current parameters.
    fn configuration(&self) -> Value;
}

/// Can run a calibration procedure.
pub trait Calibratable {
    /// Begin calibrating. Calibration may take longer than the component's
    /// heartbeat timeout.
    ///
    /// # Errors
    ///
    /// [`ErrorCode::CalibrationFailed`] if calibration cannot start.
    fn start_calibration(&mut self) -> CodeResult;

    /// Finish calibrating and keep the result.
    ///
    /// # Errors
    ///
    /// [`ErrorCode::CalibrationFailed`] if the result is unusable.
    fn finish_calibration(&mut self) -> CodeResult;

    /// Whether a usable calibration is present.
    fn is_calibrated(&self) -> bool;
}

/// Can force itself into a non-hazardous posture (neutral servo angles,
/// stopped winch).
pub trait SafeStateCapable {
    /// Apply the safe posture. Must be fast and must not depend on other
    /// components.
    ///
    /// # Errors
    ///
    /// A hardware error code if the posture could not be confirmed.
    fn apply_safe_state(&mut self) -> CodeResult;
}

/// Uniform lifecycle interface of every driver and service.
///
/// Implementors provide [`core`](Self::core)/[`core_mut`](Self::core_mut) and
/// override only what they need. A component that fails to initialize must
/// leave itself in `ERROR` (see [`ComponentCore::fail`]) and return the error
/// code; it must never panic.
pub trait ManagedComponent: Send {
    /// Bookkeeping.
    fn core(&self) -> &ComponentCore;

    /// Mutable bookkeeping.
    fn core_mut(&mut self) -> &mut ComponentCore;

    /// Component name.
    fn name(&self) -> &str {
        self.core().name()
    }

    /// Component kind.
    fn kind(&self) -> ComponentKind {
        self.core().kind()
    }

    /// Current lifecycle state.
    fn state(&self) -> LifecycleState {
        self.core().state()
    }

    /// Whether the component participates in updates.
    fn is_enabled(&self) -> bool {
        self.core().is_enabled()
    }

    /// Display token of the current state.
    fn state_string(&self) -> &'static str {
        self.state().as_str()
    }

    /// Bring the component up. The default goes `INITIALIZING -> IDLE`
    /// unconditionally; components that own hardware must reject a second
    /// call with [`ErrorCode::AlreadyInitialized`].
    ///
    /// # Errors
    ///
    /// The failure code of the component's initialization.
    fn initialize(&mut self) -> CodeResult {
        let core = self.core_mut();
        core.set_state(LifecycleState::Initializing);
        core.set_state(LifecycleState::Idle);
        Ok(())
    }

    /// Set enabled, move to `ACTIVE`, then run [`on_enable`](Self::on_enable).
    ///
    /// # Errors
    ///
    /// The hook's error; the component is then in `ERROR`.
    fn enable(&mut self) -> CodeResult {
        let core = self.core_mut();
        core.set_enabled(true);
        core.set_state(LifecycleState::Active);
        self.on_enable().map_err(|code| self.core_mut().fail(code))
    }

    /// Clear enabled, move to `DISABLED`, then run
    /// [`on_disable`](Self::on_disable).
    ///
    /// # Errors
    ///
    /// The hook's error; the component is then in `ERROR`.
    fn disable(&mut self) -> CodeResult {
        let core = self.core_mut();
        core.set_enabled(false);
        core.set_state(LifecycleState::Disabled);
        self.on_disable().map_err(|code| self.core_mut().fail(code))
    }

    /// Side effects of enabling (attach hardware, start sampling).
    ///
    /// # Errors
    ///
    /// A hardware error code.
    fn on_enable(&mut self) -> CodeResult {
        Ok(())
    }

    /// Side effects of disabling (detach, power down).
    ///
    /// # Errors
    ///
    /// A hardware error code.
    fn on_disable(&mut self) -> CodeResult {
        Ok(())
    }

    /// One bounded, non-blocking unit of periodic work.
    ///
    /// # Errors
    ///
    /// The failure of this tick; the owner decides whether to report it.
    fn update(&mut self) -> CodeResult {
        Ok(())
    }

    /// Release resources and return to `UNINITIALIZED`.
    ///
    /// # Errors
    ///
    /// The error of the disable hook, if the component was enabled.
    fn shutdown(&mut self) -> CodeResult {
        let result = if self.is_enabled() {
            self.core_mut().set_enabled(false);
            self.on_disable()
        } else {
            Ok(())
        };
        self.core_mut().set_state(LifecycleState::Uninitialized);
        result
    }

    /// Full reset cycle used by watchdog recovery: shutdown, initialize,
    /// enable. A failing shutdown is logged and does not stop the cycle.
    ///
    /// # Errors
    ///
    /// The first failure of `initialize` or `enable`.
    fn reinitialize(&mut self) -> CodeResult {
        if let Err(code) = self.shutdown() {
            warn!(component = %self.name(), %code, "Shutdown failed during reset, continuing");
        }
        self.initialize()?;
        self.enable()
    }

    /// The configuration capability, if implemented.
    fn as_configurable(&mut self) -> Option<&mut dyn Configurable> {
        None
    }

    /// The calibration capability, if implemented.
    fn as_calibratable(&mut self) -> Option<&mut dyn Calibratable> {
        None
    }

    /// The safe-posture capability, if implemented.
    fn as_safe_state(&mut self) -> Option<&mut dyn SafeStateCapable> {
        None
    }
}

/// A component shared between its owner, the directory and the tasks that
/// update it.
pub type SharedComponent = Arc<Mutex<dyn ManagedComponent>>;

/// Wrap a component for sharing.
pub fn share<C: ManagedComponent + 'static>(component: C) -> SharedComponent {
    Arc::new(Mutex::new(component))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Lamp {
        core: ComponentCore,
        fail_enable: bool,
        enables: u32,
    }

    impl ManagedComponent for Lamp {
        fn core(&self) -> &ComponentCore {
            &self.core
        }
        fn core_mut(&mut self) -> &mut ComponentCore {
            &mut self.core
        }
        fn on_enable(&mut self) -> CodeResult {
            self.enables = self.enables.saturating_add(1);
            if self.fail_enable {
                Err(ErrorCode::DisplayFailure)
            } else {
                Ok(())
            }
        }
    }

    fn lamp(fail_enable: bool) -> Lamp {
        Lamp {
            core: ComponentCore::new("lamp", ComponentKind::Output),
            fail_enable,
            enables: 0,
        }
    }

    #[test]
    fn test_default_lifecycle() -> Result<(), ErrorCode> {
        let mut lamp = lamp(false);
        assert_eq!(lamp.state(), LifecycleState::Uninitialized);
        lamp.initialize()?;
        assert_eq!(lamp.state(), LifecycleState::Idle);
        lamp.enable()?;
        assert_eq!(lamp.state_string(), "ACTIVE");
        assert!(lamp.is_enabled());
        lamp.disable()?;
        assert_eq!(lamp.state(), LifecycleState::Disabled);
        assert!(!lamp.is_enabled());
        Ok(())
    }

    #[test]
    fn test_failing_hook_leaves_error_state() {
        let mut lamp = lamp(true);
        assert_eq!(lamp.enable(), Err(ErrorCode::DisplayFailure));
        assert_eq!(lamp.state(), LifecycleState::Error);
    }

    #[test]
    fn test_reinitialize_runs_full_cycle() -> Result<(), ErrorCode> {
        let mut lamp = lamp(false);
        lamp.initialize()?;
        lamp.enable()?;
        lamp.reinitialize()?;
        assert_eq!(lamp.state(), LifecycleState::Active);
        assert_eq!(lamp.enables, 2);
        Ok(())
    }

    #[test]
    fn test_no_capabilities_by_default() {
        let mut lamp = lamp(false);
        assert!(lamp.as_configurable().is_none());
        assert!(lamp.as_calibratable().is_none());
        assert!(lamp.as_safe_state().is_none());
    }
}

//! Mock components and collaborators.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use kitepower_component::{
    Calibratable, ComponentCore, ComponentKind, LifecycleState, ManagedComponent, SafeStateCapable,
};
use kitepower_errors::{CodeResult, ErrorCode};
use kitepower_state::RestartRequester;
use parking_lot::Mutex;

/// Counters and failure switches of a [`MockComponent`], shared with the
/// test after the component is moved into the system.
#[derive(Debug, Default)]
pub struct MockProbe {
    initializations: AtomicU32,
    enables: AtomicU32,
    disables: AtomicU32,
    updates: AtomicU32,
    shutdowns: AtomicU32,
    safe_states: AtomicU32,
    calibrations: AtomicU32,
    fail_initialize: AtomicBool,
    fail_update: AtomicBool,
}

impl MockProbe {
    pub fn initializations(&self) -> u32 {
        self.initializations.load(Ordering::SeqCst)
    }

    pub fn enables(&self) -> u32 {
        self.enables.load(Ordering::SeqCst)
    }

    pub fn disables(&self) -> u32 {
        self.disables.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> u32 {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> u32 {
        self.shutdowns.load(Ordering::SeqCst)
    }

    pub fn safe_states(&self) -> u32 {
        self.safe_states.load(Ordering::SeqCst)
    }

    pub fn calibrations(&self) -> u32 {
        self.calibrations.load(Ordering::SeqCst)
    }

    /// Make the next `initialize()` calls fail with `COMPONENT_INIT_FAILED`.
    pub fn set_fail_initialize(&self, fail: bool) {
        self.fail_initialize.store(fail, Ordering::SeqCst);
    }

    /// Make `update()` fail with `HARDWARE_FAILURE`.
    pub fn set_fail_update(&self, fail: bool) {
        self.fail_update.store(fail, Ordering::SeqCst);
    }

    fn bump(counter: &AtomicU32) {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

/// A scriptable component. Rejects a second `initialize()` like a real
/// driver and can opt into the calibration and safe-state capabilities.
#[derive(Debug)]
pub struct MockComponent {
    core: ComponentCore,
    probe: Arc<MockProbe>,
    initialized: bool,
    calibratable: bool,
    safe_state: bool,
    calibrating: bool,
    calibrated: bool,
}

impl MockComponent {
    pub fn new(name: &str, kind: ComponentKind) -> Self {
        Self {
            core: ComponentCore::new(name, kind),
            probe: Arc::new(MockProbe::default()),
            initialized: false,
            calibratable: false,
            safe_state: false,
            calibrating: false,
            calibrated: false,
        }
    }

    /// Expose the calibration capability.
    #[must_use]
    pub fn with_calibration(mut self) -> Self {
        self.calibratable = true;
        self
    }

    /// Expose the safe-state capability.
    #[must_use]
    pub fn with_safe_state(mut self) -> Self {
        self.safe_state = true;
        self
    }

    pub fn probe(&self) -> Arc<MockProbe> {
        Arc::clone(&self.probe)
    }
}

impl ManagedComponent for MockComponent {
    fn core(&self) -> &ComponentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ComponentCore {
        &mut self.core
    }

    fn initialize(&mut self) -> CodeResult {
        if self.initialized {
            return Err(ErrorCode::AlreadyInitialized);
        }
        MockProbe::bump(&self.probe.initializations);
        self.core.set_state(LifecycleState::Initializing);
        if self.probe.fail_initialize.load(Ordering::SeqCst) {
            return Err(self.core.fail(ErrorCode::ComponentInitFailed));
        }
        self.initialized = true;
        self.core.set_state(LifecycleState::Idle);
        Ok(())
    }

    fn on_enable(&mut self) -> CodeResult {
        MockProbe::bump(&self.probe.enables);
        Ok(())
    }

    fn on_disable(&mut self) -> CodeResult {
        MockProbe::bump(&self.probe.disables);
        Ok(())
    }

    fn update(&mut self) -> CodeResult {
        MockProbe::bump(&self.probe.updates);
        if self.probe.fail_update.load(Ordering::SeqCst) {
            return Err(ErrorCode::HardwareFailure);
        }
        Ok(())
    }

    fn shutdown(&mut self) -> CodeResult {
        MockProbe::bump(&self.probe.shutdowns);
        if self.core.is_enabled() {
            self.core.set_enabled(false);
            MockProbe::bump(&self.probe.disables);
        }
        self.initialized = false;
        self.core.set_state(LifecycleState::Uninitialized);
        Ok(())
    }

    fn as_calibratable(&mut self) -> Option<&mut dyn Calibratable> {
        if self.calibratable { Some(self) } else { None }
    }

    fn as_safe_state(&mut self) -> Option<&mut dyn SafeStateCapable> {
        if self.safe_state { Some(self) } else { None }
    }
}

impl Calibratable for MockComponent {
    fn start_calibration(&mut self) -> CodeResult {
        MockProbe::bump(&self.probe.calibrations);
        self.calibrating = true;
        Ok(())
    }

    fn finish_calibration(&mut self) -> CodeResult {
        if !self.calibrating {
            return Err(ErrorCode::CalibrationFailed);
        }
        self.calibrating = false;
        self.calibrated = true;
        Ok(())
    }

    fn is_calibrated(&self) -> bool {
        self.calibrated
    }
}

impl SafeStateCapable for MockComponent {
    fn apply_safe_state(&mut self) -> CodeResult {
        MockProbe::bump(&self.probe.safe_states);
        Ok(())
    }
}

/// Restart path that only counts requests.
#[derive(Debug, Default)]
pub struct CountingRestart {
    requests: AtomicUsize,
    delays: Mutex<Vec<Duration>>,
}

impl CountingRestart {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().clone()
    }
}

impl RestartRequester for CountingRestart {
    fn request_system_restart(&self, delay: Duration) {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.delays.lock().push(delay);
    }
}

//! Simulated subsystem drivers.
//!
//! `kited` runs on a host without the kite's hardware, so every subsystem is
//! backed by a [`SimDriver`]: a component that counts its ticks and honors
//! faults injected through its shared [`SimFaults`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use kitepower_component::{
    Calibratable, ComponentCore, ComponentKind, LifecycleState, ManagedComponent,
    SafeStateCapable,
};
use kitepower_errors::{CodeResult, ErrorCode};
use kitepower_state::SystemComponent;
use tracing::{debug, info};

/// Fault switches shared between a driver and whoever drives the simulation.
#[derive(Debug, Default)]
pub struct SimFaults {
    fail_initialize: AtomicBool,
    stalled: AtomicBool,
    ticks: AtomicU64,
    safe_postures: AtomicU64,
}

impl SimFaults {
    /// Make the next `initialize` fail.
    pub fn set_fail_initialize(&self, fail: bool) {
        self.fail_initialize.store(fail, Ordering::SeqCst);
    }

    /// Make `update` fail until cleared, so the driver stops heartbeating.
    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    /// Whether updates currently fail.
    #[must_use]
    pub fn is_stalled(&self) -> bool {
        self.stalled.load(Ordering::SeqCst)
    }

    /// Successful updates so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    /// Safe postures applied so far.
    #[must_use]
    pub fn safe_postures(&self) -> u64 {
        self.safe_postures.load(Ordering::SeqCst)
    }
}

/// Static description of one simulated subsystem.
#[derive(Debug, Clone, Copy)]
struct DriverSpec {
    name: &'static str,
    kind: ComponentKind,
    failure: ErrorCode,
    calibratable: bool,
    safe_state: bool,
}

const fn spec_for(id: SystemComponent) -> DriverSpec {
    let (name, kind, failure) = match id {
        SystemComponent::Wifi => ("wifi", ComponentKind::Service, ErrorCode::ConnectionFailed),
        SystemComponent::Servos => ("servos", ComponentKind::Actuator, ErrorCode::ServoFailure),
        SystemComponent::Winch => ("winch", ComponentKind::Actuator, ErrorCode::WinchFailure),
        SystemComponent::Imu => ("imu", ComponentKind::Sensor, ErrorCode::ImuFailure),
        SystemComponent::Display => ("display", ComponentKind::Output, ErrorCode::DisplayFailure),
        SystemComponent::Buttons => ("buttons", ComponentKind::Input, ErrorCode::InputFailure),
        SystemComponent::Autopilot => ("autopilot", ComponentKind::Service, ErrorCode::CriticalFailure),
        SystemComponent::Power => ("power", ComponentKind::Service, ErrorCode::HardwareFailure),
        SystemComponent::Webserver => ("webserver", ComponentKind::Service, ErrorCode::ServerError),
        SystemComponent::LineSensor => (
            "line-sensor",
            ComponentKind::Sensor,
            ErrorCode::LineLengthSensorFailure,
        ),
    };
    DriverSpec {
        name,
        kind,
        failure,
        calibratable: matches!(id, SystemComponent::Imu | SystemComponent::LineSensor),
        safe_state: matches!(id, SystemComponent::Servos | SystemComponent::Winch),
    }
}

/// A simulated driver for one subsystem.
#[derive(Debug)]
pub struct SimDriver {
    core: ComponentCore,
    spec: DriverSpec,
    faults: Arc<SimFaults>,
    initialized: bool,
    calibrating: bool,
    calibrated: bool,
}

impl SimDriver {
    /// A driver for `id` and the fault switches that control it.
    #[must_use]
    pub fn new(id: SystemComponent) -> (Self, Arc<SimFaults>) {
        let spec = spec_for(id);
        let faults = Arc::new(SimFaults::default());
        (
            Self {
                core: ComponentCore::new(spec.name, spec.kind),
                spec,
                faults: Arc::clone(&faults),
                initialized: false,
                calibrating: false,
                calibrated: false,
            },
            faults,
        )
    }
}

impl ManagedComponent for SimDriver {
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
        self.core.set_state(LifecycleState::Initializing);
        if self.faults.fail_initialize.load(Ordering::SeqCst) {
            return Err(self.core.fail(ErrorCode::ComponentInitFailed));
        }
        self.initialized = true;
        self.core.set_state(LifecycleState::Idle);
        debug!(driver = self.spec.name, "Simulated driver initialized");
        Ok(())
    }

    fn update(&mut self) -> CodeResult {
        if !self.is_enabled() || self.calibrating {
            return Ok(());
        }
        if self.faults.is_stalled() {
            return Err(self.spec.failure);
        }
        self.faults.ticks.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn shutdown(&mut self) -> CodeResult {
        self.initialized = false;
        self.calibrating = false;
        self.core.set_enabled(false);
        self.core.set_state(LifecycleState::Uninitialized);
        Ok(())
    }

    fn as_calibratable(&mut self) -> Option<&mut dyn Calibratable> {
        if self.spec.calibratable {
            Some(self)
        } else {
            None
        }
    }

    fn as_safe_state(&mut self) -> Option<&mut dyn SafeStateCapable> {
        if self.spec.safe_state {
            Some(self)
        } else {
            None
        }
    }
}

impl Calibratable for SimDriver {
    fn start_calibration(&mut self) -> CodeResult {
        if !self.initialized {
            return Err(ErrorCode::NotInitialized);
        }
        self.calibrating = true;
        info!(driver = self.spec.name, "Calibration started");
        Ok(())
    }

    fn finish_calibration(&mut self) -> CodeResult {
        if !self.calibrating {
            return Err(ErrorCode::CalibrationFailed);
        }
        self.calibrating = false;
        self.calibrated = true;
        info!(driver = self.spec.name, "Calibration finished");
        Ok(())
    }

    fn is_calibrated(&self) -> bool {
        self.calibrated
    }
}

impl SafeStateCapable for SimDriver {
    fn apply_safe_state(&mut self) -> CodeResult {
        self.faults.safe_postures.fetch_add(1, Ordering::Relaxed);
        info!(driver = self.spec.name, "Safe posture applied");
        Ok(())
    }
}

/// Simulated drivers for every subsystem, in [`SystemComponent::ALL`] order,
/// with their fault switches.
#[must_use]
pub fn simulated_fleet() -> Vec<(SystemComponent, SimDriver, Arc<SimFaults>)> {
    SystemComponent::ALL
        .into_iter()
        .map(|id| {
            let (driver, faults) = SimDriver::new(id);
            (id, driver, faults)
        })
        .collect()
}

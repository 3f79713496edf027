//! Linux watchdog character device driver.
//!
//! Opening the device arms the kernel timer, every write feeds it, and
//! writing `V` before closing disarms it ("magic close"). Closing without
//! `V` leaves the timer running, so the board resets once it expires. The
//! device timeout itself is set by the driver or the kernel command line.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{error, info, warn};

use crate::config::{WatchdogBackend, WatchdogConfig};
use crate::error::{HardwareWatchdogError, HardwareWatchdogResult};
use crate::state::{WatchdogMetrics, WatchdogState, WatchdogStatus};
use crate::watchdog::HardwareWatchdog;

const FEED_BYTE: &[u8] = b"\0";
const MAGIC_CLOSE: &[u8] = b"V";

/// Watchdog backed by `/dev/watchdog` or a compatible device node.
#[derive(Debug)]
pub struct DevWatchdog {
    config: WatchdogConfig,
    path: PathBuf,
    device: Option<File>,
    state: WatchdogState,
    origin: Instant,
}

impl DevWatchdog {
    /// Driver for the device at `path`. Nothing is opened until `arm()`.
    #[must_use]
    pub fn new(config: WatchdogConfig, path: impl Into<PathBuf>) -> Self {
        Self {
            config,
            path: path.into(),
            device: None,
            state: WatchdogState::new(),
            origin: Instant::now(),
        }
    }

    /// Device path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn now_us(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_micros()).unwrap_or(u64::MAX)
    }

    fn write_device(&mut self, bytes: &[u8]) -> HardwareWatchdogResult<()> {
        let device = self.device.as_mut().ok_or(HardwareWatchdogError::NotArmed)?;
        device
            .write_all(bytes)
            .and_then(|()| device.flush())
            .map_err(|e| HardwareWatchdogError::device(format!("{}: {e}", self.path.display())))
    }

    fn magic_close(&mut self) -> HardwareWatchdogResult<()> {
        if self.device.is_none() {
            return Ok(());
        }
        let result = self.write_device(MAGIC_CLOSE);
        self.device = None;
        result
    }
}

impl HardwareWatchdog for DevWatchdog {
    fn feed(&mut self) -> HardwareWatchdogResult<()> {
        let now = self.now_us();
        self.state.feed(now)?;
        self.write_device(FEED_BYTE)
    }

    fn arm(&mut self) -> HardwareWatchdogResult<()> {
        if self.state.status() != WatchdogStatus::Disarmed {
            return Err(HardwareWatchdogError::invalid_transition(
                self.state.status().as_str(),
                WatchdogStatus::Armed.as_str(),
            ));
        }
        let device = OpenOptions::new()
            .write(true)
            .open(&self.path)
            .map_err(|e| HardwareWatchdogError::device(format!("{}: {e}", self.path.display())))?;
        self.device = Some(device);
        self.state.arm(self.now_us())?;
        info!(path = %self.path.display(), "Watchdog device armed");
        Ok(())
    }

    fn disarm(&mut self) -> HardwareWatchdogResult<()> {
        self.state.disarm()?;
        self.magic_close()?;
        info!(path = %self.path.display(), "Watchdog device disarmed");
        Ok(())
    }

    fn trigger_safe_state(&mut self) -> HardwareWatchdogResult<()> {
        self.state.trigger_safe_state()?;
        // Closing without the magic byte keeps the hardware timer running.
        self.device = None;
        error!(path = %self.path.display(), "Watchdog safe state triggered, board will reset");
        Ok(())
    }

    fn has_timed_out(&self) -> bool {
        self.state
            .check_expiry(self.now_us(), self.config.timeout_us())
    }

    fn status(&self) -> WatchdogStatus {
        self.state.status()
    }

    fn time_since_last_feed_us(&self) -> Option<u64> {
        self.state
            .status()
            .is_active()
            .then(|| self.now_us().saturating_sub(self.state.last_feed_us()))
    }

    fn reset(&mut self) {
        if let Err(e) = self.magic_close() {
            warn!(error = %e, "Magic close failed during reset");
        }
        self.state.reset();
    }

    fn config(&self) -> &WatchdogConfig {
        &self.config
    }

    fn metrics(&self) -> WatchdogMetrics {
        self.state.metrics()
    }
}

/// Build the driver selected by `config.backend`.
///
/// # Errors
///
/// [`HardwareWatchdogError::InvalidConfiguration`] if the configuration is
/// invalid.
pub fn from_config(config: WatchdogConfig) -> HardwareWatchdogResult<Box<dyn HardwareWatchdog>> {
    config.validate()?;
    Ok(match config.backend.clone() {
        WatchdogBackend::Software => Box::new(crate::SoftwareWatchdog::new(config)),
        WatchdogBackend::Device { path } => Box::new(DevWatchdog::new(config, path)),
    })
}

//! Cached system information.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use sysinfo::System;

/// One memory and CPU reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ResourceSample {
    /// Available memory in bytes.
    pub free_memory: u64,
    /// Total memory in bytes.
    pub total_memory: u64,
    /// Logical CPUs.
    pub cpu_count: usize,
}

/// Source of resource readings.
pub trait SystemInfoProbe: Send + fmt::Debug {
    /// Take a reading. Must not block for long.
    fn sample(&mut self) -> ResourceSample;
}

/// Reads the host through `sysinfo`.
pub struct SysinfoProbe {
    system: System,
}

impl fmt::Debug for SysinfoProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SysinfoProbe").finish_non_exhaustive()
    }
}

impl SysinfoProbe {
    /// Probe the host once for its CPU list, then refresh memory only.
    #[must_use]
    pub fn new() -> Self {
        Self {
            system: System::new_all(),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemInfoProbe for SysinfoProbe {
    fn sample(&mut self) -> ResourceSample {
        self.system.refresh_memory();
        ResourceSample {
            free_memory: self.system.available_memory(),
            total_memory: self.system.total_memory(),
            cpu_count: self.system.cpus().len(),
        }
    }
}

/// Returns a fixed reading. For simulation and tests.
#[derive(Debug, Clone, Default)]
pub struct FixedProbe {
    sample: ResourceSample,
    samples: u64,
}

impl FixedProbe {
    /// Always report `sample`.
    #[must_use]
    pub fn new(sample: ResourceSample) -> Self {
        Self { sample, samples: 0 }
    }

    /// Readings taken.
    #[must_use]
    pub fn samples(&self) -> u64 {
        self.samples
    }
}

impl SystemInfoProbe for FixedProbe {
    fn sample(&mut self) -> ResourceSample {
        self.samples = self.samples.saturating_add(1);
        self.sample
    }
}

/// Snapshot refreshed by the orchestrator tick at most once per refresh
/// period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SystemInfo {
    /// Time since boot at the last refresh, in milliseconds.
    pub uptime_ms: u64,
    /// Available memory in bytes.
    pub free_memory: u64,
    /// Lowest available memory seen since boot.
    pub min_free_memory: u64,
    /// Total memory in bytes.
    pub total_memory: u64,
    /// Logical CPUs.
    pub cpu_count: usize,
    /// Refreshes since boot.
    pub refreshes: u64,
}

impl SystemInfo {
    /// Fold a new reading taken at `uptime` into the snapshot.
    pub fn update(&mut self, uptime: Duration, sample: ResourceSample) {
        self.uptime_ms = u64::try_from(uptime.as_millis()).unwrap_or(u64::MAX);
        self.min_free_memory = if self.refreshes == 0 {
            sample.free_memory
        } else {
            self.min_free_memory.min(sample.free_memory)
        };
        self.free_memory = sample.free_memory;
        self.total_memory = sample.total_memory;
        self.cpu_count = sample.cpu_count;
        self.refreshes = self.refreshes.saturating_add(1);
    }
}

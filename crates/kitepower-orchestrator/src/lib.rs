//! Boot sequencing and system-wide control for the kite controller.
//!
//! [`KiteSystem`] wires one instance of every service:
//!
//! ```text
//! Clock ─► SystemStateManager ─► ErrorManager ─► WatchdogManager
//!                 │                   │                │
//!                 └───────────► SystemOrchestrator ◄───┘
//!                                     │
//!                     ComponentDirectory / RestartScheduler
//! ```
//!
//! [`SystemOrchestrator`] is the only sanctioned path for system-wide state
//! changes and restarts. Its [`run`](SystemOrchestrator::run) tick feeds the
//! hardware watchdog, refreshes [`SystemInfo`] and applies the safe posture
//! whenever the system enters `SAFE_MODE`.

pub mod config;
pub mod error;
pub mod info;
pub mod orchestrator;
pub mod prelude;
pub mod restart;
pub mod status;
pub mod system;

pub use config::{KiteConfig, OrchestratorConfig};
pub use error::{ConfigError, OrchestratorError, OrchestratorResult};
pub use info::{FixedProbe, ResourceSample, SysinfoProbe, SystemInfo, SystemInfoProbe};
pub use orchestrator::{MODULE, OrchestratorParts, StartupSummary, SystemOrchestrator};
pub use restart::{ChannelReset, PlatformReset, RestartJob, RestartScheduler, RestartSignal, RestartSpawner};
pub use status::StatusReport;
pub use system::{KiteSystem, KiteSystemBuilder};

//! Common imports.

pub use crate::config::{KiteConfig, OrchestratorConfig};
pub use crate::error::{ConfigError, OrchestratorError, OrchestratorResult};
pub use crate::info::{FixedProbe, ResourceSample, SystemInfo};
pub use crate::orchestrator::{StartupSummary, SystemOrchestrator};
pub use crate::restart::{ChannelReset, PlatformReset, RestartScheduler};
pub use crate::status::StatusReport;
pub use crate::system::KiteSystem;
pub use kitepower_state::{ComponentState, SystemComponent, SystemState};

//! Restart request seam.
//!
//! The error manager and the watchdog can both decide that the whole system
//! must restart, but neither owns the restart mechanism. They hold an
//! `Arc<dyn RestartRequester>` which the orchestrator implements.

use std::fmt;
use std::time::Duration;

/// Something that can schedule a full system restart.
pub trait RestartRequester: Send + Sync + fmt::Debug {
    /// Schedule a restart after `delay`. Must not block for the delay and must
    /// not silently drop the request.
    fn request_system_restart(&self, delay: Duration);
}

//! # kitepower-state
//!
//! The single authoritative operating mode of the KitePower firmware and the
//! per-subsystem status table that sits next to it.
//!
//! ## Architecture
//!
//! - [`types`] - [`SystemState`], [`SystemComponent`] and the orchestration-level
//!   [`ComponentState`]
//! - [`transitions`] - the static transition table, checked at compile time
//! - [`manager`] - [`SystemStateManager`], the lock-protected owner of both
//! - [`clock`] - the monotonic time source shared by every manager
//! - [`restart`] - the seam through which recovery paths ask for a restart
//! - [`error`] - state-specific error types
//!
//! ## Transition law
//!
//! Only pairs listed as allowed in [`transitions::TRANSITIONS`] are legal.
//! Everything else, including pairs that are not listed at all, is rejected
//! and leaves the state untouched.
//!
//! | From          | Allowed targets                                     |
//! |---------------|-----------------------------------------------------|
//! | `INIT`        | `READY`, `ERROR`                                    |
//! | `READY`       | `RUNNING`, `CALIBRATION`, `ERROR`, `UPDATE`, `SHUTDOWN` |
//! | `RUNNING`     | `READY`, `ERROR`, `POWER_SAVE`, `SAFE_MODE`, `SHUTDOWN` |
//! | `ERROR`       | `SAFE_MODE`, `INIT`, `SHUTDOWN`                     |
//! | `POWER_SAVE`  | `RUNNING`, `ERROR`                                  |
//! | `UPDATE`      | `INIT`, `ERROR`                                     |
//! | `CALIBRATION` | `READY`, `ERROR`                                    |
//! | `SAFE_MODE`   | `INIT`, `SHUTDOWN`                                  |
//! | `SHUTDOWN`    | (terminal)                                          |
//!
//! ## Locking
//!
//! Every accessor takes the state lock with a bounded wait. Reads that cannot
//! get the lock in time return a degraded value (`ERROR`) instead of blocking;
//! use [`SystemStateManager::try_current_state`] when the difference matters.
//!
//! ## Example
//!
//! ```rust
//! use kitepower_state::prelude::*;
//!
//! let manager = SystemStateManager::default();
//! assert_eq!(manager.current_state(), SystemState::Init);
//!
//! manager.transition_to(SystemState::Ready, "init complete")?;
//! assert!(manager.transition_to(SystemState::PowerSave, "too early").is_err());
//! assert_eq!(manager.current_state(), SystemState::Ready);
//! # Ok::<(), StateError>(())
//! ```

#![deny(
    unsafe_op_in_unsafe_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    missing_debug_implementations
)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod clock;
pub mod config;
pub mod error;
pub mod manager;
pub mod restart;
pub mod transitions;
pub mod types;

pub mod prelude;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::StateConfig;
pub use error::{StateError, StateResult};
pub use manager::{StateChange, SystemStateManager};
pub use restart::RestartRequester;
pub use transitions::{StateTransition, TRANSITIONS};
pub use types::{ComponentState, SystemComponent, SystemState};

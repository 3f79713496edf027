//! Prelude for convenient imports.
//!
//! ```rust
//! use kitepower_state::prelude::*;
//! ```

pub use crate::clock::{Clock, ManualClock, MonotonicClock};
pub use crate::config::StateConfig;
pub use crate::error::{StateError, StateResult};
pub use crate::manager::{StateChange, SystemStateManager};
pub use crate::restart::RestartRequester;
pub use crate::transitions::StateTransition;
pub use crate::types::{ComponentState, SystemComponent, SystemState};

//! Convenience re-exports for common test utilities.
//!
//! ```rust
//! use kitepower_test_helpers::prelude::*;
//! ```

pub use crate::fixtures::{boot_to_running, manual_state, manual_state_with, settle};
pub use crate::mock::{CountingRestart, MockComponent, MockProbe};
pub use crate::must::{must, must_some};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

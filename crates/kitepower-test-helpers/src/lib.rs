//! Shared test utilities for KitePower.
//!
//! - [`mod@must`] - unwrap helpers with `#[track_caller]`
//! - [`mock`] - scripted components and a counting restart path
//! - [`fixtures`] - state managers on a manual clock
//! - [`prelude`] - convenience re-exports
//!
//! ```toml
//! [dev-dependencies]
//! kitepower-test-helpers = { workspace = true }
//! ```

pub mod fixtures;
pub mod mock;
pub mod must;
pub mod prelude;

pub use must::*;

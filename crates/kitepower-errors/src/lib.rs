//! Firmware-wide error taxonomy for KitePower.
//!
//! Every driver, service and manager in the firmware reports failures with an
//! [`ErrorCode`] from one closed taxonomy. Codes are grouped in numeric bands and
//! the band alone decides the default [`ErrorSeverity`]:
//!
//! | Code value | Band            | Default severity |
//! |------------|-----------------|------------------|
//! | `0`        | success         | `INFO`           |
//! | `1..100`   | general/config  | `LOW`            |
//! | `100..200` | hardware        | `MEDIUM`         |
//! | `200..300` | communication   | `HIGH`           |
//! | `300..`    | runtime/system  | `CRITICAL`       |
//!
//! The banding is table-free on purpose so error codes keep their meaning when
//! they are reused across modules.
//!
//! # Example
//!
//! ```
//! use kitepower_errors::prelude::*;
//!
//! let code = ErrorCode::ImuFailure;
//! assert_eq!(code.category(), ErrorCategory::Hardware);
//! assert_eq!(code.default_severity(), ErrorSeverity::Medium);
//! assert_eq!(ErrorSeverity::from_code_value(250), ErrorSeverity::High);
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod code;
pub mod prelude;
pub mod severity;
pub mod strategy;

pub use code::{ErrorCategory, ErrorCode};
pub use severity::ErrorSeverity;
pub use strategy::RecoveryStrategy;

/// Result of a component lifecycle operation.
pub type CodeResult<T = ()> = std::result::Result<T, ErrorCode>;

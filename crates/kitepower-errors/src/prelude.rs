//! Prelude for kitepower-errors.
//!
//! ```
//! use kitepower_errors::prelude::*;
//!
//! fn probe(ok: bool) -> CodeResult {
//!     if ok { Ok(()) } else { Err(ErrorCode::SensorFailure) }
//! }
//! assert_eq!(probe(false), Err(ErrorCode::SensorFailure));
//! ```

pub use crate::{CodeResult, ErrorCategory, ErrorCode, ErrorSeverity, RecoveryStrategy};

//! # kitepower-component
//!
//! One lifecycle abstraction for every KitePower driver and service.
//!
//! - [`ManagedComponent`] is the single component trait. A component carries a
//!   [`ComponentKind`] tag and opts into capabilities ([`Configurable`],
//!   [`Calibratable`], [`SafeStateCapable`]) instead of sitting in a class tree.
//! - [`ComponentRegistry`] is the name-keyed observer index used for listings.
//! - [`ComponentDirectory`] binds each
//!   [`SystemComponent`](kitepower_state::SystemComponent) to the component
//!   that implements it.
//!
//! ```rust
//! use kitepower_component::prelude::*;
//!
//! struct WindVane {
//!     core: ComponentCore,
//! }
//!
//! impl ManagedComponent for WindVane {
//!     fn core(&self) -> &ComponentCore {
//!         &self.core
//!     }
//!     fn core_mut(&mut self) -> &mut ComponentCore {
//!         &mut self.core
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let vane = share(WindVane { core: ComponentCore::new("wind", ComponentKind::Sensor) });
//! let registry = ComponentRegistry::new();
//! registry.register(&vane)?;
//!
//! vane.lock().initialize()?;
//! assert_eq!(registry.list()[0].state, "IDLE");
//! # Ok(())
//! # }
//! ```

#![deny(
    unsafe_op_in_unsafe_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    missing_docs,
    missing_debug_implementations
)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod component;
pub mod directory;
pub mod error;
pub mod lifecycle;
pub mod registry;

pub mod prelude;

pub use component::{
    Calibratable, ComponentCore, Configurable, ManagedComponent, SafeStateCapable,
    SharedComponent, share,
};
pub use directory::ComponentDirectory;
pub use error::{ComponentError, ComponentResult};
pub use lifecycle::{ComponentKind, LifecycleState};
pub use registry::{ComponentInfo, ComponentRegistry};

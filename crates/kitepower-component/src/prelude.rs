//! Prelude for convenient imports.

pub use crate::component::{
    Calibratable, ComponentCore, Configurable, ManagedComponent, SafeStateCapable,
    SharedComponent, share,
};
pub use crate::directory::ComponentDirectory;
pub use crate::error::{ComponentError, ComponentResult};
pub use crate::lifecycle::{ComponentKind, LifecycleState};
pub use crate::registry::{ComponentInfo, ComponentRegistry};

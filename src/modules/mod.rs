//! Module system.
//!
//! Modules are named bundles of hooks that can be imported, enabled,
//! disabled and swapped while the engine runs. The [`ModuleManager`] owns
//! every instance; the hook registry only ever sees handler closures tagged
//! with the owning module's name.

pub mod builtin;
mod catalog;
mod context;
mod manager;
mod services;

pub use catalog::{ModuleCatalog, ModuleFactory, ModuleLoader};
pub use context::{Module, ModuleContext};
pub use manager::{ModuleEnv, ModuleManager};
pub use services::{ServiceDirectory, ServiceHandle};

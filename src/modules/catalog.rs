//! Statically linked module code, looked up by name.
//!
//! Each entry is a loader that produces the module's factory. Importing a
//! module runs its loader once and keeps the factory; `redo` runs the loader
//! again, so replacing an entry at runtime swaps the code a module runs.

use super::context::{Module, ModuleContext};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builds one instance of a module.
pub type ModuleFactory =
    Arc<dyn Fn(ModuleContext) -> anyhow::Result<Box<dyn Module>> + Send + Sync>;

/// Produces a module's factory; a failure here is an import failure.
pub type ModuleLoader = Arc<dyn Fn() -> anyhow::Result<ModuleFactory> + Send + Sync>;

/// Name → loader map shared between the engine and whoever installs code.
#[derive(Default)]
pub struct ModuleCatalog {
    entries: RwLock<BTreeMap<String, ModuleLoader>>,
}

impl ModuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog holding the bundled modules.
    pub fn with_builtins() -> Self {
        let catalog = Self::new();
        super::builtin::register_all(&catalog);
        catalog
    }

    /// Install (or replace) a module built by `factory`.
    pub fn register<F>(&self, name: &str, factory: F)
    where
        F: Fn(ModuleContext) -> anyhow::Result<Box<dyn Module>> + Send + Sync + 'static,
    {
        let factory: ModuleFactory = Arc::new(factory);
        self.register_loader(name, move || Ok(factory.clone()));
    }

    /// Install (or replace) a module whose factory is produced by `loader`.
    pub fn register_loader<L>(&self, name: &str, loader: L)
    where
        L: Fn() -> anyhow::Result<ModuleFactory> + Send + Sync + 'static,
    {
        self.entries.write().insert(name.to_string(), Arc::new(loader));
    }

    pub fn remove(&self, name: &str) -> bool {
        self.entries.write().remove(name).is_some()
    }

    pub fn resolve(&self, name: &str) -> Option<ModuleLoader> {
        self.entries.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }
}

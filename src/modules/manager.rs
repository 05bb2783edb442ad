//! Module lifecycle: UNIMPORTED → IMPORTED → ENABLED and back.
//!
//! Every operation returns a [`ModuleResult`]; failures inside module code
//! (errors or panics from loaders, factories and callbacks) are caught and
//! turned into values so they can never take the engine down.

use super::catalog::{ModuleCatalog, ModuleFactory};
use super::context::{Module, ModuleContext};
use super::services::ServiceDirectory;
use crate::control::{ControlHandle, LifecycleOp};
use crate::error::{ModuleError, ModuleResult};
use crate::hooks::{HookRegistry, NickHandle, panic_message};
use crate::network::OutputQueue;
use crate::telemetry::spans;
use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

struct ModuleRecord {
    factory: ModuleFactory,
    instance: Option<Box<dyn Module>>,
}

/// Shared pieces every [`ModuleContext`] is built from.
#[derive(Clone)]
pub struct ModuleEnv {
    pub outbox: Arc<OutputQueue>,
    pub control: ControlHandle,
    pub nick: NickHandle,
    pub data_root: PathBuf,
}

/// Owns module records and their instances.
pub struct ModuleManager {
    catalog: Arc<ModuleCatalog>,
    hooks: Arc<HookRegistry>,
    services: Arc<ServiceDirectory>,
    env: ModuleEnv,
    records: BTreeMap<String, ModuleRecord>,
}

/// Run module code, folding errors and panics into a message.
fn guarded<T>(f: impl FnOnce() -> anyhow::Result<T>) -> Result<T, String> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(format!("{:#}", e)),
        Err(payload) => Err(format!("panicked: {}", panic_message(&*payload))),
    }
}

impl ModuleManager {
    pub fn new(
        catalog: Arc<ModuleCatalog>,
        hooks: Arc<HookRegistry>,
        services: Arc<ServiceDirectory>,
        env: ModuleEnv,
    ) -> Self {
        Self {
            catalog,
            hooks,
            services,
            env,
            records: BTreeMap::new(),
        }
    }

    pub fn catalog(&self) -> &Arc<ModuleCatalog> {
        &self.catalog
    }

    pub fn services(&self) -> &Arc<ServiceDirectory> {
        &self.services
    }

    pub fn is_imported(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.records
            .get(name)
            .is_some_and(|r| r.instance.is_some())
    }

    /// Imported module names, sorted.
    pub fn imported(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }

    /// Enabled module names, sorted.
    pub fn enabled(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|(_, r)| r.instance.is_some())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Apply a control-surface operation.
    pub fn apply(&mut self, op: LifecycleOp, name: &str) -> ModuleResult {
        let _span = spans::module_op(op.as_str(), name).entered();
        let result = match op {
            LifecycleOp::Import => self.import(name),
            LifecycleOp::Deport => self.deport(name),
            LifecycleOp::Load => self.load(name),
            LifecycleOp::Unload => self.unload(name),
            LifecycleOp::Reload => self.reload(name),
            LifecycleOp::Redo => self.redo(name),
        };
        let label = match &result {
            Ok(()) => "ok",
            Err(e) => e.error_code(),
        };
        crate::metrics::record_module_operation(op.as_str(), label);
        match &result {
            Ok(()) => info!(op = %op, module = %name, "Module operation succeeded"),
            Err(e) => warn!(op = %op, module = %name, error = %e, "Module operation failed"),
        }
        result
    }

    /// Load a module's code. Importing twice is an error.
    pub fn import(&mut self, name: &str) -> ModuleResult {
        if self.records.contains_key(name) {
            return Err(ModuleError::AlreadyImported(name.to_string()));
        }
        let loader = self
            .catalog
            .resolve(name)
            .ok_or_else(|| ModuleError::UnknownModule(name.to_string()))?;
        let factory = guarded(|| loader()).map_err(|reason| ModuleError::LoadFailed {
            name: name.to_string(),
            reason,
        })?;

        self.records.insert(
            name.to_string(),
            ModuleRecord {
                factory,
                instance: None,
            },
        );
        Ok(())
    }

    /// Forget a module's code, disabling it first if needed.
    pub fn deport(&mut self, name: &str) -> ModuleResult {
        if self.is_enabled(name) {
            self.disable(name)?;
        }
        self.records
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ModuleError::NotImported(name.to_string()))
    }

    /// Create the instance and install its hooks and services.
    pub fn enable(&mut self, name: &str) -> ModuleResult {
        let record = self
            .records
            .get_mut(name)
            .ok_or_else(|| ModuleError::NotImported(name.to_string()))?;
        if record.instance.is_some() {
            return Err(ModuleError::AlreadyEnabled(name.to_string()));
        }

        let ctx = ModuleContext::new(
            name,
            self.env.outbox.clone(),
            self.env.control.clone(),
            self.services.clone(),
            self.env.nick.clone(),
            &self.env.data_root,
        );
        let factory = record.factory.clone();
        let enable_failed = |reason| ModuleError::EnableFailed {
            name: name.to_string(),
            reason,
        };

        let mut instance = guarded(|| factory(ctx)).map_err(enable_failed)?;
        guarded(|| instance.on_enable()).map_err(enable_failed)?;

        let hooks = guarded(|| Ok(instance.hooks())).map_err(enable_failed)?;
        let mut rejected = 0;
        for hook in hooks {
            if self.hooks.add_hook(name, hook).is_none() {
                rejected += 1;
            }
        }
        if rejected > 0 {
            warn!(module = %name, rejected, "Some hooks were not installed");
        }

        let tags = guarded(|| Ok(instance.services())).unwrap_or_default();
        if !tags.is_empty() {
            let handle = guarded(|| Ok(instance.service_handle())).unwrap_or_default();
            self.services.register(name, &tags, handle);
        }

        record.instance = Some(instance);
        Ok(())
    }

    /// Run the shutdown callback, remove hooks and services, drop the instance.
    pub fn disable(&mut self, name: &str) -> ModuleResult {
        let record = self
            .records
            .get_mut(name)
            .ok_or_else(|| ModuleError::NotImported(name.to_string()))?;
        let mut instance = record
            .instance
            .take()
            .ok_or_else(|| ModuleError::NotEnabled(name.to_string()))?;

        if let Err(reason) = guarded(|| instance.on_disable()) {
            error!(module = %name, %reason, "Module shutdown callback failed");
        }
        let removed = self.hooks.remove_owner(name);
        self.services.unregister(name);

        // Drop may run arbitrary module code too.
        if let Err(reason) = guarded(move || {
            drop(instance);
            Ok(())
        }) {
            error!(module = %name, %reason, "Module instance drop failed");
        }
        info!(module = %name, hooks = removed, "Module disabled");
        Ok(())
    }

    /// Import when needed, then enable.
    pub fn load(&mut self, name: &str) -> ModuleResult {
        if !self.is_imported(name) {
            self.import(name)?;
        }
        self.enable(name)
    }

    pub fn unload(&mut self, name: &str) -> ModuleResult {
        self.disable(name)
    }

    /// Fresh instance from the same code; stays disabled if it was.
    pub fn reload(&mut self, name: &str) -> ModuleResult {
        if !self.is_imported(name) {
            return Err(ModuleError::NotImported(name.to_string()));
        }
        if self.is_enabled(name) {
            self.disable(name)?;
            self.enable(name)?;
        }
        Ok(())
    }

    /// Deport, re-import from the catalog, and re-enable if it was enabled.
    pub fn redo(&mut self, name: &str) -> ModuleResult {
        if !self.is_imported(name) {
            return Err(ModuleError::NotImported(name.to_string()));
        }
        let was_enabled = self.is_enabled(name);
        self.deport(name)?;
        self.import(name)?;
        if was_enabled {
            self.enable(name)?;
        }
        Ok(())
    }

    /// Disable everything: reverse `startup_order` first, then the rest by name.
    pub fn unload_all(&mut self, startup_order: &[String]) {
        let mut order: Vec<String> = startup_order
            .iter()
            .rev()
            .filter(|name| self.is_enabled(name))
            .cloned()
            .collect();
        for name in self.enabled() {
            if !order.contains(&name) {
                order.push(name);
            }
        }

        for name in order {
            if let Err(e) = self.disable(&name) {
                warn!(module = %name, error = %e, "Failed to unload module");
            }
        }
    }
}

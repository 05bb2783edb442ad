//! The module contract and the handle each instance is built with.

use super::services::{ServiceDirectory, ServiceHandle};
use crate::control::ControlHandle;
use crate::hooks::{Hook, NickHandle};
use crate::network::OutputQueue;
use anyhow::Context as _;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A loadable bundle of hooks.
///
/// An instance exists only while the module is enabled. Its hooks are
/// registered right after [`Module::on_enable`] succeeds and removed right
/// after [`Module::on_disable`] runs.
pub trait Module: Send + Sync {
    /// Hooks to install while enabled.
    fn hooks(&self) -> Vec<Hook> {
        Vec::new()
    }

    /// Capability tags this instance provides.
    fn services(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Handle handed to consumers that look this module up by tag.
    fn service_handle(&self) -> Option<ServiceHandle> {
        None
    }

    fn on_enable(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_disable(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Everything a module instance may reach: its name, the outbox, the
/// lifecycle controls, the service directory and its own files.
#[derive(Clone)]
pub struct ModuleContext {
    name: String,
    outbox: Arc<OutputQueue>,
    control: ControlHandle,
    services: Arc<ServiceDirectory>,
    nick: NickHandle,
    data_root: PathBuf,
}

impl ModuleContext {
    pub fn new(
        name: &str,
        outbox: Arc<OutputQueue>,
        control: ControlHandle,
        services: Arc<ServiceDirectory>,
        nick: NickHandle,
        data_root: &Path,
    ) -> Self {
        Self {
            name: name.to_string(),
            outbox,
            control,
            services,
            nick,
            data_root: data_root.to_path_buf(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn outbox(&self) -> &Arc<OutputQueue> {
        &self.outbox
    }

    pub fn control(&self) -> &ControlHandle {
        &self.control
    }

    pub fn services(&self) -> &Arc<ServiceDirectory> {
        &self.services
    }

    /// The bot's current nickname.
    pub fn nick(&self) -> String {
        self.nick.get()
    }

    /// `<data_root>/config/<name>.toml`
    pub fn config_path(&self) -> PathBuf {
        self.data_root.join("config").join(format!("{}.toml", self.name))
    }

    /// `<data_root>/data/<name>/`, created if missing.
    pub fn data_dir(&self) -> std::io::Result<PathBuf> {
        let dir = self.data_root.join("data").join(&self.name);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Read this module's config file, or `T::default()` when there is none.
    pub fn load_config<T>(&self) -> anyhow::Result<T>
    where
        T: DeserializeOwned + Default,
    {
        let path = self.config_path();
        if !path.exists() {
            tracing::debug!(module = %self.name, path = %path.display(), "No module config, using defaults");
            return Ok(T::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }
}

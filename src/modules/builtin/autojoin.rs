//! Joins a configured channel list once the server welcomes us.
//!
//! Reads `<data_root>/config/autojoin.toml`:
//!
//! ```toml
//! channels = ["#rust", "#secret"]
//!
//! [keys]
//! "#secret" = "hunter2"
//! ```

use crate::hooks::Hook;
use crate::modules::{Module, ModuleContext};
use crate::network::{ConnectionState, OutputQueue};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

pub const NAME: &str = "autojoin";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AutojoinConfig {
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub keys: HashMap<String, String>,
}

pub struct Autojoin {
    ctx: ModuleContext,
    config: Arc<AutojoinConfig>,
}

impl Autojoin {
    pub fn new(ctx: ModuleContext) -> anyhow::Result<Self> {
        let config: AutojoinConfig = ctx.load_config()?;
        Ok(Self {
            ctx,
            config: Arc::new(config),
        })
    }
}

fn join_all(outbox: &OutputQueue, config: &AutojoinConfig) {
    for channel in &config.channels {
        outbox.join(channel, config.keys.get(channel).map(String::as_str), None);
    }
}

impl Module for Autojoin {
    fn hooks(&self) -> Vec<Hook> {
        let outbox = self.ctx.outbox().clone();
        let config = self.config.clone();
        vec![Hook::on(&["001"], move |_| {
            info!(channels = config.channels.len(), "Joining configured channels");
            join_all(&outbox, &config);
            Ok(())
        })]
    }

    fn on_enable(&mut self) -> anyhow::Result<()> {
        // Loaded mid-session: the welcome has already gone by.
        if self.ctx.control().state() == ConnectionState::Connected {
            join_all(self.ctx.outbox(), &self.config);
        }
        Ok(())
    }
}

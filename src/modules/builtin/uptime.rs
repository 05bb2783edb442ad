//! `.uptime`: how long the bot has been running.
//!
//! Also published under the `uptime` service tag so other modules can read
//! the start time through [`UptimeClock`].

use crate::hooks::{CommandSpec, Hook};
use crate::modules::{Module, ModuleContext, ServiceHandle};
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub const NAME: &str = "uptime";

/// Start time of the current instance.
#[derive(Debug)]
pub struct UptimeClock {
    started: DateTime<Utc>,
}

impl UptimeClock {
    pub fn started(&self) -> DateTime<Utc> {
        self.started
    }

    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now() - self.started
    }
}

/// Render as `1d 2h 3m 4s`, omitting leading zero units.
pub fn humanize(elapsed: chrono::Duration) -> String {
    let total = elapsed.num_seconds().max(0);
    let (days, hours, minutes, seconds) =
        (total / 86_400, total / 3_600 % 24, total / 60 % 60, total % 60);

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{}d", days));
    }
    if days > 0 || hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if days > 0 || hours > 0 || minutes > 0 {
        parts.push(format!("{}m", minutes));
    }
    parts.push(format!("{}s", seconds));
    parts.join(" ")
}

pub struct Uptime {
    ctx: ModuleContext,
    clock: Arc<UptimeClock>,
}

impl Uptime {
    pub fn new(ctx: ModuleContext) -> Self {
        Self {
            ctx,
            clock: Arc::new(UptimeClock {
                started: Utc::now(),
            }),
        }
    }
}

impl Module for Uptime {
    fn hooks(&self) -> Vec<Hook> {
        let outbox = self.ctx.outbox().clone();
        let clock = self.clock.clone();
        vec![Hook::command(CommandSpec::new("uptime"), move |_, cmd| {
            let text = format!(
                "Up for {} (since {})",
                humanize(clock.elapsed()),
                clock.started().format("%Y-%m-%d %H:%M:%S UTC")
            );
            outbox.privmsg(&cmd.reply_to, &text, None);
            Ok(())
        })]
    }

    fn services(&self) -> Vec<&'static str> {
        vec![NAME]
    }

    fn service_handle(&self) -> Option<ServiceHandle> {
        Some(self.clock.clone() as ServiceHandle)
    }
}

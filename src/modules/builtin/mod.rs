//! Modules bundled with the binary.

pub mod autojoin;
pub mod uptime;

use super::ModuleCatalog;

/// Add every bundled module to `catalog`.
pub fn register_all(catalog: &ModuleCatalog) {
    catalog.register(uptime::NAME, |ctx| Ok(Box::new(uptime::Uptime::new(ctx))));
    catalog.register(autojoin::NAME, |ctx| Ok(Box::new(autojoin::Autojoin::new(ctx)?)));
}

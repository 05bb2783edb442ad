//! Capability directory: lets one module find another by what it provides.

use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Opaque handle a module exposes to its consumers.
pub type ServiceHandle = Arc<dyn Any + Send + Sync>;

#[derive(Clone)]
struct Provider {
    module: String,
    handle: Option<ServiceHandle>,
}

/// Maps a capability tag to its providers, in the order they were enabled.
#[derive(Default)]
pub struct ServiceDirectory {
    providers: RwLock<HashMap<String, Vec<Provider>>>,
}

impl ServiceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `module` under every tag in `tags`.
    pub fn register(&self, module: &str, tags: &[&str], handle: Option<ServiceHandle>) {
        let mut providers = self.providers.write();
        for tag in tags {
            let list = providers.entry(tag.to_string()).or_default();
            if list.iter().any(|p| p.module == module) {
                continue;
            }
            list.push(Provider {
                module: module.to_string(),
                handle: handle.clone(),
            });
        }
    }

    /// Withdraw every tag `module` published. Returns how many were removed.
    pub fn unregister(&self, module: &str) -> usize {
        let mut providers = self.providers.write();
        let mut removed = 0;
        providers.retain(|_, list| {
            let before = list.len();
            list.retain(|p| p.module != module);
            removed += before - list.len();
            !list.is_empty()
        });
        removed
    }

    /// The preferred (earliest enabled) provider of `tag`.
    pub fn best_module_for_service(&self, tag: &str) -> Option<String> {
        self.providers
            .read()
            .get(tag)
            .and_then(|list| list.first())
            .map(|p| p.module.clone())
    }

    /// Every provider of `tag`, preferred first.
    pub fn modules_by_service(&self, tag: &str) -> Vec<String> {
        self.providers
            .read()
            .get(tag)
            .map(|list| list.iter().map(|p| p.module.clone()).collect())
            .unwrap_or_default()
    }

    /// The first provider of `tag` whose handle is a `T`.
    pub fn best_service<T>(&self, tag: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let providers = self.providers.read();
        providers
            .get(tag)?
            .iter()
            .filter_map(|p| p.handle.clone())
            .find_map(|handle| handle.downcast::<T>().ok())
    }

    /// Tags currently provided by `module`, sorted.
    pub fn tags_of(&self, module: &str) -> Vec<String> {
        let mut tags: Vec<String> = self
            .providers
            .read()
            .iter()
            .filter(|(_, list)| list.iter().any(|p| p.module == module))
            .map(|(tag, _)| tag.clone())
            .collect();
        tags.sort();
        tags
    }
}

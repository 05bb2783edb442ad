//! Hook table and synchronous event fan-out.
//!
//! The table maps each recognized event name to its subscribers in
//! registration order, plus a wildcard list that sees every event first.
//! Dispatch snapshots the subscriber list before calling anything, so a
//! handler that causes hooks to be added or removed never invalidates the
//! iteration in progress.

use super::events::{self, WILDCARD};
use super::trigger::{Handler, Hook, Matcher};
use crate::telemetry::DispatchTimer;
use parking_lot::RwLock;
use relaybot_proto::Event;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, warn};

/// Identifies one installed hook (possibly spanning several event names).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

/// Receives handler failures after they have been logged.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, owner: &str, event: &Event, error: &anyhow::Error);
}

/// Default reporter: counts failures per owner and event.
#[derive(Debug, Default)]
pub struct MetricsReporter;

impl ErrorReporter for MetricsReporter {
    fn report(&self, owner: &str, event: &Event, _error: &anyhow::Error) {
        crate::metrics::record_hook_failure(owner, &event.command);
    }
}

#[derive(Clone)]
struct HookEntry {
    id: HookId,
    owner: Arc<str>,
    handler: Handler,
}

/// Per-event subscriber lists.
pub struct HookRegistry {
    table: RwLock<HashMap<String, Vec<HookEntry>>>,
    next_id: AtomicU64,
    matcher: Matcher,
    reporter: Arc<dyn ErrorReporter>,
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic")
}

impl HookRegistry {
    pub fn new(matcher: Matcher, reporter: Arc<dyn ErrorReporter>) -> Self {
        Self {
            table: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            matcher,
            reporter,
        }
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Install `hook` for `owner`.
    ///
    /// Unrecognized event names are logged and skipped; returns `None` when
    /// nothing was installed.
    pub fn add_hook(&self, owner: &str, hook: Hook) -> Option<HookId> {
        let names: Vec<String> = hook
            .event_names()
            .into_iter()
            .filter(|name| {
                let ok = events::is_subscribable(name);
                if !ok {
                    warn!(owner = %owner, event = %name, "Rejecting hook for unrecognized event");
                }
                ok
            })
            .collect();
        if names.is_empty() {
            return None;
        }

        let entry = HookEntry {
            id: HookId(self.next_id.fetch_add(1, Ordering::Relaxed)),
            owner: Arc::from(owner),
            handler: hook.into_handler(&self.matcher),
        };

        let mut table = self.table.write();
        for name in &names {
            let subscribers = table.entry(name.clone()).or_default();
            if !subscribers.iter().any(|e| e.id == entry.id) {
                subscribers.push(entry.clone());
            }
        }
        debug!(owner = %owner, events = ?names, "Hook installed");
        Some(entry.id)
    }

    /// Remove one hook. Removing an absent hook is a no-op.
    pub fn remove_hook(&self, id: HookId) -> bool {
        let mut removed = false;
        let mut table = self.table.write();
        for subscribers in table.values_mut() {
            let before = subscribers.len();
            subscribers.retain(|e| e.id != id);
            removed |= subscribers.len() != before;
        }
        table.retain(|_, subscribers| !subscribers.is_empty());
        removed
    }

    /// Remove every hook installed by `owner`; returns how many entries went.
    pub fn remove_owner(&self, owner: &str) -> usize {
        let mut removed = 0;
        let mut table = self.table.write();
        for subscribers in table.values_mut() {
            let before = subscribers.len();
            subscribers.retain(|e| &*e.owner != owner);
            removed += before - subscribers.len();
        }
        table.retain(|_, subscribers| !subscribers.is_empty());
        removed
    }

    /// Number of handlers subscribed to `name` (wildcard not included).
    pub fn subscriber_count(&self, name: &str) -> usize {
        self.table.read().get(name).map_or(0, Vec::len)
    }

    /// Call every wildcard handler, then every handler for `event.command`.
    ///
    /// Each call is isolated: an error or panic is logged, reported, and the
    /// remaining handlers still run. Returns the number of failures.
    pub fn dispatch(&self, event: &Event) -> usize {
        if !events::is_recognized(&event.command) {
            debug!(command = %event.command, "Not dispatching unrecognized event");
            return 0;
        }

        let snapshot: Vec<HookEntry> = {
            let table = self.table.read();
            let wildcard = table.get(WILDCARD).into_iter().flatten();
            let specific = table.get(&event.command).into_iter().flatten();
            wildcard.chain(specific).cloned().collect()
        };
        let _timer = DispatchTimer::new(&event.command);

        let mut failures = 0;
        for entry in snapshot {
            let result = match catch_unwind(AssertUnwindSafe(|| (entry.handler)(event))) {
                Ok(result) => result,
                Err(payload) => Err(anyhow::anyhow!(
                    "handler panicked: {}",
                    panic_message(payload.as_ref())
                )),
            };
            if let Err(e) = result {
                failures += 1;
                error!(
                    owner = %entry.owner,
                    event = %event.command,
                    error = ?e,
                    "Hook failed"
                );
                self.reporter.report(&entry.owner, event, &e);
            }
        }
        failures
    }
}

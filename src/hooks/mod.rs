//! Hook registration and event dispatch.
//!
//! Modules declare [`Hook`]s; the lifecycle manager installs them into the
//! [`HookRegistry`] on enable and removes them by owner on disable. The read
//! loop and the output queue call [`HookRegistry::dispatch`].

pub mod events;
mod registry;
mod trigger;

pub(crate) use registry::panic_message;
pub use registry::{ErrorReporter, HookId, HookRegistry, MetricsReporter};
pub use trigger::{
    CommandHandler, CommandMatch, CommandSpec, Handler, Hook, Matcher, NickHandle, PatternHandler,
};

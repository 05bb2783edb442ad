//! relaybot - a long-lived, pluggable IRC client engine.
//!
//! The engine keeps a session against one of several servers, parses
//! incoming lines into events, fans them out to hooks installed by
//! hot-swappable modules, and paces outbound traffic through a prioritized,
//! rate-limited queue.

pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod http;
pub mod metrics;
pub mod modules;
pub mod network;
pub mod telemetry;

pub use engine::Engine;

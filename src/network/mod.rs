//! Network module.
//!
//! Contains the connection manager, the outbound queue with its drain loop,
//! and the burst-bucket rate limiter.

mod connection;
mod queue;
pub mod ratelimit;

pub use connection::{ConnectionManager, ConnectionState, ServerList};
pub use queue::{DrainStop, OutboundMessage, OutputQueue, PRIORITY_URGENT, drain};
pub use ratelimit::BurstBucket;

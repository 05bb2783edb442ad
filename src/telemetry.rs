//! Telemetry utilities for dispatch timing and session spans.

use std::time::Instant;

/// Guard for timing one event fan-out and recording metrics.
///
/// Records dispatch latency when dropped.
pub struct DispatchTimer<'a> {
    event: &'a str,
    start: Instant,
}

impl<'a> DispatchTimer<'a> {
    /// Start timing a dispatch.
    pub fn new(event: &'a str) -> Self {
        Self {
            event,
            start: Instant::now(),
        }
    }
}

impl Drop for DispatchTimer<'_> {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        crate::metrics::record_dispatch(self.event, duration);
    }
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, info_span};

    /// Span covering one connected session.
    pub fn session(endpoint: &str, attempt: u64) -> Span {
        info_span!("session", endpoint = %endpoint, attempt = attempt)
    }

    /// Span covering one lifecycle operation on a module.
    pub fn module_op(operation: &str, module: &str) -> Span {
        info_span!("module", op = %operation, name = %module)
    }
}

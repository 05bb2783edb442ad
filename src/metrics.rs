//! Prometheus metrics collection for relaybot.
//!
//! - `relaybot_lines_received_total` - Lines read from the transport
//! - `relaybot_lines_dropped_total{reason}` - Lines not dispatched
//! - `relaybot_events_dispatched_total{event}` - Events fanned out to hooks
//! - `relaybot_dispatch_duration_seconds{event}` - Fan-out latency
//! - `relaybot_hook_failures_total{owner,event}` - Handler errors and panics
//! - `relaybot_messages_sent_total` / `relaybot_send_failures_total`
//! - `relaybot_connect_attempts_total{result}` and `relaybot_connected`

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters (monotonic increasing)
// ========================================================================

/// Lines read from the server.
pub static LINES_RECEIVED: OnceLock<IntCounter> = OnceLock::new();

/// Lines dropped before dispatch, by reason.
pub static LINES_DROPPED: OnceLock<IntCounterVec> = OnceLock::new();

/// Events dispatched, by event name.
pub static EVENTS_DISPATCHED: OnceLock<IntCounterVec> = OnceLock::new();

/// Hook invocations that returned an error or panicked.
pub static HOOK_FAILURES: OnceLock<IntCounterVec> = OnceLock::new();

/// Lines written to the server.
pub static MESSAGES_SENT: OnceLock<IntCounter> = OnceLock::new();

/// Writes that failed and were dropped.
pub static SEND_FAILURES: OnceLock<IntCounter> = OnceLock::new();

/// Times the drain loop had to wait for the burst bucket.
pub static RATE_LIMIT_WAITS: OnceLock<IntCounter> = OnceLock::new();

/// Connect attempts by result (`ok`, `failed`).
pub static CONNECT_ATTEMPTS: OnceLock<IntCounterVec> = OnceLock::new();

/// Lifecycle operations by operation and result.
pub static MODULE_OPERATIONS: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Gauges and histograms
// ========================================================================

/// 1 while a session is established.
pub static CONNECTED: OnceLock<IntGauge> = OnceLock::new();

/// Messages waiting in the output queue.
pub static QUEUE_DEPTH: OnceLock<IntGauge> = OnceLock::new();

/// Dispatch latency by event name.
pub static DISPATCH_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            if $metric.get().is_none() {
                match $init {
                    Ok(m) => {
                        if let Err(e) = r.register(Box::new(m.clone())) {
                            tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                        }
                        let _ = $metric.set(m);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, concat!("Failed to create metric ", stringify!($metric)));
                    }
                }
            }
        };
    }

    register!(LINES_RECEIVED, IntCounter::new("relaybot_lines_received_total", "Lines read from the server"));
    register!(LINES_DROPPED, IntCounterVec::new(Opts::new("relaybot_lines_dropped_total", "Lines dropped before dispatch"), &["reason"]));
    register!(EVENTS_DISPATCHED, IntCounterVec::new(Opts::new("relaybot_events_dispatched_total", "Events dispatched to hooks"), &["event"]));
    register!(HOOK_FAILURES, IntCounterVec::new(Opts::new("relaybot_hook_failures_total", "Hook invocations that failed"), &["owner", "event"]));
    register!(MESSAGES_SENT, IntCounter::new("relaybot_messages_sent_total", "Lines written to the server"));
    register!(SEND_FAILURES, IntCounter::new("relaybot_send_failures_total", "Writes that failed and were dropped"));
    register!(RATE_LIMIT_WAITS, IntCounter::new("relaybot_rate_limit_waits_total", "Drain loop waits on the burst bucket"));
    register!(CONNECT_ATTEMPTS, IntCounterVec::new(Opts::new("relaybot_connect_attempts_total", "Connect attempts by result"), &["result"]));
    register!(MODULE_OPERATIONS, IntCounterVec::new(Opts::new("relaybot_module_operations_total", "Module lifecycle operations"), &["operation", "result"]));
    register!(CONNECTED, IntGauge::new("relaybot_connected", "1 while a session is established"));
    register!(QUEUE_DEPTH, IntGauge::new("relaybot_queue_depth", "Messages waiting in the output queue"));
    register!(DISPATCH_LATENCY, HistogramVec::new(
        HistogramOpts::new("relaybot_dispatch_duration_seconds", "Hook fan-out latency by event")
            .buckets(vec![0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
        &["event"]));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helper functions
// ============================================================================

#[inline]
fn inc(metric: &OnceLock<IntCounter>) {
    if let Some(c) = metric.get() {
        c.inc();
    }
}

#[inline]
fn inc_vec(metric: &OnceLock<IntCounterVec>, labels: &[&str]) {
    if let Some(c) = metric.get() {
        c.with_label_values(labels).inc();
    }
}

#[inline]
pub fn record_line_received() {
    inc(&LINES_RECEIVED);
}

#[inline]
pub fn record_line_dropped(reason: &str) {
    inc_vec(&LINES_DROPPED, &[reason]);
}

/// Record a completed dispatch with latency.
#[inline]
pub fn record_dispatch(event: &str, duration_secs: f64) {
    inc_vec(&EVENTS_DISPATCHED, &[event]);
    if let Some(h) = DISPATCH_LATENCY.get() {
        h.with_label_values(&[event]).observe(duration_secs);
    }
}

#[inline]
pub fn record_hook_failure(owner: &str, event: &str) {
    inc_vec(&HOOK_FAILURES, &[owner, event]);
}

#[inline]
pub fn record_sent() {
    inc(&MESSAGES_SENT);
}

#[inline]
pub fn record_send_failure() {
    inc(&SEND_FAILURES);
}

#[inline]
pub fn record_rate_limit_wait() {
    inc(&RATE_LIMIT_WAITS);
}

#[inline]
pub fn record_connect_attempt(ok: bool) {
    inc_vec(&CONNECT_ATTEMPTS, &[if ok { "ok" } else { "failed" }]);
}

#[inline]
pub fn record_module_operation(operation: &str, result: &str) {
    inc_vec(&MODULE_OPERATIONS, &[operation, result]);
}

#[inline]
pub fn set_connected(connected: bool) {
    if let Some(g) = CONNECTED.get() {
        g.set(i64::from(connected));
    }
}

#[inline]
pub fn set_queue_depth(depth: usize) {
    if let Some(g) = QUEUE_DEPTH.get() {
        g.set(depth as i64);
    }
}

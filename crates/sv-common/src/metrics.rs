//! Prometheus-compatible metrics for the core pipeline.
//!
//! Counters and gauges for the events an operator actually wants to graph:
//! notifications fired, cooloff suppressions, sampler failures, and queue
//! outcomes. The recorder itself (installed once at process start, in each
//! binary's `main`) is not this crate's concern — these functions are
//! no-ops until a recorder is installed.

use metrics::{counter, gauge};

/// A notification cleared the threshold and the cooloff gate, and was
/// handed to a sink.
pub fn record_notification_fired(signal: &str) {
    counter!("sv_notifications_fired_total", "signal" => signal.to_string()).increment(1);
}

/// A notification would have fired but the cooloff gate suppressed it.
pub fn record_cooloff_suppressed(signal: &str) {
    counter!("sv_cooloff_suppressed_total", "signal" => signal.to_string()).increment(1);
}

/// A built-in sampler failed this iteration (transient or fatal).
pub fn record_sampler_failure(signal: &str, kind: &str) {
    counter!(
        "sv_sampler_failures_total",
        "signal" => signal.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// A queued message was delivered to the Matrix backend.
pub fn record_queue_delivered() {
    counter!("sv_queue_delivered_total").increment(1);
}

/// A queued message failed delivery and was re-pushed with `attempts`
/// incremented.
pub fn record_queue_retried() {
    counter!("sv_queue_retried_total").increment(1);
}

/// A queued message was dropped without delivery.
pub fn record_queue_dropped(reason: &str) {
    counter!("sv_queue_dropped_total", "reason" => reason.to_string()).increment(1);
}

/// The queue's current depth, sampled once per worker iteration.
pub fn set_queue_depth(depth: usize) {
    gauge!("sv_queue_depth").set(depth as f64);
}

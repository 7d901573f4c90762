//! Message metrics helpers.

use std::sync::atomic::Ordering;

use super::EngineMetrics;

/// Record a frame received from a client
pub fn record_received(metrics: &EngineMetrics) {
    metrics.messages_received.fetch_add(1, Ordering::Relaxed);
}

/// Record deliveries queued to recipients
pub fn record_routed(metrics: &EngineMetrics, deliveries: usize) {
    metrics
        .messages_routed
        .fetch_add(deliveries as u64, Ordering::Relaxed);
}

/// Record a frame discarded by a full queue
pub fn record_dropped(metrics: &EngineMetrics) {
    metrics.messages_dropped.fetch_add(1, Ordering::Relaxed);
}

/// Record a claimed command
pub fn record_command(metrics: &EngineMetrics) {
    metrics.commands_executed.fetch_add(1, Ordering::Relaxed);
}

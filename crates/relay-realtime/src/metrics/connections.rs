//! Connection metrics helpers.

use std::sync::atomic::Ordering;

use super::EngineMetrics;

/// Record a new connection
pub fn record_connect(metrics: &EngineMetrics) {
    metrics.connections_accepted.fetch_add(1, Ordering::Relaxed);
    metrics.connections_active.fetch_add(1, Ordering::Relaxed);
}

/// Record a disconnection
pub fn record_disconnect(metrics: &EngineMetrics) {
    let _ = metrics
        .connections_active
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
}

/// Record a rejected credential
pub fn record_auth_failure(metrics: &EngineMetrics) {
    metrics.auth_failures.fetch_add(1, Ordering::Relaxed);
}

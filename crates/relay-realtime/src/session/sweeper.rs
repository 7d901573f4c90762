//! Background liveness sweep.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::manager::SessionManager;

/// Spawns the sweep loop. It runs every `sweep_interval_seconds` until
/// `cancel` fires.
pub fn spawn_sweeper(sessions: Arc<SessionManager>, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(sessions.sweep_interval());
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    sessions.sweep_at(Utc::now());
                }
            }
        }

        debug!("Session sweeper stopped");
    })
}

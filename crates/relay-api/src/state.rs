//! Application state shared across all handlers and middleware.

use relay_core::config::AppConfig;
use relay_realtime::RelayEngine;

/// Application state passed to every Axum handler via `State<AppState>`.
///
/// The engine is itself a bundle of `Arc`s, so cloning is cheap.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Relay engine: registry, sessions, router, plugins.
    pub engine: RelayEngine,
}

impl AppState {
    /// Wraps an engine.
    pub fn new(engine: RelayEngine) -> Self {
        Self { engine }
    }

    /// Effective configuration.
    pub fn config(&self) -> &AppConfig {
        self.engine.config()
    }
}

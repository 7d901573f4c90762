//! Top-level relay engine that ties together all subsystems.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use relay_auth::AuthMiddleware;
use relay_core::config::AppConfig;
use relay_core::AppResult;
use relay_core::types::SessionInfo;
use relay_plugin::api::PluginContext;
use relay_plugin::hooks::HookRegistry;
use relay_plugin::{
    CommandProcessor, FaultTracker, HookPipeline, LoadReport, Plugin, PluginInfo, PluginManager,
};

use crate::connection::{ConnectionRegistry, close_code};
use crate::metrics::{EngineMetrics, MetricsSnapshot};
use crate::router::MessageRouter;
use crate::session::{SessionManager, spawn_sweeper};

/// Admin view of the running engine.
#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    /// Present users.
    pub sessions: Vec<SessionInfo>,
    /// Registered connections, authenticated or not.
    pub connections: usize,
    /// Counters.
    pub metrics: MetricsSnapshot,
    /// Active plugins.
    pub plugins: Vec<PluginInfo>,
}

/// Central engine. Cheap to clone; every clone shares the same state.
///
/// Construction order is registry, sessions, hook pipeline, command
/// processor, router, then the plugin manager. `load_plugins` and `start`
/// follow; `shutdown` undoes them in reverse.
#[derive(Clone)]
pub struct RelayEngine {
    /// Live connections.
    pub registry: Arc<ConnectionRegistry>,
    /// Presence.
    pub sessions: Arc<SessionManager>,
    /// Credential checks.
    pub auth: Arc<AuthMiddleware>,
    /// Hook pipeline.
    pub hooks: Arc<HookPipeline>,
    /// Command processor.
    pub commands: Arc<CommandProcessor>,
    /// Plugin lifecycle.
    pub plugins: Arc<PluginManager>,
    /// Message router.
    pub router: Arc<MessageRouter>,
    /// Counters.
    pub metrics: Arc<EngineMetrics>,
    faults: Arc<FaultTracker>,
    shutdown: CancellationToken,
    sweeper: Arc<Mutex<Option<JoinHandle<()>>>>,
    config: Arc<AppConfig>,
}

impl std::fmt::Debug for RelayEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayEngine")
            .field("connections", &self.registry.count())
            .finish()
    }
}

impl RelayEngine {
    /// Creates an engine with no plugins and no background tasks.
    pub fn new(config: AppConfig) -> Self {
        let metrics = Arc::new(EngineMetrics::new());
        let registry = Arc::new(ConnectionRegistry::new(metrics.clone()));
        let sessions = Arc::new(SessionManager::new(registry.clone(), config.session.clone()));
        let auth = Arc::new(AuthMiddleware::new(&config.auth));

        let faults = Arc::new(FaultTracker::new(config.plugins.fault_threshold));
        let timeout = Duration::from_millis(config.plugins.hook_timeout_ms);
        let hooks = Arc::new(HookPipeline::new(
            Arc::new(HookRegistry::new()),
            faults.clone(),
            timeout,
        ));
        let commands = Arc::new(CommandProcessor::new(
            config.realtime.command_prefix.clone(),
            faults.clone(),
            timeout,
        ));

        let router = Arc::new(MessageRouter::new(
            registry.clone(),
            sessions.clone(),
            auth.clone(),
            hooks.clone(),
            commands.clone(),
            metrics.clone(),
            config.realtime.clone(),
        ));

        let context = PluginContext {
            sessions: sessions.clone(),
            commands: commands.clone(),
        };
        let plugins = Arc::new(PluginManager::new(hooks.clone(), commands.clone(), context));

        info!("Relay engine initialized");

        Self {
            registry,
            sessions,
            auth,
            hooks,
            commands,
            plugins,
            router,
            metrics,
            faults,
            shutdown: CancellationToken::new(),
            sweeper: Arc::new(Mutex::new(None)),
            config: Arc::new(config),
        }
    }

    /// Activates plugins in dependency order.
    pub async fn load_plugins(&self, plugins: Vec<Arc<dyn Plugin>>) -> AppResult<LoadReport> {
        let report = self.plugins.load_all(plugins).await?;
        info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            "Plugins loaded"
        );
        Ok(report)
    }

    /// Starts the liveness sweeper. Calling it twice has no effect.
    pub async fn start(&self) {
        let mut sweeper = self.sweeper.lock().await;
        if sweeper.is_none() {
            *sweeper = Some(spawn_sweeper(self.sessions.clone(), self.shutdown.child_token()));
            info!(
                interval_secs = self.config.session.sweep_interval_seconds,
                "Session sweeper started"
            );
        }
    }

    /// Stops the sweeper, closes every connection with 1001, and unloads
    /// plugins in reverse activation order.
    pub async fn shutdown(&self) {
        info!("Shutting down relay engine");
        self.shutdown.cancel();

        if let Some(task) = self.sweeper.lock().await.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Session sweeper ended abnormally");
            }
        }

        let open = self.registry.all();
        for handle in &open {
            self.router
                .disconnect(handle, close_code::GOING_AWAY, "Server shutting down")
                .await;
        }
        info!(count = open.len(), "All connections closed");

        self.plugins.shutdown_all().await;
        info!("Relay engine shut down");
    }

    /// Token cancelled when shutdown begins.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Snapshot for the admin status endpoint.
    pub async fn status(&self) -> SystemStatus {
        SystemStatus {
            sessions: self.sessions.list_online(),
            connections: self.registry.count(),
            metrics: self.metrics.snapshot(self.faults.total_faults()),
            plugins: self.plugins.list().await,
        }
    }

    /// Effective configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

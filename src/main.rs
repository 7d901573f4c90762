//! Relay Server — real-time WebSocket message relay
//!
//! Main entry point that wires all crates together and starts the server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use plugin_builtin::BuiltinPlugin;
use relay_api::{AppState, build_router};
use relay_core::config::AppConfig;
use relay_core::error::AppError;
use relay_plugin::Plugin;
use relay_realtime::RelayEngine;

#[tokio::main]
async fn main() {
    let env = std::env::var("RELAY_ENV").unwrap_or_else(|_| "development".to_string());
    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!(env = %env, "Configuration loaded");

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting relay v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Build the engine ─────────────────────────────────
    let addr = config.server.bind_address();
    let grace = Duration::from_secs(config.server.shutdown_timeout_seconds);
    let builtin_enabled = config.plugins.builtin_enabled;
    let engine = RelayEngine::new(config);

    // ── Step 2: Load plugins ─────────────────────────────────────
    let mut plugins: Vec<Arc<dyn Plugin>> = Vec::new();
    if builtin_enabled {
        plugins.push(Arc::new(BuiltinPlugin::new()));
    }
    let report = engine.load_plugins(plugins).await?;
    for (name, err) in &report.failed {
        tracing::warn!(plugin = %name, error = %err, "Plugin not loaded");
    }

    // ── Step 3: Start background tasks ───────────────────────────
    engine.start().await;

    // ── Step 4: Bind and serve ───────────────────────────────────
    let app = build_router(AppState::new(engine.clone()));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;
    tracing::info!("Relay server listening on {}", addr);

    let (shutdown_tx, mut serve_rx) = watch::channel(false);
    let server = tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = serve_rx.wait_for(|stop| *stop).await;
        })
        .await
    });

    shutdown_signal().await;
    tracing::info!("Shutdown signal received");
    let _ = shutdown_tx.send(true);

    // ── Step 5: Tear down in reverse ─────────────────────────────
    if tokio::time::timeout(grace, engine.shutdown()).await.is_err() {
        tracing::warn!(grace_secs = grace.as_secs(), "Engine shutdown timed out");
    }

    match tokio::time::timeout(grace, server).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => return Err(AppError::internal(format!("Server error: {e}"))),
        Ok(Err(e)) => return Err(AppError::internal(format!("Server task failed: {e}"))),
        Err(_) => tracing::warn!("HTTP server did not drain in time"),
    }

    tracing::info!("Relay server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

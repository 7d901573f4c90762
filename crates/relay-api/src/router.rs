//! Route definitions for the relay HTTP surface.
//!
//! REST routes are mounted under `/api`; the WebSocket endpoint is `/ws`.

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

/// Build the complete Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = middleware::cors::build_cors_layer(&state.config().server);

    let api_routes = Router::new()
        .merge(health_routes())
        .merge(admin_routes());

    Router::new()
        .nest("/api", api_routes)
        .route("/ws", get(handlers::ws::ws_upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(axum_middleware::from_fn(middleware::logging::request_logging))
        .with_state(state)
}

/// Liveness probe
fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health::health))
}

/// Admin status and moderation
fn admin_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/admin/system-status",
            get(handlers::admin::status::system_status),
        )
        .route("/admin/kick-user", post(handlers::admin::sessions::kick_user))
}

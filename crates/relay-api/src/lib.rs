//! # relay-api
//!
//! HTTP surface for the relay built on Axum.
//!
//! Provides the WebSocket upgrade at `/ws`, the health probe, admin
//! endpoints, CORS and request logging, and the `AppError` to HTTP mapping.

pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;

//! Custom Axum extractors.

pub mod auth;

pub use auth::{AdminClaim, bearer_token, cookie_token};

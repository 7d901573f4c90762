//! # relay-auth
//!
//! Authentication for relay connections.
//!
//! ## Modules
//!
//! - `jwt` — token claims, HS256 issuance, and verification
//! - `revocation` — in-memory revoked-token set
//! - `middleware` — the `authenticate` / `reverify` contract used by the router
//! - `error` — the `AuthError` taxonomy and its close reasons

pub mod error;
pub mod jwt;
pub mod middleware;
pub mod revocation;

pub use error::AuthError;
pub use jwt::{IssuedToken, JwtDecoder, JwtEncoder, TokenClaims};
pub use middleware::AuthMiddleware;
pub use revocation::RevocationList;

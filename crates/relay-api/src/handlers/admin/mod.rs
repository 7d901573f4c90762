//! Admin-only handlers. Every handler takes an [`AdminClaim`](crate::extractors::AdminClaim).

pub mod sessions;
pub mod status;

//! `AdminClaim` extractor and credential lookup helpers.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;

use relay_core::error::AppError;
use relay_core::types::Claim;

use crate::error::ApiError;
use crate::state::AppState;

/// Cookie carrying a browser client's token.
pub const AUTH_COOKIE: &str = "authToken";

/// Token from an `Authorization: Bearer` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Token from the `authToken` cookie.
pub fn cookie_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == AUTH_COOKIE)
        .map(|(_, value)| value)
        .filter(|t| !t.is_empty())
}

/// Verified claim of an admin caller.
#[derive(Debug, Clone)]
pub struct AdminClaim(pub Claim);

impl std::ops::Deref for AdminClaim {
    type Target = Claim;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequestParts<AppState> for AdminClaim {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| AppError::authentication("Missing Authorization header"))?;

        let claim = state.engine.auth.authenticate(token)?;
        if !claim.role.is_admin() {
            tracing::warn!(user_id = %claim.user_id, "Admin endpoint refused");
            return Err(AppError::authorization("Admin access required").into());
        }

        Ok(AdminClaim(claim))
    }
}

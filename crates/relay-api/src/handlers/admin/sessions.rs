//! Admin session management handlers.

use axum::Json;
use axum::extract::State;

use relay_core::error::AppError;
use relay_core::types::UserId;

use crate::dto::request::KickUserRequest;
use crate::dto::response::{ApiResponse, KickUserResponse};
use crate::error::ApiError;
use crate::extractors::AdminClaim;
use crate::state::AppState;

/// Reason used when the caller gives none.
const DEFAULT_KICK_REASON: &str = "removed by admin";

/// POST /api/admin/kick-user
pub async fn kick_user(
    State(state): State<AppState>,
    admin: AdminClaim,
    Json(req): Json<KickUserRequest>,
) -> Result<Json<ApiResponse<KickUserResponse>>, ApiError> {
    let target = UserId::from(req.user_id.trim());
    if target.is_blank() {
        return Err(AppError::validation("user_id is required").into());
    }
    let reason = req
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(DEFAULT_KICK_REASON);

    let closed = state.engine.sessions.force_disconnect(&target, reason);
    if closed == 0 {
        return Err(AppError::not_found(format!("User {target} is not online")).into());
    }

    tracing::info!(
        admin = %admin.user_id,
        target = %target,
        closed,
        reason,
        "User kicked via admin API"
    );

    Ok(Json(ApiResponse::ok(KickUserResponse {
        user_id: target.to_string(),
        closed,
    })))
}

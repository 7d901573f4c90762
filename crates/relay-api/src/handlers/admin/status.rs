//! System status handler.

use axum::Json;
use axum::extract::State;

use relay_realtime::SystemStatus;

use crate::dto::response::ApiResponse;
use crate::extractors::AdminClaim;
use crate::state::AppState;

/// GET /api/admin/system-status
pub async fn system_status(
    State(state): State<AppState>,
    _admin: AdminClaim,
) -> Json<ApiResponse<SystemStatus>> {
    Json(ApiResponse::ok(state.engine.status().await))
}

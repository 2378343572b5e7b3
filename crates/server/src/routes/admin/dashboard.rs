//! Dashboard figures.

use axum::extract::State;

use crate::db::dashboard;
use crate::middleware::RequireAdmin;
use crate::models::DashboardStats;
use crate::response::{ApiResponse, ApiResult};
use crate::state::AppState;

/// GET /admin/dashboard
///
/// # Errors
///
/// Returns 500 if a query fails.
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> ApiResult<DashboardStats> {
    Ok(ApiResponse::ok(dashboard::stats(state.pool()).await?))
}

use axum::extract::{Path, State};
use memverse_core::types::SubscriberId;
use memverse_scheduler::Dashboard;
use std::sync::Arc;

use super::{ApiError, ApiResponse};
use crate::app::AppState;

/// GET /users/{id}/dashboard
///
/// Resolves (and, when due, delivers) the subscriber's current verse.
/// Incomplete profiles and invalid paces come back as 422 with a message the
/// user can act on; every other failure is a generic 500.
pub async fn dashboard_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<SubscriberId>,
) -> Result<ApiResponse<Dashboard>, ApiError> {
    let dashboard = state.resolver.resolve(id).await?;
    Ok(ApiResponse::ok("Dashboard loaded", dashboard))
}

use axum::extract::{Query, State};
use memverse_core::types::Verse;
use serde::Deserialize;
use std::sync::Arc;

use super::{ApiError, ApiResponse};
use crate::app::AppState;

pub const DEFAULT_TRANSLATION: &str = "KJV";

#[derive(Debug, Deserialize)]
pub struct DailyQuery {
    pub translation: Option<String>,
}

/// GET /verses/daily?translation=KJV: a random verse for visitors.
/// Nothing is recorded against any subscriber.
pub async fn daily_verse(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DailyQuery>,
) -> Result<ApiResponse<Verse>, ApiError> {
    let translation = query
        .translation
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_TRANSLATION);
    let verse = state.store.random_verse(translation).await?;
    Ok(ApiResponse::ok("Verse of the day", verse))
}

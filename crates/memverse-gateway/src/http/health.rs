use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health: liveness check with sweep state and notification counters.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let sweep = *state.sweep_state.borrow();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
        "sweep": sweep,
        "notifications": state.notify_stats.snapshot(),
    }))
}

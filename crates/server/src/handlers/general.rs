use crate::state::AppState;
use axum::{extract::State, Json};
use serde_json::{json, Value};

/// Liveness probe.
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "status": "ok", "environment": state.config.environment }))
}

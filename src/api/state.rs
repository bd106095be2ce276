use axum::extract::State;
use axum::Json;

use super::AppState;
use crate::domain::ReconciliationState;
use crate::error::AppError;

pub async fn get_state(
    State(state): State<AppState>,
) -> Result<Json<ReconciliationState>, AppError> {
    state
        .runner
        .reconciler()
        .state()
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("reconciliation state not initialized".to_string()))
}

/// Administrative reset: the next cycle has to initialize again.
pub async fn reset_state(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.runner.reset().await?;
    Ok(Json(serde_json::json!({"status": "reset"})))
}

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AppState;
use crate::domain::ProfitEvent;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct ProfitsQuery {
    pub pending: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ProfitsResponse {
    pub events: Vec<ProfitEvent>,
}

pub async fn get_profits(
    Query(params): Query<ProfitsQuery>,
    State(state): State<AppState>,
) -> Result<Json<ProfitsResponse>, AppError> {
    let events = state
        .runner
        .reconciler()
        .profit_events(params.pending.unwrap_or(false))
        .await?;
    Ok(Json(ProfitsResponse { events }))
}

#[derive(Debug, Deserialize)]
pub struct WithdrawnRequest {
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct WithdrawnResponse {
    pub updated: u64,
}

pub async fn mark_withdrawn(
    State(state): State<AppState>,
    Json(body): Json<WithdrawnRequest>,
) -> Result<Json<WithdrawnResponse>, AppError> {
    if body.ids.is_empty() {
        return Err(AppError::BadRequest("ids must not be empty".to_string()));
    }
    let updated = state
        .runner
        .reconciler()
        .mark_fees_withdrawn(&body.ids)
        .await?;
    Ok(Json(WithdrawnResponse { updated }))
}

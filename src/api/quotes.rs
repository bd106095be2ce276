use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use super::AppState;
use crate::domain::{DecisionResult, InboundQuote, QuoteValue};
use crate::error::AppError;

/// Body of `POST /v1/quotes`.
///
/// Raw-unit values above `u64::MAX` must be sent as `{"raw": "<integer string>"}` or as a decimal
/// string in asset units; a bare JSON integer that large is rejected.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushQuoteRequest {
    pub value: QuoteValue,
    pub observed_at: i64,
    /// Seed state from this quote if none exists yet.
    #[serde(default)]
    pub initialize: bool,
}

pub async fn push_quote(
    State(state): State<AppState>,
    Json(body): Json<PushQuoteRequest>,
) -> Result<Json<DecisionResult>, AppError> {
    let initialize = body.initialize;
    let quote = InboundQuote {
        value: body.value,
        observed_at: body.observed_at,
    }
    .into_quote(state.asset_decimals)
    .map_err(|e| AppError::BadRequest(format!("Invalid quote value: {}", e)))?;

    if quote.value.is_negative() {
        return Err(AppError::BadRequest("NAV must not be negative".to_string()));
    }
    if quote.observed_at.as_secs() < 0 {
        return Err(AppError::BadRequest(
            "observedAt must be unix seconds".to_string(),
        ));
    }

    tracing::info!(
        nav = %quote.value.format_units(state.asset_decimals),
        observed_at = quote.observed_at.as_secs(),
        initialize,
        "Quote pushed"
    );
    let result = state.runner.run_pushed(&quote, initialize).await?;
    Ok(Json(result))
}

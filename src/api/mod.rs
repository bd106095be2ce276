pub mod health;
pub mod profits;
pub mod quotes;
pub mod state;

use crate::orchestration::CycleRunner;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<CycleRunner>,
    /// Used to scale pushed decimal-string quotes into ledger units.
    pub asset_decimals: u32,
}

impl AppState {
    pub fn new(runner: Arc<CycleRunner>, asset_decimals: u32) -> Self {
        Self {
            runner,
            asset_decimals,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/quotes", post(quotes::push_quote))
        .route(
            "/v1/state",
            get(state::get_state).delete(state::reset_state),
        )
        .route("/v1/profits", get(profits::get_profits))
        .route("/v1/profits/withdrawn", post(profits::mark_withdrawn))
        .layer(cors)
        .with_state(state)
}

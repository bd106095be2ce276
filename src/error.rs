use crate::domain::CommitReceipt;
use crate::ledger::LedgerError;
use crate::orchestration::EngineError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Bad gateway: {0}")]
    BadGateway(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    /// The ledger accepted the commit but the cycle's state was not saved.
    #[error("Internal server error: {message}")]
    Unpersisted {
        message: String,
        receipt: CommitReceipt,
    },
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Precondition(msg) => AppError::Conflict(msg),
            EngineError::Ledger(LedgerError::Unavailable(msg)) => AppError::Unavailable(msg),
            EngineError::Ledger(LedgerError::Rejected(msg)) => AppError::BadGateway(msg),
            EngineError::Persistence {
                receipt: Some(receipt),
                source,
            } => AppError::Unpersisted {
                message: format!("ledger commit confirmed but state not persisted: {}", source),
                receipt,
            },
            err @ (EngineError::Store(_) | EngineError::Persistence { receipt: None, .. }) => {
                AppError::Internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, receipt) = match self {
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg, None),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg, None),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg, None),
            AppError::Unpersisted { message, receipt } => {
                (StatusCode::INTERNAL_SERVER_ERROR, message, Some(receipt))
            }
        };

        let body = match receipt {
            Some(receipt) => Json(json!({
                "error": error_message,
                "commit": receipt,
            })),
            None => Json(json!({
                "error": error_message,
            })),
        };

        (status, body).into_response()
    }
}

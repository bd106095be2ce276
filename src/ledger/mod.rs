//! Ledger connector abstraction for the on-chain vault.

use crate::domain::{Amount, CommitDirection, CommitReceipt, CommitRequest};
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub mod gateway;
pub mod mock;

pub use gateway::LedgerGateway;
pub use mock::MockLedger;

/// Read and write access to the vault's recorded assets.
///
/// Implementations own their transport retry policy; callers never retry.
/// `apply_profit` / `apply_loss` receive a positive magnitude in `request.amount`.
#[async_trait]
pub trait LedgerConnector: Send + Sync + fmt::Debug {
    /// Assets currently recorded by the vault, in raw units.
    async fn current_assets(&self) -> Result<Amount, LedgerError>;

    /// Whether the vault refuses profit/loss reports.
    async fn is_halted(&self) -> Result<bool, LedgerError>;

    /// Report a profit (`reportProfits`).
    async fn apply_profit(&self, request: &CommitRequest) -> Result<CommitReceipt, LedgerError>;

    /// Report a loss (`reportLosses`).
    async fn apply_loss(&self, request: &CommitRequest) -> Result<CommitReceipt, LedgerError>;

    /// Decimals of the vault's underlying asset.
    async fn asset_decimals(&self) -> Result<u32, LedgerError>;
}

/// Dispatch a commit to the ledger operation matching its direction.
pub async fn apply_commit(
    ledger: &dyn LedgerConnector,
    request: &CommitRequest,
) -> Result<CommitReceipt, LedgerError> {
    match request.direction {
        CommitDirection::Profit => ledger.apply_profit(request).await,
        CommitDirection::Loss => ledger.apply_loss(request).await,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Transport-level failure: the ledger could not be reached.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
    /// The ledger was reached and refused the operation.
    #[error("ledger rejected: {0}")]
    Rejected(String),
}

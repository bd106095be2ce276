//! Ledger commit records and the per-cycle decision result.

use crate::domain::{Amount, ProfitEvent, ResultCode, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which ledger operation a signed amount maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitDirection {
    Profit,
    Loss,
}

impl CommitDirection {
    /// Direction for a non-zero signed amount.
    pub fn of(signed: Amount) -> Option<Self> {
        if signed.is_positive() {
            Some(CommitDirection::Profit)
        } else if signed.is_negative() {
            Some(CommitDirection::Loss)
        } else {
            None
        }
    }
}

impl fmt::Display for CommitDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitDirection::Profit => write!(f, "profit"),
            CommitDirection::Loss => write!(f, "loss"),
        }
    }
}

/// A single ledger write. `amount` is always a positive magnitude.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRequest {
    pub direction: CommitDirection,
    pub amount: Amount,
    /// Stable key for this cycle's write; lets the transport deduplicate retries.
    pub idempotency_key: String,
    pub memo: String,
}

/// Ledger acknowledgement of a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitReceipt {
    /// Chain-reported commit time.
    pub confirmed_at: Timestamp,
    /// Transaction hash or equivalent handle.
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResult {
    pub direction: CommitDirection,
    pub amount: Amount,
    pub receipt: CommitReceipt,
}

/// Result of one reconciliation cycle, returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionResult {
    /// `quote.value - currentAssets`.
    pub delta: Amount,
    /// Rounded to two decimal places.
    pub percentage_change: f64,
    pub commit_result: Option<CommitResult>,
    pub code: ResultCode,
    pub profit_event: Option<ProfitEvent>,
    pub new_high_water_mark: Option<Amount>,
}

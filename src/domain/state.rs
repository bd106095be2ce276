//! Persisted reconciliation records: the singleton state row and the profit ledger.

use crate::domain::{Amount, Quote, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The single "latest state" row carried from one cycle to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationState {
    pub previous_processed_value: Amount,
    pub previous_processed_observed_at: Timestamp,
    /// Chain time of the last committed write, [`Timestamp::NEVER`] if none.
    pub previous_commit_timestamp: Timestamp,
    /// `None` until the first fee event.
    pub high_water_mark: Option<Amount>,
}

impl ReconciliationState {
    /// First row, seeded from the first quote ever processed.
    pub fn seed(quote: &Quote) -> Self {
        Self {
            previous_processed_value: quote.value,
            previous_processed_observed_at: quote.observed_at,
            previous_commit_timestamp: Timestamp::NEVER,
            high_water_mark: None,
        }
    }

    /// Successor row that records `quote` as processed.
    ///
    /// `confirmed_at` is the chain time of this cycle's commit, if one happened.
    pub fn advance(
        &self,
        quote: &Quote,
        confirmed_at: Option<Timestamp>,
        high_water_mark: Option<Amount>,
    ) -> Self {
        Self {
            previous_processed_value: quote.value,
            previous_processed_observed_at: quote.observed_at,
            previous_commit_timestamp: confirmed_at.unwrap_or(self.previous_commit_timestamp),
            high_water_mark,
        }
    }
}

/// Fee split of a profit above the high-water mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitSplit {
    pub profit_total: Amount,
    pub profit_investors: Amount,
    pub profit_performance_fee: Amount,
}

/// Append-only profit ledger entry, one per fee-assessing cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitEvent {
    pub id: Uuid,
    pub observed_at: Timestamp,
    pub profit_total: Amount,
    pub profit_investors: Amount,
    pub profit_performance_fee: Amount,
    pub fee_withdrawn: bool,
    /// Set when the fee is marked as withdrawn.
    pub reconciliation_timestamp: Option<Timestamp>,
    /// Ledger reference of the commit that realized this profit.
    pub commit_reference: Option<String>,
}

impl ProfitEvent {
    pub fn new(observed_at: Timestamp, split: ProfitSplit, commit_reference: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            observed_at,
            profit_total: split.profit_total,
            profit_investors: split.profit_investors,
            profit_performance_fee: split.profit_performance_fee,
            fee_withdrawn: false,
            reconciliation_timestamp: None,
            commit_reference,
        }
    }

    /// `profit_total == profit_investors + profit_performance_fee`.
    pub fn is_conserved(&self) -> bool {
        self.profit_investors
            .checked_add(self.profit_performance_fee)
            .map(|sum| sum == self.profit_total)
            .unwrap_or(false)
    }
}

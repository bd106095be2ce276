//! Persistence seam for reconciliation state and the profit-event ledger.

use crate::domain::{ProfitEvent, ReconciliationState, Timestamp};
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("corrupt stored value: {0}")]
    Corrupt(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Durable home of the single [`ReconciliationState`] record and the append-only profit events.
#[async_trait]
pub trait StateStore: Send + Sync + fmt::Debug {
    /// Current state, or `None` before the first seed.
    async fn get(&self) -> Result<Option<ReconciliationState>, StoreError>;

    /// Replace the state record wholesale.
    async fn put(&self, state: &ReconciliationState) -> Result<(), StoreError>;

    async fn append_profit_event(&self, event: &ProfitEvent) -> Result<(), StoreError>;

    /// Remove the state record. Profit events are kept.
    async fn delete(&self) -> Result<(), StoreError>;

    /// Persist one cycle's outcome. Implementations backed by a transactional store override this
    /// so that the state and its event land together or not at all.
    async fn record_cycle(
        &self,
        state: &ReconciliationState,
        event: Option<&ProfitEvent>,
    ) -> Result<(), StoreError> {
        if let Some(event) = event {
            self.append_profit_event(event).await?;
        }
        self.put(state).await
    }

    /// Profit events in observation order, optionally only those whose fee is still owed.
    async fn list_profit_events(&self, pending_only: bool) -> Result<Vec<ProfitEvent>, StoreError>;

    /// Flag the given events' fees as withdrawn at `at`. Returns how many events changed;
    /// already-withdrawn and unknown ids are skipped.
    async fn mark_fees_withdrawn(&self, ids: &[Uuid], at: Timestamp) -> Result<u64, StoreError>;
}

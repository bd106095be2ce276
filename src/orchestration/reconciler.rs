//! Executes cycle plans against the ledger and the store.

use crate::db::{StateStore, StoreError};
use crate::domain::{
    Amount, CommitReceipt, CommitRequest, CommitResult, DecisionResult, ProfitEvent, Quote,
    ReconciliationState, ResultCode,
};
use crate::engine::{
    commit_key, plan_cycle, validate_quote, CyclePlan, EnginePolicy, LedgerSnapshot, PlanError,
};
use crate::ledger::{apply_commit, LedgerConnector, LedgerError};
use crate::orchestration::clock::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

const DEFAULT_MEMO: &str = "navrecon reconciliation";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("precondition failed: {0}")]
    Precondition(String),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// A read failed before anything was written.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A write failed. `receipt` is set when the ledger had already accepted this cycle's commit.
    #[error("failed to persist cycle: {source}")]
    Persistence {
        receipt: Option<CommitReceipt>,
        source: StoreError,
    },
}

impl From<PlanError> for EngineError {
    fn from(err: PlanError) -> Self {
        EngineError::Precondition(err.to_string())
    }
}

/// Applies one reconciliation cycle at a time.
///
/// Callers must not have two `run` calls in flight for the same vault; [`super::CycleRunner`]
/// enforces that.
#[derive(Debug, Clone)]
pub struct Reconciler {
    ledger: Arc<dyn LedgerConnector>,
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    policy: EnginePolicy,
    memo: String,
}

impl Reconciler {
    pub fn new(
        ledger: Arc<dyn LedgerConnector>,
        store: Arc<dyn StateStore>,
        clock: Arc<dyn Clock>,
        policy: EnginePolicy,
    ) -> Self {
        Self {
            ledger,
            store,
            clock,
            policy,
            memo: DEFAULT_MEMO.to_string(),
        }
    }

    /// Memo attached to every ledger commit.
    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    pub fn policy(&self) -> &EnginePolicy {
        &self.policy
    }

    pub async fn state(&self) -> Result<Option<ReconciliationState>, EngineError> {
        Ok(self.store.get().await?)
    }

    /// Run a cycle against existing state.
    ///
    /// # Errors
    /// [`EngineError::Precondition`] if the quote is negative, the state was never initialized or
    /// the ledger baseline is not positive; ledger errors unmodified; [`EngineError::Persistence`]
    /// if the outcome could not be stored.
    pub async fn run(&self, quote: &Quote) -> Result<DecisionResult, EngineError> {
        validate_quote(quote)?;
        let state = self.store.get().await?.ok_or_else(|| {
            EngineError::Precondition(
                "reconciliation state not found, it must be initialized first".to_string(),
            )
        })?;
        self.cycle(&state, quote).await
    }

    /// Seed state from `quote` if none exists, otherwise behave exactly like [`Self::run`].
    pub async fn initialize(&self, quote: &Quote) -> Result<DecisionResult, EngineError> {
        validate_quote(quote)?;
        if let Some(state) = self.store.get().await? {
            return self.cycle(&state, quote).await;
        }

        let state = ReconciliationState::seed(quote);
        self.store
            .put(&state)
            .await
            .map_err(|source| EngineError::Persistence {
                receipt: None,
                source,
            })?;
        info!(
            value = %quote.value,
            observed_at = %quote.observed_at,
            "reconciliation state seeded"
        );

        Ok(DecisionResult {
            delta: Amount::ZERO,
            percentage_change: 0.0,
            commit_result: None,
            code: ResultCode::DeltaZeroNoWrite,
            profit_event: None,
            new_high_water_mark: None,
        })
    }

    /// Drop the state row. The next cycle must initialize again.
    pub async fn reset(&self) -> Result<(), EngineError> {
        self.store
            .delete()
            .await
            .map_err(|source| EngineError::Persistence {
                receipt: None,
                source,
            })?;
        warn!("reconciliation state deleted");
        Ok(())
    }

    pub async fn profit_events(&self, pending_only: bool) -> Result<Vec<ProfitEvent>, EngineError> {
        Ok(self.store.list_profit_events(pending_only).await?)
    }

    /// Record that the fees of the given events have been withdrawn, stamped with the current
    /// time. Returns how many events changed.
    pub async fn mark_fees_withdrawn(&self, ids: &[Uuid]) -> Result<u64, EngineError> {
        let at = self.clock.now();
        let changed = self
            .store
            .mark_fees_withdrawn(ids, at)
            .await
            .map_err(|source| EngineError::Persistence {
                receipt: None,
                source,
            })?;
        info!(requested = ids.len(), changed, at = %at, "fees marked withdrawn");
        Ok(changed)
    }

    async fn cycle(
        &self,
        state: &ReconciliationState,
        quote: &Quote,
    ) -> Result<DecisionResult, EngineError> {
        if self.ledger.is_halted().await? {
            let plan = CyclePlan::halted(state);
            return self.finish(state, quote, plan, None).await;
        }

        let current_assets = self.ledger.current_assets().await?;
        let now = self.clock.now();
        let plan = plan_cycle(
            state,
            &LedgerSnapshot { current_assets },
            quote,
            now,
            &self.policy,
        )?;

        let commit_result = match plan.commit {
            Some(commit) => {
                let request = CommitRequest {
                    direction: commit.direction,
                    amount: commit.amount,
                    idempotency_key: commit_key(state, quote, &commit),
                    memo: self.memo.clone(),
                };
                let receipt = apply_commit(self.ledger.as_ref(), &request).await?;
                info!(
                    direction = %commit.direction,
                    amount = %commit.amount,
                    reference = %receipt.reference,
                    confirmed_at = %receipt.confirmed_at,
                    "ledger commit confirmed"
                );
                Some(CommitResult {
                    direction: commit.direction,
                    amount: commit.amount,
                    receipt,
                })
            }
            None => None,
        };

        self.finish(state, quote, plan, commit_result).await
    }

    async fn finish(
        &self,
        state: &ReconciliationState,
        quote: &Quote,
        plan: CyclePlan,
        commit_result: Option<CommitResult>,
    ) -> Result<DecisionResult, EngineError> {
        let profit_event = plan.profit.map(|split| {
            ProfitEvent::new(
                quote.observed_at,
                split,
                commit_result.as_ref().map(|c| c.receipt.reference.clone()),
            )
        });
        let next = plan.next_state(
            state,
            quote,
            commit_result.as_ref().map(|c| c.receipt.confirmed_at),
        );

        if let Err(source) = self.store.record_cycle(&next, profit_event.as_ref()).await {
            let receipt = commit_result.map(|c| c.receipt);
            match &receipt {
                Some(receipt) => error!(
                    reference = %receipt.reference,
                    confirmed_at = %receipt.confirmed_at,
                    code = %plan.code,
                    error = %source,
                    "ledger commit applied but cycle state was not persisted"
                ),
                None => warn!(code = %plan.code, error = %source, "failed to persist cycle state"),
            }
            return Err(EngineError::Persistence { receipt, source });
        }

        info!(
            code = %plan.code,
            delta = %plan.delta,
            percentage_change = plan.percentage_change,
            fee = ?profit_event.as_ref().map(|e| e.profit_performance_fee),
            "cycle complete: {}",
            plan.code.description()
        );

        Ok(DecisionResult {
            delta: plan.delta,
            percentage_change: plan.percentage_change,
            commit_result,
            code: plan.code,
            profit_event,
            new_high_water_mark: plan.new_high_water_mark,
        })
    }
}

//! Pure decision logic for a reconciliation cycle.
//!
//! Nothing in here performs I/O. Given the prior state, a ledger snapshot, a quote and the current
//! time, [`plan_cycle`] decides the result code, the ledger write (if any), the fee event (if any)
//! and the next high-water mark. The orchestration layer executes the plan.

use crate::domain::{
    Amount, CommitDirection, ProfitSplit, Quote, ReconciliationState, ResultCode, Timestamp,
};
use thiserror::Error;

pub mod delta;
pub mod trigger;
pub mod waterfall;

pub use delta::{compute_delta, percentage_change};
pub use trigger::TriggerPolicy;
pub use waterfall::{apply_waterfall, FeeRate, FeeRateError, Waterfall};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("ledger baseline assets must be positive, got {0}")]
    NonPositiveBaseline(Amount),
    #[error("quote value must not be negative, got {0}")]
    NegativeQuote(Amount),
    #[error("arithmetic overflow computing {0}")]
    Overflow(&'static str),
}

/// Thresholds and fee rate, fixed for the lifetime of an engine instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnginePolicy {
    pub trigger: TriggerPolicy,
    pub fee_rate: FeeRate,
}

/// Ledger values read at the start of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub current_assets: Amount,
}

/// A ledger write the cycle must perform. `amount` is a positive magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedCommit {
    pub direction: CommitDirection,
    pub amount: Amount,
}

/// Everything a cycle decided, before any side effect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CyclePlan {
    pub delta: Amount,
    pub percentage_change: f64,
    pub code: ResultCode,
    /// `None` when nothing is written, including a triggered cycle whose whole delta is fee.
    pub commit: Option<PlannedCommit>,
    pub profit: Option<ProfitSplit>,
    pub new_high_water_mark: Option<Amount>,
}

impl CyclePlan {
    /// Plan for a halted vault: record the quote, touch nothing else.
    pub fn halted(state: &ReconciliationState) -> Self {
        Self {
            delta: Amount::ZERO,
            percentage_change: 0.0,
            code: ResultCode::HaltedNoWrite,
            commit: None,
            profit: None,
            new_high_water_mark: state.high_water_mark,
        }
    }

    /// State row to persist once the plan has been executed.
    pub fn next_state(
        &self,
        prior: &ReconciliationState,
        quote: &Quote,
        confirmed_at: Option<Timestamp>,
    ) -> ReconciliationState {
        prior.advance(quote, confirmed_at, self.new_high_water_mark)
    }
}

/// Reject quotes no vault can hold.
pub fn validate_quote(quote: &Quote) -> Result<(), PlanError> {
    if quote.value.is_negative() {
        return Err(PlanError::NegativeQuote(quote.value));
    }
    Ok(())
}

/// Decide what this cycle does.
///
/// # Errors
/// [`PlanError::NegativeQuote`] for a quote below zero; [`PlanError::NonPositiveBaseline`] when
/// the ledger reports zero (or negative) assets, since no percentage can be computed against it;
/// [`PlanError::Overflow`] on amounts outside `i128`.
pub fn plan_cycle(
    state: &ReconciliationState,
    snapshot: &LedgerSnapshot,
    quote: &Quote,
    now: Timestamp,
    policy: &EnginePolicy,
) -> Result<CyclePlan, PlanError> {
    validate_quote(quote)?;
    let current_assets = snapshot.current_assets;
    let percentage_change = percentage_change(quote.value, current_assets)?;
    let delta = compute_delta(quote.value, current_assets)?;

    let code = policy.trigger.evaluate(
        delta,
        percentage_change,
        now,
        state.previous_commit_timestamp,
    );

    if !code.commits() {
        return Ok(CyclePlan {
            delta,
            percentage_change,
            code,
            commit: None,
            profit: None,
            new_high_water_mark: state.high_water_mark,
        });
    }

    let waterfall = apply_waterfall(
        delta,
        quote.value,
        current_assets,
        state.high_water_mark,
        &policy.fee_rate,
    )?;

    let commit = CommitDirection::of(waterfall.commit_amount).map(|direction| PlannedCommit {
        direction,
        amount: waterfall.commit_amount.abs(),
    });

    Ok(CyclePlan {
        delta,
        percentage_change,
        code,
        commit,
        profit: waterfall.profit,
        new_high_water_mark: waterfall.new_high_water_mark,
    })
}

/// Deterministic key for a cycle's ledger write.
///
/// Derived from the prior state, the quote and the planned write, so a transport retry of the same
/// cycle presents the same key while any later cycle presents a different one.
pub fn commit_key(state: &ReconciliationState, quote: &Quote, commit: &PlannedCommit) -> String {
    use sha2::{Digest, Sha256};

    fn hash_var(hasher: &mut Sha256, data: &str) {
        hasher.update((data.len() as u32).to_le_bytes());
        hasher.update(data.as_bytes());
    }

    let mut hasher = Sha256::new();
    hash_var(&mut hasher, &state.previous_processed_value.to_string());
    hasher.update(state.previous_processed_observed_at.as_secs().to_le_bytes());
    hasher.update(state.previous_commit_timestamp.as_secs().to_le_bytes());
    hash_var(&mut hasher, &quote.value.to_string());
    hasher.update(quote.observed_at.as_secs().to_le_bytes());
    hash_var(&mut hasher, &commit.direction.to_string());
    hash_var(&mut hasher, &commit.amount.to_string());

    let hash = hasher.finalize();
    format!("cycle:{}", hex::encode(&hash[..16]))
}

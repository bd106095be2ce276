use navrecon::db::{MemoryStore, StateStore};
use navrecon::domain::{
    Amount, CommitDirection, Decimal, Quote, ReconciliationState, ResultCode, Timestamp,
};
use navrecon::engine::{EnginePolicy, FeeRate, TriggerPolicy};
use navrecon::ledger::{LedgerError, MockLedger};
use navrecon::orchestration::{EngineError, FixedClock, Reconciler};
use std::sync::Arc;

const NOW: i64 = 10_000;
const CHAIN_TIME: i64 = 9_990;

struct Harness {
    ledger: Arc<MockLedger>,
    store: Arc<MemoryStore>,
    clock: Arc<FixedClock>,
    reconciler: Reconciler,
}

fn a(v: i128) -> Amount {
    Amount::new(v)
}

fn quote(value: i128) -> Quote {
    Quote::new(a(value), Timestamp::new(NOW - 5))
}

fn state(previous_commit: i64, hwm: Option<i128>) -> ReconciliationState {
    ReconciliationState {
        previous_processed_value: a(1_000_000),
        previous_processed_observed_at: Timestamp::new(9_000),
        previous_commit_timestamp: Timestamp::new(previous_commit),
        high_water_mark: hwm.map(a),
    }
}

fn harness(assets: i128, initial: Option<ReconciliationState>, fee_percent: &str) -> Harness {
    let ledger =
        Arc::new(MockLedger::new(a(assets)).with_chain_time(Timestamp::new(CHAIN_TIME)));
    let store = match initial {
        Some(s) => Arc::new(MemoryStore::new().with_state(s)),
        None => Arc::new(MemoryStore::new()),
    };
    let clock = Arc::new(FixedClock::new(Timestamp::new(NOW)));
    let policy = EnginePolicy {
        trigger: TriggerPolicy {
            threshold_percent: 1.0,
            threshold_period_seconds: 10,
        },
        fee_rate: FeeRate::from_percent(Decimal::from_str_canonical(fee_percent).unwrap())
            .unwrap(),
    };
    let reconciler = Reconciler::new(ledger.clone(), store.clone(), clock.clone(), policy);
    Harness {
        ledger,
        store,
        clock,
        reconciler,
    }
}

#[tokio::test]
async fn test_unchanged_nav_is_delta_zero() {
    let h = harness(1_000_000, Some(state(NOW - 5, None)), "20");
    let result = h.reconciler.run(&quote(1_000_000)).await.unwrap();

    assert_eq!(result.code, ResultCode::DeltaZeroNoWrite);
    assert_eq!(result.delta, Amount::ZERO);
    assert_eq!(result.percentage_change, 0.0);
    assert!(result.commit_result.is_none());
    assert!(h.ledger.commits().is_empty());
}

#[tokio::test]
async fn test_delta_zero_ignores_elapsed_time_and_hwm() {
    let h = harness(1_000_000, Some(state(0, Some(400_000))), "20");
    h.clock.advance(1_000_000);
    let result = h.reconciler.run(&quote(1_000_000)).await.unwrap();

    assert_eq!(result.code, ResultCode::DeltaZeroNoWrite);
    assert!(h.ledger.commits().is_empty());
    let stored = h.store.peek().unwrap();
    assert_eq!(stored.high_water_mark, Some(a(400_000)));
    assert_eq!(stored.previous_commit_timestamp, Timestamp::new(0));
}

#[tokio::test]
async fn test_one_percent_up_takes_fee() {
    let h = harness(1_000_000, Some(state(NOW - 5, None)), "20");
    let result = h.reconciler.run(&quote(1_010_000)).await.unwrap();

    assert_eq!(result.code, ResultCode::PercentageChangeThresholdReached);
    assert_eq!(result.delta, a(10_000));
    assert_eq!(result.percentage_change, 1.0);

    let commit = result.commit_result.expect("commit expected");
    assert_eq!(commit.direction, CommitDirection::Profit);
    assert_eq!(commit.amount, a(8_000));
    assert_eq!(commit.receipt.confirmed_at, Timestamp::new(CHAIN_TIME));

    let event = result.profit_event.expect("profit event expected");
    assert_eq!(event.profit_total, a(10_000));
    assert_eq!(event.profit_performance_fee, a(2_000));
    assert_eq!(event.profit_investors, a(8_000));
    assert!(event.is_conserved());
    assert!(!event.fee_withdrawn);
    assert_eq!(event.commit_reference.as_deref(), Some(commit.receipt.reference.as_str()));

    assert_eq!(result.new_high_water_mark, Some(a(1_008_000)));
    assert_eq!(h.ledger.assets(), a(1_008_000));

    let stored = h.store.peek().unwrap();
    assert_eq!(stored.previous_processed_value, a(1_010_000));
    assert_eq!(stored.previous_commit_timestamp, Timestamp::new(CHAIN_TIME));
    assert_eq!(stored.high_water_mark, Some(a(1_008_000)));
    assert_eq!(h.store.events(), vec![event]);
}

#[tokio::test]
async fn test_fee_floors_to_whole_units() {
    let h = harness(1_000_000, Some(state(NOW - 5, None)), "12.5");
    let result = h.reconciler.run(&quote(1_010_007)).await.unwrap();

    // floor(10_007 * 0.125) = 1_250
    let event = result.profit_event.unwrap();
    assert_eq!(event.profit_performance_fee, a(1_250));
    assert_eq!(event.profit_investors, a(8_757));
    assert_eq!(result.commit_result.unwrap().amount, a(8_757));
}

#[tokio::test]
async fn test_elapsed_time_triggers_commit() {
    let h = harness(1_000_000, Some(state(NOW - 11, None)), "0");
    let result = h.reconciler.run(&quote(1_005_000)).await.unwrap();

    assert_eq!(result.code, ResultCode::TimeSinceLastCommitThresholdReached);
    assert_eq!(result.percentage_change, 0.5);
    let commit = result.commit_result.unwrap();
    assert_eq!(commit.amount, a(5_000));
    assert_eq!(
        h.store.peek().unwrap().previous_commit_timestamp,
        Timestamp::new(CHAIN_TIME)
    );
}

#[tokio::test]
async fn test_elapsed_time_at_period_does_not_trigger() {
    let h = harness(1_000_000, Some(state(NOW - 10, Some(1_000_000))), "20");
    let result = h.reconciler.run(&quote(1_005_000)).await.unwrap();

    assert_eq!(result.code, ResultCode::NoTriggerNoWrite);
    assert!(result.commit_result.is_none());
    assert!(h.ledger.commits().is_empty());

    // Only the processed quote moves.
    let stored = h.store.peek().unwrap();
    assert_eq!(stored.previous_processed_value, a(1_005_000));
    assert_eq!(stored.previous_processed_observed_at, Timestamp::new(NOW - 5));
    assert_eq!(stored.previous_commit_timestamp, Timestamp::new(NOW - 10));
    assert_eq!(stored.high_water_mark, Some(a(1_000_000)));
}

#[tokio::test]
async fn test_halted_vault_records_quote_only() {
    let h = harness(1_000_000, Some(state(500, Some(1_100_000))), "20");
    h.ledger.set_halted(true);
    let result = h.reconciler.run(&quote(2_000_000)).await.unwrap();

    assert_eq!(result.code, ResultCode::HaltedNoWrite);
    assert_eq!(result.delta, Amount::ZERO);
    assert_eq!(result.percentage_change, 0.0);
    assert!(result.commit_result.is_none());
    assert!(result.profit_event.is_none());
    assert!(h.ledger.commits().is_empty());

    let stored = h.store.peek().unwrap();
    assert_eq!(stored.previous_processed_value, a(2_000_000));
    assert_eq!(stored.previous_commit_timestamp, Timestamp::new(500));
    assert_eq!(stored.high_water_mark, Some(a(1_100_000)));
}

#[tokio::test]
async fn test_recovery_below_hwm_commits_full_delta_without_fee() {
    let h = harness(900_000, Some(state(NOW - 5, Some(1_000_000))), "20");
    let result = h.reconciler.run(&quote(950_000)).await.unwrap();

    assert_eq!(result.code, ResultCode::PercentageChangeThresholdReached);
    assert_eq!(result.percentage_change, 5.56);
    assert_eq!(result.commit_result.unwrap().amount, a(50_000));
    assert!(result.profit_event.is_none());
    assert_eq!(result.new_high_water_mark, Some(a(1_000_000)));
    assert!(h.store.events().is_empty());
    assert_eq!(h.store.peek().unwrap().high_water_mark, Some(a(1_000_000)));
}

#[tokio::test]
async fn test_loss_commits_magnitude_and_keeps_hwm() {
    let h = harness(1_000_000, Some(state(NOW - 5, Some(1_000_000))), "20");
    let result = h.reconciler.run(&quote(980_000)).await.unwrap();

    assert_eq!(result.code, ResultCode::PercentageChangeThresholdReached);
    assert_eq!(result.delta, a(-20_000));
    assert_eq!(result.percentage_change, -2.0);
    let commit = result.commit_result.unwrap();
    assert_eq!(commit.direction, CommitDirection::Loss);
    assert_eq!(commit.amount, a(20_000));
    assert!(result.profit_event.is_none());
    assert_eq!(h.ledger.assets(), a(980_000));
    assert_eq!(h.store.peek().unwrap().high_water_mark, Some(a(1_000_000)));
}

#[tokio::test]
async fn test_whole_delta_as_fee_skips_ledger_write() {
    // HWM sits far below the ledger baseline, so the fee exceeds the delta and is capped.
    let h = harness(1_000_000, Some(state(NOW - 5, Some(500_000))), "100");
    let result = h.reconciler.run(&quote(1_010_000)).await.unwrap();

    assert_eq!(result.code, ResultCode::PercentageChangeThresholdReached);
    assert!(result.commit_result.is_none());
    assert!(h.ledger.commits().is_empty());

    let event = result.profit_event.unwrap();
    assert_eq!(event.profit_total, a(510_000));
    assert_eq!(event.profit_performance_fee, a(10_000));
    assert!(event.is_conserved());
    assert!(event.commit_reference.is_none());

    let stored = h.store.peek().unwrap();
    assert_eq!(stored.high_water_mark, Some(a(1_000_000)));
    assert_eq!(stored.previous_commit_timestamp, Timestamp::new(NOW - 5));
}

#[tokio::test]
async fn test_hwm_never_decreases_across_cycles() {
    let h = harness(1_000_000, Some(state(NOW - 5, None)), "20");
    let navs = [1_020_000, 990_000, 1_015_000, 1_030_000, 1_030_000, 1_000_000, 1_050_000];

    let mut previous_hwm: Option<Amount> = None;
    for nav in navs {
        h.clock.advance(1);
        let result = h.reconciler.run(&quote(nav)).await.unwrap();
        let hwm = h.store.peek().unwrap().high_water_mark;
        if let (Some(before), Some(after)) = (previous_hwm, hwm) {
            assert!(after >= before, "hwm fell from {} to {}", before, after);
        }
        if previous_hwm.is_some() {
            assert!(hwm.is_some());
        }
        if hwm != previous_hwm {
            assert!(result.profit_event.is_some(), "hwm moved without a fee event");
        }
        previous_hwm = hwm;
    }

    for event in h.store.events() {
        assert!(event.is_conserved());
    }
}

#[tokio::test]
async fn test_run_without_state_fails_without_side_effects() {
    let h = harness(1_000_000, None, "20");
    let err = h.reconciler.run(&quote(1_100_000)).await.unwrap_err();
    assert!(matches!(err, EngineError::Precondition(_)));
    assert!(h.store.peek().is_none());
    assert!(h.ledger.commits().is_empty());
}

#[tokio::test]
async fn test_zero_baseline_is_precondition_error() {
    let initial = state(NOW - 5, None);
    let h = harness(0, Some(initial), "20");
    let err = h.reconciler.run(&quote(1_000)).await.unwrap_err();
    assert!(matches!(err, EngineError::Precondition(_)));
    assert_eq!(h.store.peek(), Some(initial));
}

#[tokio::test]
async fn test_negative_quote_fails_without_side_effects() {
    let initial = state(NOW - 5, None);
    let h = harness(1_000_000, Some(initial), "20");
    let err = h.reconciler.run(&quote(-5)).await.unwrap_err();
    assert!(matches!(err, EngineError::Precondition(_)));
    assert_eq!(h.store.peek(), Some(initial));
    assert!(h.store.events().is_empty());
    assert!(h.ledger.commits().is_empty());
    assert_eq!(h.ledger.assets(), a(1_000_000));

    let fresh = harness(1_000_000, None, "20");
    let err = fresh.reconciler.initialize(&quote(-5)).await.unwrap_err();
    assert!(matches!(err, EngineError::Precondition(_)));
    assert!(fresh.store.peek().is_none());
}

#[tokio::test]
async fn test_ledger_unavailable_leaves_store_untouched() {
    let initial = state(NOW - 5, None);
    let h = harness(1_000_000, Some(initial), "20");
    h.ledger.set_unavailable(true);
    let err = h.reconciler.run(&quote(1_100_000)).await.unwrap_err();
    assert!(matches!(err, EngineError::Ledger(LedgerError::Unavailable(_))));
    assert_eq!(h.store.peek(), Some(initial));
}

#[tokio::test]
async fn test_ledger_rejection_leaves_store_untouched() {
    let initial = state(NOW - 5, None);
    let h = harness(1_000_000, Some(initial), "20");
    h.ledger.set_reject_commits(true);
    let err = h.reconciler.run(&quote(1_100_000)).await.unwrap_err();
    assert!(matches!(err, EngineError::Ledger(LedgerError::Rejected(_))));
    assert_eq!(h.store.peek(), Some(initial));
    assert!(h.store.events().is_empty());
    assert_eq!(h.ledger.assets(), a(1_000_000));
}

#[tokio::test]
async fn test_persistence_failure_after_commit_self_heals() {
    let initial = state(NOW - 5, None);
    let h = harness(1_000_000, Some(initial), "0");
    h.store.set_fail_writes(true);

    let err = h.reconciler.run(&quote(1_020_000)).await.unwrap_err();
    match err {
        EngineError::Persistence { receipt, .. } => {
            let receipt = receipt.expect("receipt of the applied commit");
            assert_eq!(receipt.confirmed_at, Timestamp::new(CHAIN_TIME));
        }
        other => panic!("expected persistence error, got {:?}", other),
    }
    assert_eq!(h.ledger.assets(), a(1_020_000));
    assert_eq!(h.store.peek(), Some(initial));

    // Next cycle measures against the moved ledger and does not commit again.
    h.store.set_fail_writes(false);
    let result = h.reconciler.run(&quote(1_020_000)).await.unwrap();
    assert_eq!(result.code, ResultCode::DeltaZeroNoWrite);
    assert_eq!(h.ledger.commits().len(), 1);
    assert_eq!(
        h.store.peek().unwrap().previous_processed_value,
        a(1_020_000)
    );
}

#[tokio::test]
async fn test_initialize_seeds_then_runs() {
    let h = harness(1_000_000, None, "20");
    let seeded = h.reconciler.initialize(&quote(1_000_000)).await.unwrap();
    assert_eq!(seeded.code, ResultCode::DeltaZeroNoWrite);
    let stored = h.store.get().await.unwrap().unwrap();
    assert_eq!(stored.previous_commit_timestamp, Timestamp::NEVER);
    assert_eq!(stored.high_water_mark, None);

    // With state present, initialize is an ordinary cycle.
    let result = h.reconciler.initialize(&quote(1_050_000)).await.unwrap();
    assert_eq!(result.code, ResultCode::PercentageChangeThresholdReached);
    assert_eq!(h.ledger.commits().len(), 1);
}

#[tokio::test]
async fn test_reset_requires_initialize_again() {
    let h = harness(1_000_000, Some(state(NOW - 5, None)), "20");
    h.reconciler.reset().await.unwrap();
    assert!(h.store.peek().is_none());
    assert!(matches!(
        h.reconciler.run(&quote(1_000_000)).await,
        Err(EngineError::Precondition(_))
    ));
}

#[tokio::test]
async fn test_fee_withdrawal_marks_events() {
    let h = harness(1_000_000, Some(state(NOW - 5, None)), "20");
    let result = h.reconciler.run(&quote(1_010_000)).await.unwrap();
    let event = result.profit_event.unwrap();

    assert_eq!(h.reconciler.profit_events(true).await.unwrap().len(), 1);
    assert_eq!(h.reconciler.mark_fees_withdrawn(&[event.id]).await.unwrap(), 1);
    assert!(h.reconciler.profit_events(true).await.unwrap().is_empty());

    let all = h.reconciler.profit_events(false).await.unwrap();
    assert!(all[0].fee_withdrawn);
    assert_eq!(all[0].reconciliation_timestamp, Some(Timestamp::new(NOW)));
}

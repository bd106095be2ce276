use navrecon::datasource::MockQuoteSource;
use navrecon::db::MemoryStore;
use navrecon::domain::{Amount, Quote, ReconciliationState, ResultCode, Timestamp};
use navrecon::engine::{EnginePolicy, FeeRate, TriggerPolicy};
use navrecon::ledger::MockLedger;
use navrecon::orchestration::{run_pull_loop, CycleRunner, FixedClock, Reconciler, TickOutcome};
use std::sync::Arc;
use std::time::Duration;

const NOW: i64 = 50_000;

fn quote(value: i128) -> Quote {
    Quote::new(Amount::new(value), Timestamp::new(NOW))
}

fn runner(ledger: Arc<MockLedger>, store: Arc<MemoryStore>) -> Arc<CycleRunner> {
    let reconciler = Reconciler::new(
        ledger,
        store,
        Arc::new(FixedClock::new(Timestamp::new(NOW))),
        EnginePolicy {
            trigger: TriggerPolicy {
                threshold_percent: 1.0,
                threshold_period_seconds: 3_600,
            },
            fee_rate: FeeRate::zero(),
        },
    );
    Arc::new(CycleRunner::new(Arc::new(reconciler)))
}

fn seeded_store() -> Arc<MemoryStore> {
    let mut state = ReconciliationState::seed(&quote(1_000_000));
    state.previous_commit_timestamp = Timestamp::new(NOW - 1);
    Arc::new(MemoryStore::new().with_state(state))
}

#[tokio::test]
async fn test_pull_tick_skipped_while_push_in_flight() {
    let ledger = Arc::new(
        MockLedger::new(Amount::new(1_000_000)).with_latency(Duration::from_millis(200)),
    );
    let runner = runner(ledger.clone(), seeded_store());

    let pushing = {
        let runner = runner.clone();
        tokio::spawn(async move { runner.run_pushed(&quote(1_050_000), false).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let source = MockQuoteSource::new().with_quote(quote(1_100_000));
    assert_eq!(runner.tick(&source).await.unwrap(), TickOutcome::Skipped);

    let result = pushing.await.unwrap().unwrap();
    assert_eq!(result.code, ResultCode::PercentageChangeThresholdReached);
    assert_eq!(ledger.commits().len(), 1);
    assert_eq!(ledger.assets(), Amount::new(1_050_000));
}

#[tokio::test]
async fn test_concurrent_pushes_are_serialized() {
    let ledger = Arc::new(
        MockLedger::new(Amount::new(1_000_000)).with_latency(Duration::from_millis(20)),
    );
    let runner = runner(ledger.clone(), seeded_store());

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let runner = runner.clone();
            tokio::spawn(async move { runner.run_pushed(&quote(1_050_000), false).await })
        })
        .collect();

    let mut codes = Vec::new();
    for handle in handles {
        codes.push(handle.await.unwrap().unwrap().code);
    }

    // The second cycle sees the ledger the first one moved.
    assert!(codes.contains(&ResultCode::PercentageChangeThresholdReached));
    assert!(codes.contains(&ResultCode::DeltaZeroNoWrite));
    assert_eq!(ledger.commits().len(), 1);
    assert_eq!(ledger.assets(), Amount::new(1_050_000));
}

#[tokio::test]
async fn test_pull_loop_runs_until_shutdown() {
    let ledger = Arc::new(MockLedger::new(Amount::new(1_000_000)));
    let store = Arc::new(MemoryStore::new());
    let runner = runner(ledger.clone(), store.clone());
    let source = Arc::new(
        MockQuoteSource::new()
            .with_quote(quote(1_000_000))
            .with_quote(quote(1_020_000)),
    );

    let seeded = runner.bootstrap(source.as_ref()).await.unwrap();
    assert_eq!(seeded.code, ResultCode::DeltaZeroNoWrite);

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let handle = tokio::spawn(run_pull_loop(
        runner.clone(),
        source,
        Duration::from_millis(20),
        async move {
            let _ = stop_rx.await;
        },
    ));

    tokio::time::sleep(Duration::from_millis(150)).await;
    stop_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("pull loop did not stop")
        .unwrap();

    // First tick commits, later ticks see no delta.
    assert_eq!(ledger.commits().len(), 1);
    assert_eq!(ledger.assets(), Amount::new(1_020_000));
    assert_eq!(
        store.peek().unwrap().previous_processed_value,
        Amount::new(1_020_000)
    );
}

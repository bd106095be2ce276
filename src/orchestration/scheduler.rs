//! Single-flight cycle scheduling for pull and push callers.

use crate::datasource::{QuoteSource, QuoteSourceError};
use crate::domain::{DecisionResult, Quote};
use crate::orchestration::reconciler::{EngineError, Reconciler};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("quote source failed: {0}")]
    Source(#[from] QuoteSourceError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Completed(DecisionResult),
    /// Another cycle held the gate.
    Skipped,
}

/// Owns the single-flight gate around a [`Reconciler`].
///
/// Pushed quotes queue behind a running cycle. Pull ticks that find the gate busy are dropped.
#[derive(Debug)]
pub struct CycleRunner {
    reconciler: Arc<Reconciler>,
    gate: Mutex<()>,
}

impl CycleRunner {
    pub fn new(reconciler: Arc<Reconciler>) -> Self {
        Self {
            reconciler,
            gate: Mutex::new(()),
        }
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    /// Process a pushed quote, waiting for any running cycle first.
    pub async fn run_pushed(
        &self,
        quote: &Quote,
        initialize: bool,
    ) -> Result<DecisionResult, EngineError> {
        let _guard = self.gate.lock().await;
        if initialize {
            self.reconciler.initialize(quote).await
        } else {
            self.reconciler.run(quote).await
        }
    }

    /// Administrative reset, serialized with cycles.
    pub async fn reset(&self) -> Result<(), EngineError> {
        let _guard = self.gate.lock().await;
        self.reconciler.reset().await
    }

    /// One pull tick: fetch a quote and run a cycle, unless a cycle is already running.
    pub async fn tick(&self, source: &dyn QuoteSource) -> Result<TickOutcome, SchedulerError> {
        let Ok(_guard) = self.gate.try_lock() else {
            warn!("previous cycle still in flight, skipping tick");
            return Ok(TickOutcome::Skipped);
        };
        let quote = source.fetch_quote().await?;
        let result = self.reconciler.run(&quote).await?;
        Ok(TickOutcome::Completed(result))
    }

    /// Pull-mode startup: fetch the first quote and initialize from it.
    pub async fn bootstrap(&self, source: &dyn QuoteSource) -> Result<DecisionResult, SchedulerError> {
        let _guard = self.gate.lock().await;
        let quote = source.fetch_quote().await?;
        Ok(self.reconciler.initialize(&quote).await?)
    }
}

/// Drive `runner` from `source` every `period` until `shutdown` resolves.
///
/// A cycle in progress when shutdown fires is allowed to finish.
pub async fn run_pull_loop<F>(
    runner: Arc<CycleRunner>,
    source: Arc<dyn QuoteSource>,
    period: Duration,
    shutdown: F,
) where
    F: Future<Output = ()>,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    info!(period_secs = period.as_secs(), "pull loop started");
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = interval.tick() => {
                match runner.tick(source.as_ref()).await {
                    Ok(TickOutcome::Completed(result)) => {
                        info!(code = %result.code, delta = %result.delta, "pull cycle finished");
                    }
                    Ok(TickOutcome::Skipped) => {}
                    Err(SchedulerError::Source(e)) => warn!(error = %e, "quote fetch failed"),
                    Err(e) => error!(error = %e, "pull cycle failed"),
                }
            }
        }
    }
    info!("pull loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::MockQuoteSource;
    use crate::db::MemoryStore;
    use crate::domain::{Amount, ResultCode, Timestamp};
    use crate::engine::{EnginePolicy, FeeRate, TriggerPolicy};
    use crate::ledger::MockLedger;
    use crate::orchestration::clock::FixedClock;

    fn runner(ledger: Arc<MockLedger>, store: Arc<MemoryStore>) -> CycleRunner {
        let reconciler = Reconciler::new(
            ledger,
            store,
            Arc::new(FixedClock::new(Timestamp::new(1_000))),
            EnginePolicy {
                trigger: TriggerPolicy {
                    threshold_percent: 1.0,
                    threshold_period_seconds: 3_600,
                },
                fee_rate: FeeRate::zero(),
            },
        );
        CycleRunner::new(Arc::new(reconciler))
    }

    fn quote(value: i128) -> Quote {
        Quote::new(Amount::new(value), Timestamp::new(900))
    }

    #[tokio::test]
    async fn test_bootstrap_then_tick() {
        let ledger = Arc::new(MockLedger::new(Amount::new(1_000)));
        let store = Arc::new(MemoryStore::new());
        let runner = runner(ledger.clone(), store.clone());
        let source = MockQuoteSource::new()
            .with_quote(quote(1_000))
            .with_quote(quote(1_050));

        let seeded = runner.bootstrap(&source).await.unwrap();
        assert_eq!(seeded.code, ResultCode::DeltaZeroNoWrite);
        assert!(store.peek().is_some());

        let outcome = runner.tick(&source).await.unwrap();
        match outcome {
            TickOutcome::Completed(result) => {
                assert_eq!(result.code, ResultCode::PercentageChangeThresholdReached);
            }
            TickOutcome::Skipped => panic!("tick should have run"),
        }
        assert_eq!(ledger.assets(), Amount::new(1_050));
    }

    #[tokio::test]
    async fn test_tick_is_skipped_while_gate_held() {
        let ledger = Arc::new(MockLedger::new(Amount::new(1_000)));
        let store = Arc::new(MemoryStore::new());
        let runner = runner(ledger, store);
        let source = MockQuoteSource::new().with_quote(quote(1_000));

        let _held = runner.gate.lock().await;
        assert_eq!(runner.tick(&source).await.unwrap(), TickOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_tick_surfaces_source_error() {
        let ledger = Arc::new(MockLedger::new(Amount::new(1_000)));
        let store = Arc::new(MemoryStore::new());
        let runner = runner(ledger, store);
        let source = MockQuoteSource::new();
        assert!(matches!(
            runner.tick(&source).await,
            Err(SchedulerError::Source(QuoteSourceError::Empty))
        ));
    }
}

//! In-memory state store for tests and dry runs.

use super::store::{StateStore, StoreError};
use crate::domain::{ProfitEvent, ReconciliationState, Timestamp};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Non-durable [`StateStore`] with switches to simulate a failing backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    state: Option<ReconciliationState>,
    events: Vec<ProfitEvent>,
    fail_writes: bool,
    fail_reads: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(self, state: ReconciliationState) -> Self {
        self.lock().state = Some(state);
        self
    }

    /// Make every write fail with [`StoreError::Unavailable`].
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Make every read fail with [`StoreError::Unavailable`].
    pub fn set_fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    /// Snapshot of the stored state, bypassing failure injection.
    pub fn peek(&self) -> Option<ReconciliationState> {
        self.lock().state
    }

    /// Snapshot of the stored events, bypassing failure injection.
    pub fn events(&self) -> Vec<ProfitEvent> {
        self.lock().events.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Inner {
    fn check_read(&self) -> Result<(), StoreError> {
        if self.fail_reads {
            return Err(StoreError::Unavailable("memory store reads disabled".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Unavailable("memory store writes disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self) -> Result<Option<ReconciliationState>, StoreError> {
        let inner = self.lock();
        inner.check_read()?;
        Ok(inner.state)
    }

    async fn put(&self, state: &ReconciliationState) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.check_write()?;
        inner.state = Some(*state);
        Ok(())
    }

    async fn append_profit_event(&self, event: &ProfitEvent) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.check_write()?;
        if inner.events.iter().any(|e| e.id == event.id) {
            return Err(StoreError::Corrupt(format!("duplicate profit event {}", event.id)));
        }
        inner.events.push(event.clone());
        Ok(())
    }

    async fn delete(&self) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.check_write()?;
        inner.state = None;
        Ok(())
    }

    async fn record_cycle(
        &self,
        state: &ReconciliationState,
        event: Option<&ProfitEvent>,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.check_write()?;
        if let Some(event) = event {
            if inner.events.iter().any(|e| e.id == event.id) {
                return Err(StoreError::Corrupt(format!("duplicate profit event {}", event.id)));
            }
            inner.events.push(event.clone());
        }
        inner.state = Some(*state);
        Ok(())
    }

    async fn list_profit_events(&self, pending_only: bool) -> Result<Vec<ProfitEvent>, StoreError> {
        let inner = self.lock();
        inner.check_read()?;
        let mut events: Vec<ProfitEvent> = inner
            .events
            .iter()
            .filter(|e| !pending_only || !e.fee_withdrawn)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.observed_at);
        Ok(events)
    }

    async fn mark_fees_withdrawn(&self, ids: &[Uuid], at: Timestamp) -> Result<u64, StoreError> {
        let mut inner = self.lock();
        inner.check_write()?;
        let mut changed = 0;
        for event in inner.events.iter_mut() {
            if ids.contains(&event.id) && !event.fee_withdrawn {
                event.fee_withdrawn = true;
                event.reconciliation_timestamp = Some(at);
                changed += 1;
            }
        }
        Ok(changed)
    }
}

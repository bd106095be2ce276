//! In-memory ledger for testing without a chain.

use super::{LedgerConnector, LedgerError};
use crate::domain::{Amount, CommitDirection, CommitReceipt, CommitRequest, Timestamp};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Vault simulation that applies commits to an in-memory asset balance.
///
/// Commits are deduplicated by idempotency key: a repeated key returns the original receipt
/// without moving the balance again.
#[derive(Debug)]
pub struct MockLedger {
    inner: Mutex<Inner>,
    latency: Option<Duration>,
}

#[derive(Debug)]
struct Inner {
    assets: Amount,
    halted: bool,
    asset_decimals: u32,
    chain_time: Timestamp,
    unavailable: bool,
    reject_commits: bool,
    commits: Vec<CommitRequest>,
    receipts: HashMap<String, CommitReceipt>,
}

impl MockLedger {
    pub fn new(assets: Amount) -> Self {
        Self {
            inner: Mutex::new(Inner {
                assets,
                halted: false,
                asset_decimals: 18,
                chain_time: Timestamp::new(1),
                unavailable: false,
                reject_commits: false,
                commits: Vec::new(),
                receipts: HashMap::new(),
            }),
            latency: None,
        }
    }

    pub fn with_halted(self, halted: bool) -> Self {
        self.lock().halted = halted;
        self
    }

    pub fn with_asset_decimals(self, decimals: u32) -> Self {
        self.lock().asset_decimals = decimals;
        self
    }

    /// Chain time stamped on the next confirmations.
    pub fn with_chain_time(self, at: Timestamp) -> Self {
        self.lock().chain_time = at;
        self
    }

    /// Delay every call, to exercise overlapping cycles.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn set_assets(&self, assets: Amount) {
        self.lock().assets = assets;
    }

    pub fn set_halted(&self, halted: bool) {
        self.lock().halted = halted;
    }

    pub fn set_chain_time(&self, at: Timestamp) {
        self.lock().chain_time = at;
    }

    /// Make every call fail with [`LedgerError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Make commits fail with [`LedgerError::Rejected`]; reads keep working.
    pub fn set_reject_commits(&self, reject: bool) {
        self.lock().reject_commits = reject;
    }

    pub fn assets(&self) -> Amount {
        self.lock().assets
    }

    /// Commits that moved the balance, in order.
    pub fn commits(&self) -> Vec<CommitRequest> {
        self.lock().commits.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    async fn apply(
        &self,
        request: &CommitRequest,
        direction: CommitDirection,
    ) -> Result<CommitReceipt, LedgerError> {
        self.delay().await;
        let mut inner = self.lock();
        if inner.unavailable {
            return Err(LedgerError::Unavailable("mock ledger offline".to_string()));
        }
        if let Some(receipt) = inner.receipts.get(&request.idempotency_key) {
            return Ok(receipt.clone());
        }
        if inner.halted {
            return Err(LedgerError::Rejected("vault is halted".to_string()));
        }
        if inner.reject_commits {
            return Err(LedgerError::Rejected("commit refused".to_string()));
        }
        if !request.amount.is_positive() {
            return Err(LedgerError::Rejected(format!(
                "amount must be positive, got {}",
                request.amount
            )));
        }

        let signed = match direction {
            CommitDirection::Profit => request.amount,
            CommitDirection::Loss => Amount::new(-request.amount.raw()),
        };
        inner.assets = inner
            .assets
            .checked_add(signed)
            .ok_or_else(|| LedgerError::Rejected("asset overflow".to_string()))?;

        let receipt = CommitReceipt {
            confirmed_at: inner.chain_time,
            reference: format!("0xmock{:04}", inner.commits.len() + 1),
        };
        inner.commits.push(request.clone());
        inner
            .receipts
            .insert(request.idempotency_key.clone(), receipt.clone());
        Ok(receipt)
    }

    fn check_available(inner: &Inner) -> Result<(), LedgerError> {
        if inner.unavailable {
            Err(LedgerError::Unavailable("mock ledger offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl LedgerConnector for MockLedger {
    async fn current_assets(&self) -> Result<Amount, LedgerError> {
        self.delay().await;
        let inner = self.lock();
        Self::check_available(&inner)?;
        Ok(inner.assets)
    }

    async fn is_halted(&self) -> Result<bool, LedgerError> {
        self.delay().await;
        let inner = self.lock();
        Self::check_available(&inner)?;
        Ok(inner.halted)
    }

    async fn apply_profit(&self, request: &CommitRequest) -> Result<CommitReceipt, LedgerError> {
        self.apply(request, CommitDirection::Profit).await
    }

    async fn apply_loss(&self, request: &CommitRequest) -> Result<CommitReceipt, LedgerError> {
        self.apply(request, CommitDirection::Loss).await
    }

    async fn asset_decimals(&self) -> Result<u32, LedgerError> {
        let inner = self.lock();
        Self::check_available(&inner)?;
        Ok(inner.asset_decimals)
    }
}

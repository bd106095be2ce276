pub mod api;
pub mod config;
pub mod datasource;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod orchestration;

pub use config::{Config, OperationMode};
pub use datasource::{MockQuoteSource, NavApiSource, QuoteSource, QuoteSourceError};
pub use db::{init_db, MemoryStore, Repository, StateStore, StoreError};
pub use domain::{
    Amount, DecisionResult, ProfitEvent, Quote, ReconciliationState, ResultCode, Timestamp,
};
pub use engine::{EnginePolicy, FeeRate, TriggerPolicy};
pub use error::AppError;
pub use ledger::{LedgerConnector, LedgerError, LedgerGateway, MockLedger};
pub use orchestration::{CycleRunner, EngineError, Reconciler};

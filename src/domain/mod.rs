//! Domain types for NAV reconciliation.
//!
//! This module provides:
//! - Fixed-point ledger amounts and exact unit conversion
//! - Lossless decimals for rates and the percentage metric
//! - Quotes, the singleton state row, profit ledger entries
//! - Commit records and the per-cycle decision result

pub mod amount;
pub mod decimal;
pub mod outcome;
pub mod primitives;
pub mod quote;
pub mod state;

pub use amount::{Amount, AmountError, MAX_ASSET_DECIMALS};
pub use decimal::Decimal;
pub use outcome::{CommitDirection, CommitReceipt, CommitRequest, CommitResult, DecisionResult};
pub use primitives::{ResultCode, Timestamp};
pub use quote::{InboundQuote, Quote, QuoteValue};
pub use state::{ProfitEvent, ProfitSplit, ReconciliationState};

//! NAV quote as consumed by the reconciler.

use crate::domain::{Amount, AmountError, Timestamp};
use serde::{Deserialize, Serialize};

/// A NAV snapshot in ledger units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub value: Amount,
    pub observed_at: Timestamp,
}

impl Quote {
    pub fn new(value: Amount, observed_at: Timestamp) -> Self {
        Self { value, observed_at }
    }
}

/// Inbound quote value, one of:
/// - `"1010000.5"`: decimal string in whole asset units
/// - `1010000`: JSON integer in raw ledger units, at most `u64::MAX`
/// - `{"raw": "20000000000000000000"}`: raw ledger units as an integer string, any size
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuoteValue {
    Units(String),
    Raw(u64),
    RawUnits { raw: Amount },
}

/// Quote as received from a push caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundQuote {
    pub value: QuoteValue,
    pub observed_at: i64,
}

impl InboundQuote {
    /// Convert to ledger units using the vault asset's decimals.
    pub fn into_quote(self, asset_decimals: u32) -> Result<Quote, AmountError> {
        let value = match self.value {
            QuoteValue::Units(s) => Amount::parse_units(&s, asset_decimals)?,
            QuoteValue::Raw(raw) => Amount::new(raw as i128),
            QuoteValue::RawUnits { raw } => raw,
        };
        Ok(Quote::new(value, Timestamp::new(self.observed_at)))
    }
}

//! Fixed-point ledger amounts.
//!
//! Every value that can end up in a ledger commit is an [`Amount`]: a signed integer count of the
//! vault asset's smallest unit (e.g. wei for an 18-decimal token). Conversions from the
//! human-readable decimal strings reported by the NAV API are exact.

use crate::domain::Decimal;
use rust_decimal::Decimal as RustDecimal;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Largest supported asset decimal count. `10^38` no longer fits in an `i128`.
pub const MAX_ASSET_DECIMALS: u32 = 36;

/// Signed amount in raw ledger units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(i128);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("empty amount")]
    Empty,
    #[error("invalid amount: {0}")]
    Invalid(String),
    #[error("amount {value} has more than {decimals} decimal places")]
    TooPrecise { value: String, decimals: u32 },
    #[error("asset decimals {0} exceeds the supported maximum")]
    UnsupportedDecimals(u32),
    #[error("amount overflow")]
    Overflow,
}

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn new(raw: i128) -> Self {
        Amount(raw)
    }

    /// Raw integer value in ledger units.
    pub fn raw(&self) -> i128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn abs(&self) -> Amount {
        Amount(self.0.saturating_abs())
    }

    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).map(Amount)
    }

    /// Parse a decimal string expressed in whole asset units (`"1000.25"`) into raw ledger units.
    ///
    /// Exact: fractional digits beyond `decimals` are rejected unless they are all zero.
    /// Exponent notation is not accepted.
    pub fn parse_units(s: &str, decimals: u32) -> Result<Amount, AmountError> {
        if decimals > MAX_ASSET_DECIMALS {
            return Err(AmountError::UnsupportedDecimals(decimals));
        }
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(AmountError::Empty);
        }

        let (negative, unsigned) = match trimmed.as_bytes()[0] {
            b'-' => (true, &trimmed[1..]),
            b'+' => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };

        let (int_part, frac_part) = match unsigned.split_once('.') {
            Some((i, f)) => (i, f),
            None => (unsigned, ""),
        };

        let all_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
        if (int_part.is_empty() && frac_part.is_empty())
            || !all_digits(int_part)
            || !all_digits(frac_part)
        {
            return Err(AmountError::Invalid(trimmed.to_string()));
        }

        let frac_significant = frac_part.trim_end_matches('0');
        if frac_significant.len() > decimals as usize {
            return Err(AmountError::TooPrecise {
                value: trimmed.to_string(),
                decimals,
            });
        }

        let scale = 10i128.pow(decimals);
        let int_value = if int_part.is_empty() {
            0
        } else {
            int_part
                .parse::<i128>()
                .map_err(|_| AmountError::Overflow)?
        };

        let frac_value = if frac_significant.is_empty() {
            0
        } else {
            let padding = decimals as usize - frac_significant.len();
            let digits: i128 = frac_significant
                .parse()
                .map_err(|_| AmountError::Overflow)?;
            digits
                .checked_mul(10i128.pow(padding as u32))
                .ok_or(AmountError::Overflow)?
        };

        let magnitude = int_value
            .checked_mul(scale)
            .and_then(|v| v.checked_add(frac_value))
            .ok_or(AmountError::Overflow)?;

        Ok(Amount(if negative { -magnitude } else { magnitude }))
    }

    /// Format raw ledger units as a decimal string in whole asset units, without trailing zeros.
    pub fn format_units(&self, decimals: u32) -> String {
        let decimals = decimals.min(MAX_ASSET_DECIMALS);
        let scale = 10u128.pow(decimals);
        let magnitude = self.0.unsigned_abs();
        let int_part = magnitude / scale;
        let frac_part = magnitude % scale;
        let sign = if self.0 < 0 { "-" } else { "" };

        if frac_part == 0 {
            return format!("{}{}", sign, int_part);
        }
        let frac = format!("{:0width$}", frac_part, width = decimals as usize);
        format!("{}{}.{}", sign, int_part, frac.trim_end_matches('0'))
    }

    /// Exact decimal view of the raw value, if it fits rust_decimal's 96-bit mantissa.
    pub fn to_decimal(&self) -> Option<Decimal> {
        RustDecimal::try_from_i128_with_scale(self.0, 0)
            .ok()
            .map(Decimal::new)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parses the raw integer text form used for persistence.
impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(AmountError::Empty);
        }
        trimmed
            .parse::<i128>()
            .map(Amount)
            .map_err(|_| AmountError::Invalid(trimmed.to_string()))
    }
}

impl From<i128> for Amount {
    fn from(value: i128) -> Self {
        Amount(value)
    }
}

// Raw amounts routinely exceed 2^53, so they travel as strings on the wire.
impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AmountVisitor;

        impl<'de> Visitor<'de> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an integer or an integer string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
                Amount::from_str(v).map_err(E::custom)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
                Ok(Amount(v as i128))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
                Ok(Amount(v as i128))
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}

//! High-water-mark performance-fee waterfall.

use crate::domain::{Amount, Decimal, ProfitSplit};
use thiserror::Error;

use super::PlanError;

/// Performance fee expressed as an exact fraction of profit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeRate {
    numerator: i128,
    denominator: i128,
}

/// Largest reduced denominator accepted for a fee rate (eight fractional digits of a percent).
const MAX_FEE_DENOMINATOR: i128 = 10_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeeRateError {
    #[error("fee rate {0}% is outside [0, 100]")]
    OutOfRange(Decimal),
    #[error("fee rate {0}% has more than 8 fractional digits")]
    TooPrecise(Decimal),
}

fn gcd(mut a: i128, mut b: i128) -> i128 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

impl FeeRate {
    pub fn zero() -> Self {
        Self {
            numerator: 0,
            denominator: 1,
        }
    }

    /// Build from a percentage such as `20` or `12.5`.
    pub fn from_percent(percent: Decimal) -> Result<Self, FeeRateError> {
        if percent.is_negative() || percent > Decimal::hundred() {
            return Err(FeeRateError::OutOfRange(percent));
        }
        let (mantissa, scale) = percent.mantissa_and_scale();
        let denominator = 10i128
            .checked_pow(scale)
            .and_then(|d| d.checked_mul(100))
            .ok_or(FeeRateError::TooPrecise(percent))?;
        if mantissa == 0 {
            return Ok(Self::zero());
        }
        let divisor = gcd(mantissa, denominator);
        let (numerator, denominator) = (mantissa / divisor, denominator / divisor);
        if denominator > MAX_FEE_DENOMINATOR {
            return Err(FeeRateError::TooPrecise(percent));
        }
        Ok(Self {
            numerator,
            denominator,
        })
    }

    pub fn is_zero(&self) -> bool {
        self.numerator == 0
    }

    /// `floor(profit * rate)` for a non-negative profit.
    ///
    /// Splits `profit = q * den + r` so the intermediate product never exceeds `r * num`.
    pub fn fee_on(&self, profit: Amount) -> Option<Amount> {
        let p = profit.raw();
        if p < 0 {
            return None;
        }
        let q = p / self.denominator;
        let r = p % self.denominator;
        let whole = q.checked_mul(self.numerator)?;
        let part = r.checked_mul(self.numerator)? / self.denominator;
        whole.checked_add(part).map(Amount::new)
    }
}

/// What a triggered cycle writes and records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Waterfall {
    /// Signed amount to commit: positive reports profit, negative reports loss.
    pub commit_amount: Amount,
    pub profit: Option<ProfitSplit>,
    pub new_high_water_mark: Option<Amount>,
}

/// Split a triggered delta into the ledger commit, the fee event and the next high-water mark.
///
/// Losses and recoveries that stay at or below the high-water mark commit the full delta and leave
/// the mark untouched. Profit above the mark pays `floor(profit * rate)` as fee, which is withheld
/// from the commit; the mark moves to `quote_value - fee`. The mark defaults to `current_assets`
/// until the first fee event.
pub fn apply_waterfall(
    delta: Amount,
    quote_value: Amount,
    current_assets: Amount,
    high_water_mark: Option<Amount>,
    fee_rate: &FeeRate,
) -> Result<Waterfall, PlanError> {
    let unchanged = Waterfall {
        commit_amount: delta,
        profit: None,
        new_high_water_mark: high_water_mark,
    };
    if !delta.is_positive() {
        return Ok(unchanged);
    }

    let hwm = high_water_mark.unwrap_or(current_assets);
    let profit_above_hwm = quote_value
        .checked_sub(hwm)
        .ok_or(PlanError::Overflow("profit above high-water mark"))?;
    if !profit_above_hwm.is_positive() {
        return Ok(unchanged);
    }

    let fee = fee_rate
        .fee_on(profit_above_hwm)
        .ok_or(PlanError::Overflow("performance fee"))?
        .min(delta);
    let investor_share = delta
        .checked_sub(fee)
        .ok_or(PlanError::Overflow("investor share"))?;
    let profit_investors = profit_above_hwm
        .checked_sub(fee)
        .ok_or(PlanError::Overflow("investor profit"))?;
    let new_hwm = quote_value
        .checked_sub(fee)
        .ok_or(PlanError::Overflow("high-water mark"))?;

    Ok(Waterfall {
        commit_amount: investor_share,
        profit: Some(ProfitSplit {
            profit_total: profit_above_hwm,
            profit_investors,
            profit_performance_fee: fee,
        }),
        new_high_water_mark: Some(new_hwm),
    })
}

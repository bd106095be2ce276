use crate::domain::{Amount, Decimal};

use super::PlanError;

/// `quote_value - current_assets` in ledger units.
pub fn compute_delta(quote_value: Amount, current_assets: Amount) -> Result<Amount, PlanError> {
    quote_value
        .checked_sub(current_assets)
        .ok_or(PlanError::Overflow("delta"))
}

/// Percentage change of `quote_value` relative to `current_assets`, rounded to 2 decimal places.
///
/// Display and threshold metric only. Computed exactly in decimal when both values fit
/// rust_decimal's mantissa, otherwise in f64.
pub fn percentage_change(quote_value: Amount, current_assets: Amount) -> Result<f64, PlanError> {
    if !current_assets.is_positive() {
        return Err(PlanError::NonPositiveBaseline(current_assets));
    }
    let delta = compute_delta(quote_value, current_assets)?;

    let exact = delta.to_decimal().zip(current_assets.to_decimal()).and_then(|(d, a)| {
        d.checked_mul(Decimal::hundred())
            .and_then(|scaled| scaled.checked_div(a))
    });

    Ok(match exact {
        Some(pct) => pct.round_dp(2).to_f64(),
        None => {
            let pct = delta.raw() as f64 / current_assets.raw() as f64 * 100.0;
            (pct * 100.0).round() / 100.0
        }
    })
}

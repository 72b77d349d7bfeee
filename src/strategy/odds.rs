//! American odds conversions
//!
//! All stake-facing values are `Decimal`; only the probability to odds
//! direction (used by the market simulator) starts from a float.

use crate::error::{DiamondError, Result};
use rust_decimal::Decimal;

/// Reject quotes inside (-100, 100), which have no American-odds meaning
pub fn validate_american(odds: i32) -> Result<i32> {
    if odds.unsigned_abs() < 100 {
        return Err(DiamondError::InvalidOdds(odds));
    }
    Ok(odds)
}

/// Decimal (European) odds: `+150 → 2.5`, `-200 → 1.5`
pub fn american_to_decimal(odds: i32) -> Result<Decimal> {
    let odds = validate_american(odds)?;
    let hundred = Decimal::ONE_HUNDRED;
    let value = Decimal::from(odds);
    if odds > 0 {
        Ok(Decimal::ONE + value / hundred)
    } else {
        Ok(Decimal::ONE + hundred / value.abs())
    }
}

/// Break-even probability of a decimal price
pub fn implied_probability(decimal_odds: Decimal) -> Decimal {
    if decimal_odds > Decimal::ZERO {
        Decimal::ONE / decimal_odds
    } else {
        Decimal::ZERO
    }
}

/// Break-even probability straight from an American quote
pub fn american_implied_probability(odds: i32) -> Result<Decimal> {
    american_to_decimal(odds).map(implied_probability)
}

/// Fair American odds for a probability, truncated toward zero.
///
/// Underdogs (`p <= 0.5`) quote positive, favourites negative.
pub fn probability_to_american(prob: f64) -> Result<i32> {
    if !prob.is_finite() || prob <= 0.0 || prob >= 1.0 {
        return Err(DiamondError::Validation(format!(
            "probability must be in (0, 1), got {}",
            prob
        )));
    }
    let profit_per_unit = 1.0 / prob - 1.0;
    let odds = if prob <= 0.5 {
        (profit_per_unit * 100.0) as i32
    } else {
        (-100.0 / profit_per_unit) as i32
    };
    Ok(odds)
}

//! Fractional Kelly sizing

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub const MIN_LEVERAGE_MULTIPLIER: Decimal = dec!(0.5);
pub const MAX_LEVERAGE_MULTIPLIER: Decimal = dec!(1.5);

/// Convert a float to Decimal at six places (probabilities, leverage index).
///
/// Non-finite input maps to `None`.
pub fn decimal_from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_f64(value).map(|d| d.round_dp(6))
}

/// Full-Kelly fraction `max(0, (b·p − q) / b)` with `b = decimal_odds − 1`.
///
/// Zero when the price pays nothing (`b <= 0`).
pub fn full_kelly(prob: Decimal, decimal_odds: Decimal) -> Decimal {
    let b = decimal_odds - Decimal::ONE;
    if b <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let q = Decimal::ONE - prob;
    ((b * prob - q) / b).max(Decimal::ZERO)
}

/// Stake multiplier `clamp(0.5·LI + 0.5, 0.5, 1.5)`
pub fn leverage_multiplier(leverage_index: f64) -> Decimal {
    let li = decimal_from_f64(leverage_index).unwrap_or(Decimal::ONE);
    (dec!(0.5) * li + dec!(0.5)).clamp(MIN_LEVERAGE_MULTIPLIER, MAX_LEVERAGE_MULTIPLIER)
}

/// Bankroll fraction after the Kelly fraction, leverage scaling and the hard cap
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KellySizer {
    pub kelly_fraction: Decimal,
    pub max_wager_limit: Decimal,
}

impl KellySizer {
    pub fn new(kelly_fraction: Decimal, max_wager_limit: Decimal) -> Self {
        Self {
            kelly_fraction,
            max_wager_limit,
        }
    }

    pub fn wager_fraction(&self, prob: Decimal, decimal_odds: Decimal, leverage_index: f64) -> Decimal {
        let raw = full_kelly(prob, decimal_odds) * self.kelly_fraction * leverage_multiplier(leverage_index);
        raw.min(self.max_wager_limit).max(Decimal::ZERO)
    }
}

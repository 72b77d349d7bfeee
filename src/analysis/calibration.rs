//! Calibration audit over settled bets:
//! - Brier score (mean squared error of the predicted probability)
//! - expected vs observed win rate and their difference
//! - ten equal-width confidence bins
//! - bet PnL in fixed point

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{BetOutcome, BetRecord};
use crate::error::Result;
use crate::strategy::american_to_decimal;

pub const CALIBRATION_BINS: usize = 10;

/// One resolved prediction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SettledPrediction {
    pub predicted_prob: f64,
    pub won: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
    /// `None` for an empty bin
    pub mean_predicted: Option<f64>,
    pub observed: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub samples: usize,
    pub brier_score: f64,
    pub expected_win_rate: f64,
    pub observed_win_rate: f64,
    /// Observed minus expected; positive means the model is too pessimistic
    pub bias: f64,
    pub bins: Vec<CalibrationBin>,
}

/// Won/lost bets as predictions; open bets are skipped
pub fn settled_predictions(bets: &[BetRecord]) -> Vec<SettledPrediction> {
    bets.iter()
        .filter_map(|bet| {
            let won = match bet.outcome {
                BetOutcome::Won => true,
                BetOutcome::Lost => false,
                BetOutcome::Open => return None,
            };
            Some(SettledPrediction {
                predicted_prob: bet.model_prob.to_f64()?,
                won,
            })
        })
        .collect()
}

/// Build the report; `None` when nothing has settled
pub fn calibration_report(predictions: &[SettledPrediction]) -> Option<CalibrationReport> {
    if predictions.is_empty() {
        return None;
    }
    let n = predictions.len() as f64;
    let outcome = |p: &SettledPrediction| if p.won { 1.0 } else { 0.0 };

    let brier_score = predictions
        .iter()
        .map(|p| (p.predicted_prob - outcome(p)).powi(2))
        .sum::<f64>()
        / n;
    let expected_win_rate = predictions.iter().map(|p| p.predicted_prob).sum::<f64>() / n;
    let observed_win_rate = predictions.iter().map(outcome).sum::<f64>() / n;

    let mut sums = [(0usize, 0.0f64, 0.0f64); CALIBRATION_BINS];
    for p in predictions {
        let slot = bin_index(p.predicted_prob);
        sums[slot].0 += 1;
        sums[slot].1 += p.predicted_prob;
        sums[slot].2 += outcome(p);
    }

    let bins = sums
        .iter()
        .enumerate()
        .map(|(i, &(count, pred, obs))| {
            let width = 1.0 / CALIBRATION_BINS as f64;
            let (mean_predicted, observed) = if count == 0 {
                (None, None)
            } else {
                (Some(pred / count as f64), Some(obs / count as f64))
            };
            CalibrationBin {
                lower: i as f64 * width,
                upper: (i + 1) as f64 * width,
                count,
                mean_predicted,
                observed,
            }
        })
        .collect();

    Some(CalibrationReport {
        samples: predictions.len(),
        brier_score,
        expected_win_rate,
        observed_win_rate,
        bias: observed_win_rate - expected_win_rate,
        bins,
    })
}

// [lower, upper) except the top bin, which also takes 1.0
fn bin_index(prob: f64) -> usize {
    let prob = if prob.is_finite() { prob.clamp(0.0, 1.0) } else { 0.0 };
    ((prob * CALIBRATION_BINS as f64) as usize).min(CALIBRATION_BINS - 1)
}

/// Profit or loss of a settled bet; zero while open
pub fn settle_pnl(stake: Decimal, odds_american: i32, outcome: BetOutcome) -> Result<Decimal> {
    Ok(match outcome {
        BetOutcome::Open => Decimal::ZERO,
        BetOutcome::Won => (stake * (american_to_decimal(odds_american)? - Decimal::ONE)).round_dp(2),
        BetOutcome::Lost => -stake,
    })
}

/// Net PnL across a bet log
pub fn total_pnl(bets: &[BetRecord]) -> Result<Decimal> {
    bets.iter().try_fold(Decimal::ZERO, |acc, bet| {
        Ok(acc + settle_pnl(bet.stake, bet.odds_american, bet.outcome)?)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn pred(p: f64, won: bool) -> SettledPrediction {
        SettledPrediction {
            predicted_prob: p,
            won,
        }
    }

    fn bet(prob: Decimal, outcome: BetOutcome, stake: Decimal, odds: i32) -> BetRecord {
        BetRecord {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            game_id: Some(1),
            stake,
            odds_american: odds,
            model_prob: prob,
            implied_prob: dec!(0.5),
            edge: dec!(0.05),
            leverage_index: 1.0,
            latency_secs: None,
            outcome,
        }
    }

    #[test]
    fn test_empty_has_no_report() {
        assert!(calibration_report(&[]).is_none());
    }

    #[test]
    fn test_metrics() {
        let preds = [pred(0.8, true), pred(0.6, false), pred(0.3, false), pred(1.0, true)];
        let report = calibration_report(&preds).unwrap();
        assert_eq!(report.samples, 4);
        // (0.04 + 0.36 + 0.09 + 0) / 4
        assert!((report.brier_score - 0.1225).abs() < 1e-12);
        assert!((report.expected_win_rate - 0.675).abs() < 1e-12);
        assert!((report.observed_win_rate - 0.5).abs() < 1e-12);
        assert!((report.bias + 0.175).abs() < 1e-12);

        assert_eq!(report.bins.len(), CALIBRATION_BINS);
        assert_eq!(report.bins[8].count, 1);
        assert_eq!(report.bins[9].count, 1);
        assert_eq!(report.bins[6].observed, Some(0.0));
        assert_eq!(report.bins[0].mean_predicted, None);
        assert_eq!(report.bins.iter().map(|b| b.count).sum::<usize>(), 4);
    }

    #[test]
    fn test_settled_predictions_skip_open() {
        let bets = vec![
            bet(dec!(0.6), BetOutcome::Won, dec!(100), 120),
            bet(dec!(0.55), BetOutcome::Open, dec!(100), 120),
            bet(dec!(0.4), BetOutcome::Lost, dec!(100), 120),
        ];
        let preds = settled_predictions(&bets);
        assert_eq!(preds, vec![pred(0.6, true), pred(0.4, false)]);
    }

    #[test]
    fn test_pnl() {
        assert_eq!(settle_pnl(dec!(500), 100, BetOutcome::Won).unwrap(), dec!(500));
        assert_eq!(settle_pnl(dec!(500), -200, BetOutcome::Won).unwrap(), dec!(250));
        assert_eq!(settle_pnl(dec!(500), 150, BetOutcome::Lost).unwrap(), dec!(-500));
        assert_eq!(settle_pnl(dec!(500), 150, BetOutcome::Open).unwrap(), Decimal::ZERO);
        assert!(settle_pnl(dec!(500), 50, BetOutcome::Won).is_err());

        let bets = vec![
            bet(dec!(0.6), BetOutcome::Won, dec!(100), 150),
            bet(dec!(0.6), BetOutcome::Lost, dec!(40), 150),
        ];
        assert_eq!(total_pnl(&bets).unwrap(), dec!(110));
    }
}

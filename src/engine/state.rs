//! Base-Out State Engine
//!
//! Canonical 24 base-out states plus the absorbing "inning over" state,
//! the league-average RE24 run-expectancy table, and the logistic
//! win-probability model shared by every engine in this crate.
//!
//! The model:
//! - leverage = expected runs from the current state minus the empty-bases,
//!   no-outs baseline (0.51)
//! - the batting side's leverage is added to (home) or subtracted from (away)
//!   the home score differential
//! - the adjusted differential is scaled by run-scoring volatility over the
//!   innings left, shifted by a home-field constant, and squashed by a sigmoid

use crate::domain::{BaseOutState, GameSituation, HalfInning, LIVE_STATES};
use crate::error::{DiamondError, Result};

/// League-average run expectancy for the 24 live states, indexed in
/// `(outs, r1, r2, r3)` enumeration order.
pub const RE24_BASELINE: [f64; LIVE_STATES] = [
    0.51, 0.91, 1.14, 1.40, 1.48, 1.73, 2.01, 2.36, // 0 outs
    0.27, 0.53, 0.69, 0.95, 0.94, 1.18, 1.44, 1.63, // 1 out
    0.10, 0.22, 0.32, 0.38, 0.44, 0.53, 0.60, 0.77, // 2 outs
];

/// Expected runs from the empty-bases, no-outs state
pub const BASELINE_EXPECTED_RUNS: f64 = 0.51;

/// Standard deviation of the run differential per inning
pub const RUNS_STD_PER_INNING: f64 = 1.17;

/// Logit shift in favour of the home side
pub const HOME_FIELD_ADVANTAGE: f64 = 0.10;

pub const MIN_WIN_PROB: f64 = 0.001;
pub const MAX_WIN_PROB: f64 = 0.999;

const REGULATION_INNINGS: u32 = 9;
const MIN_INNINGS_REMAINING: f64 = 0.5;

/// Sigmoid function: 1 / (1 + exp(-x))
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Innings of play left, counting the rest of the current half as a fraction.
///
/// Top of an inning still has both halves to play (1.0 of the current inning),
/// the bottom has one half (0.5). Floored at half an inning so extra innings
/// never collapse the volatility to zero.
pub fn innings_remaining(inning: u32, half: HalfInning) -> f64 {
    let full_innings_after = REGULATION_INNINGS.saturating_sub(inning) as f64;
    let current = match half {
        HalfInning::Top => 1.0,
        HalfInning::Bottom => 0.5,
    };
    (full_innings_after + current).max(MIN_INNINGS_REMAINING)
}

/// True once the home side leads in the bottom of the ninth or later.
pub fn game_decided_for_home(inning: u32, half: HalfInning, score_diff: i32) -> bool {
    inning >= REGULATION_INNINGS && half == HalfInning::Bottom && score_diff > 0
}

/// Home win probability from a score differential and the batting side's
/// expected runs for the rest of the half-inning.
///
/// This is the single formula used by both the table-driven engine and the
/// Markov engine; only the source of `expected_runs` differs.
pub fn logistic_win_probability(
    score_diff: i32,
    expected_runs: f64,
    inning: u32,
    half: HalfInning,
) -> f64 {
    if game_decided_for_home(inning, half, score_diff) {
        return 1.0;
    }

    let leverage = expected_runs - BASELINE_EXPECTED_RUNS;
    let effective_diff = if half.home_batting() {
        score_diff as f64 + leverage
    } else {
        score_diff as f64 - leverage
    };

    let std_dev = RUNS_STD_PER_INNING * innings_remaining(inning, half).sqrt();
    let z = effective_diff / std_dev + HOME_FIELD_ADVANTAGE;

    sigmoid(z).clamp(MIN_WIN_PROB, MAX_WIN_PROB)
}

/// Sanitise an externally supplied multiplier; anything non-finite or
/// non-positive is treated as neutral.
#[inline]
pub(crate) fn sanitize_modifier(modifier: f64) -> f64 {
    if modifier.is_finite() && modifier > 0.0 {
        modifier
    } else {
        1.0
    }
}

/// Table-driven state engine
#[derive(Debug, Clone)]
pub struct StateEngine {
    baseline: [f64; LIVE_STATES],
}

impl StateEngine {
    /// Engine backed by the league-average RE24 table
    pub fn new() -> Self {
        Self {
            baseline: RE24_BASELINE,
        }
    }

    /// Engine backed by a custom run-expectancy table.
    ///
    /// Negative or non-finite entries are structural errors and are rejected here
    /// rather than surfacing later as nonsense probabilities.
    pub fn with_table(baseline: [f64; LIVE_STATES]) -> Result<Self> {
        if let Some((idx, value)) = baseline
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(DiamondError::Matrix(format!(
                "run expectancy for state {} must be non-negative, got {}",
                idx, value
            )));
        }
        Ok(Self { baseline })
    }

    /// Index of a base-out situation (24 when three or more outs)
    pub fn state_index(&self, outs: u8, first: bool, second: bool, third: bool) -> usize {
        BaseOutState::from_parts(outs, crate::domain::Runners::new(first, second, third)).index()
    }

    /// Expected runs for the rest of the inning, scaled by the pitcher modifier
    pub fn expected_runs(&self, state: BaseOutState, pitcher_mod: f64) -> f64 {
        if state.is_absorbing() {
            return 0.0;
        }
        self.baseline[state.index()] * sanitize_modifier(pitcher_mod)
    }

    /// Home win probability for the given scoreboard and base-out state
    pub fn win_probability(
        &self,
        home_score: u32,
        away_score: u32,
        inning: u32,
        half: HalfInning,
        state: BaseOutState,
        pitcher_mod: f64,
    ) -> f64 {
        let score_diff = home_score as i32 - away_score as i32;
        let expected = self.expected_runs(state, pitcher_mod);
        logistic_win_probability(score_diff, expected, inning.max(1), half)
    }

    /// Convenience wrapper over a full situation
    pub fn situation_win_probability(&self, situation: &GameSituation, pitcher_mod: f64) -> f64 {
        self.win_probability(
            situation.home_score,
            situation.away_score,
            situation.inning,
            situation.half,
            situation.state(),
            pitcher_mod,
        )
    }

    pub fn baseline(&self) -> &[f64; LIVE_STATES] {
        &self.baseline
    }
}

impl Default for StateEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Runners;

    #[test]
    fn test_sigmoid() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
        assert!(sigmoid(10.0) > 0.99);
        assert!(sigmoid(-10.0) < 0.01);
    }

    #[test]
    fn test_re24_anchor_values() {
        let engine = StateEngine::new();
        let loaded_none_out = BaseOutState::from_parts(0, Runners::LOADED);
        let empty_two_out = BaseOutState::from_parts(2, Runners::EMPTY);
        assert!((engine.expected_runs(loaded_none_out, 1.0) - 2.36).abs() < 1e-12);
        assert!((engine.expected_runs(empty_two_out, 1.0) - 0.10).abs() < 1e-12);
        assert_eq!(engine.expected_runs(BaseOutState::INNING_OVER, 1.3), 0.0);
    }

    #[test]
    fn test_pitcher_modifier_scales_expected_runs() {
        let engine = StateEngine::new();
        let state = BaseOutState::START;
        assert!((engine.expected_runs(state, 1.2) - 0.51 * 1.2).abs() < 1e-12);
        // garbage modifiers are neutral
        assert_eq!(engine.expected_runs(state, f64::NAN), 0.51);
        assert_eq!(engine.expected_runs(state, -1.0), 0.51);
    }

    #[test]
    fn test_state_index() {
        let engine = StateEngine::new();
        assert_eq!(engine.state_index(0, false, false, false), 0);
        assert_eq!(engine.state_index(0, true, true, true), 7);
        assert_eq!(engine.state_index(3, true, false, false), 24);
        assert_eq!(engine.state_index(7, false, false, false), 24);
    }

    #[test]
    fn test_walk_off_is_certain() {
        let engine = StateEngine::new();
        let p = engine.win_probability(5, 4, 9, HalfInning::Bottom, BaseOutState::START, 1.0);
        assert_eq!(p, 1.0);
        let p = engine.win_probability(5, 4, 11, HalfInning::Bottom, BaseOutState::START, 1.0);
        assert_eq!(p, 1.0);
    }

    #[test]
    fn test_clamped_bounds() {
        let engine = StateEngine::new();
        let p = engine.win_probability(0, 20, 9, HalfInning::Top, BaseOutState::START, 1.0);
        assert_eq!(p, MIN_WIN_PROB);
        let p = engine.win_probability(20, 0, 9, HalfInning::Top, BaseOutState::START, 1.0);
        assert_eq!(p, MAX_WIN_PROB);
    }

    #[test]
    fn test_home_field_edge_when_tied() {
        let engine = StateEngine::new();
        let p = engine.win_probability(0, 0, 1, HalfInning::Top, BaseOutState::START, 1.0);
        assert!((p - sigmoid(HOME_FIELD_ADVANTAGE)).abs() < 1e-12);
    }

    #[test]
    fn test_leverage_direction() {
        let engine = StateEngine::new();
        let loaded = BaseOutState::from_parts(0, Runners::LOADED);
        let top = engine.win_probability(3, 3, 8, HalfInning::Top, loaded, 1.0);
        let bottom = engine.win_probability(3, 3, 8, HalfInning::Bottom, loaded, 1.0);
        // bases loaded favours whoever is batting
        assert!(top < 0.5);
        assert!(bottom > 0.5);
    }

    #[test]
    fn test_innings_remaining() {
        assert_eq!(innings_remaining(1, HalfInning::Top), 9.0);
        assert_eq!(innings_remaining(9, HalfInning::Top), 1.0);
        assert_eq!(innings_remaining(9, HalfInning::Bottom), 0.5);
        assert_eq!(innings_remaining(12, HalfInning::Bottom), 0.5);
    }

    #[test]
    fn test_custom_table_rejects_negative() {
        let mut table = RE24_BASELINE;
        table[3] = -0.1;
        assert!(StateEngine::with_table(table).is_err());
        assert!(StateEngine::with_table(RE24_BASELINE).is_ok());
    }
}

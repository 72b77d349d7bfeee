//! Market quotes
//!
//! [`OddsSource`] is the seam for a real sportsbook feed. [`MarketSimulator`]
//! is the shadow-testing stand-in: a "lazy bookmaker" pricing off the RE24
//! baseline with no fatigue information, plus a vig that widens late in
//! close games.

use super::odds::probability_to_american;
use crate::domain::{GameId, GameSituation};
use crate::engine::StateEngine;
use crate::error::Result;

pub const BASE_VIG: f64 = 1.025;
pub const LATE_CLOSE_VIG: f64 = 1.055;
pub const LATE_BLOWOUT_VIG: f64 = 1.035;
pub const LATE_STANDARD_VIG: f64 = 1.040;
pub const MAX_PRICED_PROB: f64 = 0.99;

/// Home moneyline provider
#[async_trait::async_trait]
pub trait OddsSource: Send + Sync {
    /// American odds on the home side, `None` when the market is off the board
    async fn home_moneyline(&self, game_id: GameId, situation: &GameSituation) -> Result<Option<i32>>;
}

/// Baseline bookmaker
#[derive(Debug, Clone, Default)]
pub struct MarketSimulator {
    engine: StateEngine,
}

impl MarketSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overround multiplier for the game state
    pub fn dynamic_vig(&self, inning: u32, abs_score_diff: u32) -> f64 {
        if inning < 7 {
            return BASE_VIG;
        }
        if abs_score_diff <= 2 {
            LATE_CLOSE_VIG
        } else if abs_score_diff >= 5 {
            LATE_BLOWOUT_VIG
        } else {
            LATE_STANDARD_VIG
        }
    }

    /// Home probability the book charges for
    pub fn priced_probability(&self, situation: &GameSituation) -> f64 {
        let raw = self.engine.situation_win_probability(situation, 1.0);
        let vig = self.dynamic_vig(situation.inning, situation.score_diff().unsigned_abs());
        (raw * vig).min(MAX_PRICED_PROB)
    }

    /// American odds on the home side
    pub fn market_odds(&self, situation: &GameSituation) -> Result<i32> {
        probability_to_american(self.priced_probability(situation))
    }
}

#[async_trait::async_trait]
impl OddsSource for MarketSimulator {
    async fn home_moneyline(&self, _game_id: GameId, situation: &GameSituation) -> Result<Option<i32>> {
        self.market_odds(situation).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{HalfInning, Runners};

    fn situation(inning: u32, home: u32, away: u32) -> GameSituation {
        GameSituation {
            inning,
            half: HalfInning::Top,
            outs: 0,
            runners: Runners::EMPTY,
            home_score: home,
            away_score: away,
        }
    }

    #[test]
    fn test_dynamic_vig() {
        let market = MarketSimulator::new();
        assert_eq!(market.dynamic_vig(3, 0), BASE_VIG);
        assert_eq!(market.dynamic_vig(7, 1), LATE_CLOSE_VIG);
        assert_eq!(market.dynamic_vig(8, 3), LATE_STANDARD_VIG);
        assert_eq!(market.dynamic_vig(9, 6), LATE_BLOWOUT_VIG);
    }

    #[test]
    fn test_priced_above_fair() {
        let market = MarketSimulator::new();
        let s = situation(2, 1, 1);
        let fair = StateEngine::new().situation_win_probability(&s, 1.0);
        assert!(market.priced_probability(&s) > fair);
    }

    #[test]
    fn test_heavy_favourite_is_capped() {
        let market = MarketSimulator::new();
        let s = situation(9, 10, 0);
        assert_eq!(market.priced_probability(&s), MAX_PRICED_PROB);
        assert!(market.market_odds(&s).unwrap() <= -9_899);
    }

    #[tokio::test]
    async fn test_odds_source_impl() {
        let market = MarketSimulator::new();
        let s = situation(1, 0, 0);
        let odds = market.home_moneyline(1, &s).await.unwrap().unwrap();
        // home-field edge plus vig: a modest favourite
        assert!(odds < 0);
        assert!(odds > -200);
    }
}

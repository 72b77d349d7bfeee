use super::GameId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Outcome of a trade evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeAction {
    /// Edge found and every safety valve passed
    Bet,
    /// No actionable edge
    Pass,
    /// A safety valve refused the trade regardless of edge
    Block,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Bet => "BET",
            TradeAction::Pass => "PASS",
            TradeAction::Block => "BLOCK",
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Situational context for a trade evaluation.
///
/// Every field is optional. Missing values fall back to neutral defaults:
/// inning 1, score difference 0, leverage index 1.0 and latency assumed safe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeContext {
    #[serde(default)]
    pub game_id: Option<GameId>,
    #[serde(default)]
    pub inning: Option<u32>,
    /// Home minus away (sign is ignored by the safety valves)
    #[serde(default)]
    pub score_diff: Option<i32>,
    #[serde(default)]
    pub leverage_index: Option<f64>,
    #[serde(default)]
    pub latency_safe: Option<bool>,
    /// Rolling feed latency at decision time, for the persisted snapshot
    #[serde(default)]
    pub latency_secs: Option<f64>,
}

impl TradeContext {
    pub const DEFAULT_INNING: u32 = 1;
    pub const DEFAULT_LEVERAGE_INDEX: f64 = 1.0;

    pub fn new(inning: u32, score_diff: i32) -> Self {
        Self {
            inning: Some(inning),
            score_diff: Some(score_diff),
            ..Default::default()
        }
    }

    pub fn with_leverage(mut self, leverage_index: f64) -> Self {
        self.leverage_index = Some(leverage_index);
        self
    }

    pub fn with_latency(mut self, safe: bool, latency_secs: Option<f64>) -> Self {
        self.latency_safe = Some(safe);
        self.latency_secs = latency_secs;
        self
    }

    pub fn with_game(mut self, game_id: GameId) -> Self {
        self.game_id = Some(game_id);
        self
    }

    pub fn inning_or_default(&self) -> u32 {
        self.inning.unwrap_or(Self::DEFAULT_INNING)
    }

    pub fn abs_score_diff(&self) -> u32 {
        self.score_diff.unwrap_or(0).unsigned_abs()
    }

    /// Leverage index used for sizing; non-finite values count as missing
    pub fn leverage_or_default(&self) -> f64 {
        self.leverage_index
            .filter(|li| li.is_finite())
            .unwrap_or(Self::DEFAULT_LEVERAGE_INDEX)
    }

    pub fn latency_is_safe(&self) -> bool {
        self.latency_safe.unwrap_or(true)
    }
}

/// Decision emitted by the trader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeDecision {
    pub action: TradeAction,
    pub reason: String,
    /// Stake in currency units, rounded to cents
    pub wager_amount: Decimal,
    /// Stake as a fraction of bankroll, within `[0, max_wager_limit]`
    pub wager_fraction: Decimal,
    pub implied_prob: Decimal,
    /// Model probability minus implied probability
    pub edge: Decimal,
    /// Expected value per unit staked
    pub expected_value: Decimal,
}

impl TradeDecision {
    pub fn is_bet(&self) -> bool {
        self.action == TradeAction::Bet
    }
}

/// Settlement status of a persisted bet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BetOutcome {
    Open,
    Won,
    Lost,
}

impl BetOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            BetOutcome::Open => "OPEN",
            BetOutcome::Won => "WON",
            BetOutcome::Lost => "LOST",
        }
    }
}

/// Immutable snapshot of an accepted bet, queued for persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub game_id: Option<GameId>,
    pub stake: Decimal,
    pub odds_american: i32,
    pub model_prob: Decimal,
    pub implied_prob: Decimal,
    pub edge: Decimal,
    pub leverage_index: f64,
    pub latency_secs: Option<f64>,
    #[serde(default = "default_outcome")]
    pub outcome: BetOutcome,
}

fn default_outcome() -> BetOutcome {
    BetOutcome::Open
}

//! Trader agent
//!
//! Turns a model probability and a market quote into BET / PASS / BLOCK.
//!
//! Order of evaluation:
//! 1. price the quote (decimal odds, implied probability, EV, edge)
//! 2. safety valves, first failure blocks: garbage time, low leverage, stale feed
//! 3. edge gate: both EV and raw edge must reach `min_edge`
//! 4. fractional Kelly sizing, capped at `max_wager_limit`
//!
//! Accepted bets are handed to the cold path as [`BetRecord`] snapshots; the
//! decision never waits on persistence.

use super::kelly::{decimal_from_f64, KellySizer};
use super::odds::{american_to_decimal, implied_probability};
use crate::domain::{BetOutcome, BetRecord, TradeAction, TradeContext, TradeDecision};
use crate::error::{DiamondError, Result};
use crate::persistence::QueueSender;
use chrono::Utc;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

/// Inning from which lopsided games are considered decided
pub const GARBAGE_TIME_INNING: u32 = 7;
/// Run margin that makes a late game garbage time
pub const GARBAGE_TIME_MARGIN: u32 = 6;
/// Leverage index below which nothing is at stake
pub const LOW_LEVERAGE_THRESHOLD: f64 = 0.2;

/// Trader configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraderConfig {
    /// Capital available for sizing
    pub bankroll: Decimal,
    /// Fraction of full Kelly to stake (0.25 = quarter Kelly)
    pub kelly_fraction: Decimal,
    /// Minimum EV and edge required to bet
    pub min_edge: Decimal,
    /// Hard cap on stake as a fraction of bankroll
    pub max_wager_limit: Decimal,
    /// Capacity of the bet persistence queue
    pub persist_queue_capacity: usize,
}

impl Default for TraderConfig {
    fn default() -> Self {
        Self {
            bankroll: dec!(10000),
            kelly_fraction: dec!(0.25),
            min_edge: dec!(0.02),
            max_wager_limit: dec!(0.05),
            persist_queue_capacity: 1024,
        }
    }
}

impl TraderConfig {
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.bankroll <= Decimal::ZERO {
            errors.push("trader.bankroll must be positive".to_string());
        }
        if self.kelly_fraction <= Decimal::ZERO || self.kelly_fraction > Decimal::ONE {
            errors.push("trader.kelly_fraction must be in (0, 1]".to_string());
        }
        if self.max_wager_limit <= Decimal::ZERO || self.max_wager_limit > Decimal::ONE {
            errors.push("trader.max_wager_limit must be in (0, 1]".to_string());
        }
        if self.min_edge < Decimal::ZERO {
            errors.push("trader.min_edge must not be negative".to_string());
        }
        if self.persist_queue_capacity == 0 {
            errors.push("trader.persist_queue_capacity must be positive".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Quote priced against a model probability
struct PricedQuote {
    decimal_odds: Decimal,
    implied_prob: Decimal,
    edge: Decimal,
    expected_value: Decimal,
}

/// Trading decision engine
pub struct TraderAgent {
    config: TraderConfig,
    sizer: KellySizer,
    bankroll: RwLock<Decimal>,
    bet_sink: Option<QueueSender<BetRecord>>,
}

impl TraderAgent {
    pub fn new(config: TraderConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|errors| DiamondError::Validation(errors.join("; ")))?;
        Ok(Self {
            sizer: KellySizer::new(config.kelly_fraction, config.max_wager_limit),
            bankroll: RwLock::new(config.bankroll),
            config,
            bet_sink: None,
        })
    }

    /// Persist accepted bets through a cold-path queue
    pub fn with_bet_sink(mut self, sink: QueueSender<BetRecord>) -> Self {
        self.bet_sink = Some(sink);
        self
    }

    pub fn config(&self) -> &TraderConfig {
        &self.config
    }

    pub fn bankroll(&self) -> Decimal {
        *self.bankroll.read()
    }

    /// Apply a settled result to the bankroll used for sizing
    pub fn apply_pnl(&self, pnl: Decimal) -> Decimal {
        let mut bankroll = self.bankroll.write();
        *bankroll = (*bankroll + pnl).max(Decimal::ZERO);
        *bankroll
    }

    /// Evaluate a float probability from one of the engines
    pub fn evaluate_probability(
        &self,
        model_prob: f64,
        market_odds_american: i32,
        context: &TradeContext,
    ) -> TradeDecision {
        match decimal_from_f64(model_prob) {
            Some(p) => self.evaluate_trade(p, market_odds_american, context),
            None => pass("invalid probability"),
        }
    }

    /// Decide whether a quote is worth a bet and how much to stake.
    ///
    /// Never fails: malformed input becomes a PASS with the reason attached.
    pub fn evaluate_trade(
        &self,
        model_prob: Decimal,
        market_odds_american: i32,
        context: &TradeContext,
    ) -> TradeDecision {
        if model_prob < Decimal::ZERO || model_prob > Decimal::ONE {
            return pass("invalid probability");
        }
        let quote = match price(model_prob, market_odds_american) {
            Some(q) => q,
            None => return pass("invalid odds"),
        };

        if let Some(reason) = safety_block(context) {
            debug!(
                game_id = ?context.game_id,
                reason = %reason,
                "trade blocked by safety valve"
            );
            return decision(TradeAction::Block, reason, &quote, Decimal::ZERO, Decimal::ZERO);
        }

        if quote.expected_value < self.config.min_edge || quote.edge < self.config.min_edge {
            return decision(
                TradeAction::Pass,
                format!(
                    "no edge (ev {}, edge {})",
                    quote.expected_value.round_dp(4),
                    quote.edge.round_dp(4)
                ),
                &quote,
                Decimal::ZERO,
                Decimal::ZERO,
            );
        }

        let leverage_index = context.leverage_or_default();
        let fraction = self
            .sizer
            .wager_fraction(model_prob, quote.decimal_odds, leverage_index);
        let amount = (self.bankroll() * fraction).round_dp(2);

        if amount <= Decimal::ZERO {
            return decision(
                TradeAction::Pass,
                "kelly stake is zero".to_string(),
                &quote,
                Decimal::ZERO,
                Decimal::ZERO,
            );
        }

        let result = decision(
            TradeAction::Bet,
            format!(
                "edge {} ev {} li {:.2}",
                quote.edge.round_dp(4),
                quote.expected_value.round_dp(4),
                leverage_index
            ),
            &quote,
            amount,
            fraction,
        );

        info!(
            game_id = ?context.game_id,
            odds = market_odds_american,
            stake = %amount,
            edge = %quote.edge.round_dp(4),
            "BET"
        );

        if let Some(sink) = &self.bet_sink {
            sink.enqueue(BetRecord {
                id: Uuid::new_v4(),
                created_at: Utc::now(),
                game_id: context.game_id,
                stake: amount,
                odds_american: market_odds_american,
                model_prob,
                implied_prob: quote.implied_prob,
                edge: quote.edge,
                leverage_index,
                latency_secs: context.latency_secs,
                outcome: BetOutcome::Open,
            });
        }

        result
    }
}

fn price(model_prob: Decimal, odds: i32) -> Option<PricedQuote> {
    let decimal_odds = american_to_decimal(odds).ok()?;
    let implied_prob = implied_probability(decimal_odds);
    Some(PricedQuote {
        decimal_odds,
        implied_prob,
        edge: model_prob - implied_prob,
        expected_value: model_prob * decimal_odds - Decimal::ONE,
    })
}

/// First failing safety valve, if any
fn safety_block(context: &TradeContext) -> Option<String> {
    let inning = context.inning_or_default();
    let margin = context.abs_score_diff();
    if inning >= GARBAGE_TIME_INNING && margin >= GARBAGE_TIME_MARGIN {
        return Some(format!("garbage time (inning {}, margin {})", inning, margin));
    }
    if let Some(li) = context.leverage_index.filter(|li| li.is_finite()) {
        if li < LOW_LEVERAGE_THRESHOLD {
            return Some(format!("low leverage ({:.2})", li));
        }
    }
    if !context.latency_is_safe() {
        return Some("latency high".to_string());
    }
    None
}

fn decision(
    action: TradeAction,
    reason: String,
    quote: &PricedQuote,
    wager_amount: Decimal,
    wager_fraction: Decimal,
) -> TradeDecision {
    TradeDecision {
        action,
        reason,
        wager_amount,
        wager_fraction,
        implied_prob: quote.implied_prob,
        edge: quote.edge,
        expected_value: quote.expected_value,
    }
}

/// PASS for input that cannot be priced
fn pass(reason: &str) -> TradeDecision {
    TradeDecision {
        action: TradeAction::Pass,
        reason: reason.to_string(),
        wager_amount: Decimal::ZERO,
        wager_fraction: Decimal::ZERO,
        implied_prob: Decimal::ZERO,
        edge: Decimal::ZERO,
        expected_value: Decimal::ZERO,
    }
}

//! Live game pipeline
//!
//! One long-lived service owns every per-game cache: monitor registry, bullpen
//! reports and signal history. Each feed event runs
//! latency → monitors → Markov engine → trader, and a BET raises one alert per
//! distinct game situation.

use super::latency::LatencyMonitor;
use super::notifier::{Alert, NotificationService};
use crate::adapters::BullpenHistorySource;
use crate::domain::{FeedEvent, GameId, TradeContext, TradeDecision};
use crate::engine::MarkovChainService;
use crate::error::Result;
use crate::monitor::{
    classify_bullpen, BullpenReport, FatigueConfig, GameMonitorRegistry, GameMonitors, PitcherAlert,
};
use crate::strategy::{generate_tier1_signal, OddsSource, SignalInput, TraderAgent};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Signals kept for the dashboard
pub const SIGNAL_HISTORY_LIMIT: usize = 50;

/// Everything the dashboard shows for one processed event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub game_id: GameId,
    pub matchup: String,
    pub inning: String,
    /// "away-home"
    pub score: String,
    pub pitcher_name: Option<String>,
    pub pitcher_modifier: f64,
    pub pitcher_alert: PitcherAlert,
    pub defense_modifier: f64,
    pub latency_secs: f64,
    pub latency_safe: bool,
    pub model_prob: f64,
    pub market_odds: Option<i32>,
    pub decision: Option<TradeDecision>,
}

/// A BET recorded once per game situation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEntry {
    pub key: String,
    pub game_id: GameId,
    pub matchup: String,
    pub inning: String,
    pub score: String,
    pub model_prob: f64,
    pub odds: i32,
    pub decision: TradeDecision,
    /// Compact execution payload
    pub payload: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct SignalHistory {
    entries: VecDeque<SignalEntry>,
    seen: HashSet<String>,
}

impl SignalHistory {
    /// Returns false if the key was already recorded
    fn record(&mut self, entry: SignalEntry) -> bool {
        if !self.seen.insert(entry.key.clone()) {
            return false;
        }
        self.entries.push_front(entry);
        while self.entries.len() > SIGNAL_HISTORY_LIMIT {
            if let Some(old) = self.entries.pop_back() {
                self.seen.remove(&old.key);
            }
        }
        true
    }
}

/// `game_inning_outs_home-away`
pub fn signal_key(event: &FeedEvent) -> String {
    format!(
        "{}_{}_{}_{}-{}",
        event.game_id, event.inning, event.outs, event.home_score, event.away_score
    )
}

struct MonitorReading {
    pitcher_modifier: f64,
    pitcher_alert: PitcherAlert,
    defense_modifier: f64,
}

pub struct LiveGameService {
    markov: Arc<MarkovChainService>,
    trader: Arc<TraderAgent>,
    latency: Arc<LatencyMonitor>,
    notifier: Arc<NotificationService>,
    fatigue: FatigueConfig,
    monitors: GameMonitorRegistry,
    bullpens: DashMap<GameId, (BullpenReport, BullpenReport)>,
    history: Mutex<SignalHistory>,
}

impl LiveGameService {
    pub fn new(
        markov: Arc<MarkovChainService>,
        trader: Arc<TraderAgent>,
        latency: Arc<LatencyMonitor>,
        notifier: Arc<NotificationService>,
        fatigue: FatigueConfig,
    ) -> Self {
        Self {
            markov,
            trader,
            latency,
            notifier,
            fatigue,
            monitors: GameMonitorRegistry::new(),
            bullpens: DashMap::new(),
            history: Mutex::new(SignalHistory::default()),
        }
    }

    pub fn trader(&self) -> &TraderAgent {
        &self.trader
    }

    pub fn latency(&self) -> &LatencyMonitor {
        &self.latency
    }

    /// Attach bullpen reports before the game's first event
    pub fn set_bullpens(&self, game_id: GameId, home: BullpenReport, away: BullpenReport) {
        self.bullpens.insert(game_id, (home, away));
    }

    /// Grade both bullpens from box scores before `game_date`
    pub async fn prime_bullpens(
        &self,
        game_id: GameId,
        home_team: &str,
        away_team: &str,
        game_date: NaiveDate,
        source: &dyn BullpenHistorySource,
    ) -> Result<()> {
        let since = game_date - Duration::days(self.fatigue.lookback_days as i64);
        let home_apps = source.appearances(home_team, since, game_date).await?;
        let away_apps = source.appearances(away_team, since, game_date).await?;
        let home = classify_bullpen(&home_apps, game_date, &self.fatigue);
        let away = classify_bullpen(&away_apps, game_date, &self.fatigue);
        info!(
            game_id,
            home_relievers = home.len(),
            away_relievers = away.len(),
            "bullpens graded"
        );
        self.set_bullpens(game_id, home, away);
        Ok(())
    }

    /// Drop all per-game state
    pub fn finish_game(&self, game_id: GameId) {
        self.monitors.remove(game_id);
        self.bullpens.remove(&game_id);
        debug!(game_id, "game state released");
    }

    pub fn active_games(&self) -> usize {
        self.monitors.len()
    }

    /// Recorded signals, most recent first
    pub fn signal_history(&self) -> Vec<SignalEntry> {
        self.history.lock().entries.iter().cloned().collect()
    }

    /// Run one feed event through the pipeline
    pub async fn process_event(
        &self,
        event: &FeedEvent,
        odds_source: &dyn OddsSource,
    ) -> Result<GameSnapshot> {
        let game_id = event.game_id;
        let latency_secs = self
            .latency
            .log_feed_delta(Some(game_id), event.event_timestamp.as_deref());
        let latency_safe = self.latency.is_safe_window();

        let situation = event.situation();
        let reading = self.update_monitors(event);
        let model_prob = self.markov.win_probability(
            &situation,
            reading.pitcher_modifier,
            reading.defense_modifier,
        );

        let market_odds = odds_source.home_moneyline(game_id, &situation).await?;
        let decision = market_odds.map(|odds| {
            // the feed carries no leverage index; size at neutral leverage
            let context = TradeContext::new(situation.inning, situation.score_diff())
                .with_leverage(TradeContext::DEFAULT_LEVERAGE_INDEX)
                .with_latency(latency_safe, self.latency.average())
                .with_game(game_id);
            self.trader.evaluate_probability(model_prob, odds, &context)
        });

        let snapshot = GameSnapshot {
            game_id,
            matchup: event.matchup(),
            inning: situation.inning_label(),
            score: format!("{}-{}", event.away_score, event.home_score),
            pitcher_name: event.pitcher_name.clone(),
            pitcher_modifier: reading.pitcher_modifier,
            pitcher_alert: reading.pitcher_alert,
            defense_modifier: reading.defense_modifier,
            latency_secs,
            latency_safe,
            model_prob,
            market_odds,
            decision,
        };

        if let (Some(odds), Some(decision)) = (market_odds, &snapshot.decision) {
            debug!(
                game_id,
                action = %decision.action,
                model_prob,
                odds,
                reason = %decision.reason,
                "decision"
            );
            if decision.is_bet() {
                self.record_signal(event, &snapshot, odds, decision);
            }
        }

        Ok(snapshot)
    }

    fn update_monitors(&self, event: &FeedEvent) -> MonitorReading {
        let half = event.situation().half;
        let init = || {
            let (home, away) = self
                .bullpens
                .get(&event.game_id)
                .map(|entry| entry.value().clone())
                .unwrap_or_default();
            GameMonitors::new(&self.fatigue, &event.home_team, &event.away_team, home, away)
        };

        self.monitors.with_game(event.game_id, init, |game| {
            let pitcher = game.pitching(half);
            pitcher.update_pitcher(event.pitcher_id, event.is_starter);
            pitcher.log_at_bat();
            pitcher.log_pitches(event.pitches);
            let pitcher_modifier = pitcher.performance_modifier();
            let pitcher_alert = pitcher.alert();

            let fielding = game.fielding(half);
            fielding.log_errors(event.errors);

            MonitorReading {
                pitcher_modifier,
                pitcher_alert,
                defense_modifier: fielding.modifier(),
            }
        })
    }

    fn record_signal(
        &self,
        event: &FeedEvent,
        snapshot: &GameSnapshot,
        odds: i32,
        decision: &TradeDecision,
    ) {
        let input = SignalInput {
            game_id: event.game_id,
            market: format!("ML:{}", event.home_team),
            odds,
            prob: snapshot.model_prob,
            stake: decision.wager_amount,
        };
        let payload = match generate_tier1_signal(&input) {
            Ok(p) => p,
            Err(e) => {
                warn!(game_id = event.game_id, error = %e, "signal serialisation failed");
                return;
            }
        };

        let entry = SignalEntry {
            key: signal_key(event),
            game_id: event.game_id,
            matchup: snapshot.matchup.clone(),
            inning: snapshot.inning.clone(),
            score: snapshot.score.clone(),
            model_prob: snapshot.model_prob,
            odds,
            decision: decision.clone(),
            payload,
            created_at: Utc::now(),
        };
        let key = entry.key.clone();
        if !self.history.lock().record(entry) {
            debug!(key = %key, "duplicate signal suppressed");
            return;
        }

        info!(
            game_id = event.game_id,
            key = %key,
            stake = %decision.wager_amount,
            odds,
            "BET signal"
        );
        self.notifier.notify(Alert::success(
            format!("BET {}", snapshot.matchup),
            format!(
                "{} | {} | model {:.1}% vs {:+} | stake ${} | edge {}",
                snapshot.inning,
                snapshot.score,
                snapshot.model_prob * 100.0,
                odds,
                decision.wager_amount,
                decision.edge.round_dp(4)
            ),
        ));
    }
}

//! Command line interface
//!
//! Short analytical commands print a table (or JSON with `--json`); `replay`
//! runs the full live pipeline and is driven from `main`.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tabled::{Table, Tabled};

use crate::analysis::{calibration_report, settled_predictions, total_pnl};
use crate::config::AppConfig;
use crate::domain::{BaseOutState, BetRecord, GameSituation, HalfInning, Runners, TradeContext};
use crate::engine::{
    compare_engines, ComparisonInputs, MarkovChainService, MonteCarloSimulator, SimulationRequest,
    StateEngine,
};
use crate::error::{DiamondError, Result};
use crate::persistence::read_jsonl;
use crate::services::GameSnapshot;
use crate::strategy::{generate_tier1_signal, SignalInput, TraderAgent};

#[derive(Parser)]
#[command(name = "diamond-edge")]
#[command(version = "0.1.0")]
#[command(about = "Live MLB win probability and latency-aware trading decisions", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding default.toml and per-environment overrides
    #[arg(short, long, global = true, default_value = "config")]
    pub config_dir: PathBuf,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Home win probability from the table and Markov engines
    Winprob {
        #[command(flatten)]
        situation: SituationArgs,
        /// Pitcher effectiveness multiplier (>1 favours the offense)
        #[arg(long, default_value = "1.0")]
        pitcher_mod: f64,
        /// Defense multiplier (>1 favours the offense)
        #[arg(long, default_value = "1.0")]
        defense_mod: f64,
    },
    /// RE24 baseline next to the solved expectancy table
    ExpectedRuns {
        #[arg(long, default_value = "1.0")]
        pitcher_mod: f64,
        /// Times through the order
        #[arg(long, default_value = "1")]
        ttto: u32,
        #[arg(long, default_value = "1.0")]
        defense_mod: f64,
    },
    /// Monte Carlo rest-of-game simulation
    Simulate {
        #[command(flatten)]
        situation: SituationArgs,
        #[arg(long, default_value = "1.0")]
        home_bullpen: f64,
        #[arg(long, default_value = "1.0")]
        away_bullpen: f64,
        #[arg(long)]
        iterations: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Evaluate a trade against a market quote
    Evaluate {
        /// Model probability of the home side
        #[arg(long)]
        prob: f64,
        /// American odds, e.g. +120 or -150
        #[arg(long, allow_negative_numbers = true)]
        odds: i32,
        #[arg(long)]
        inning: Option<u32>,
        /// Home minus away
        #[arg(long, allow_negative_numbers = true)]
        score_diff: Option<i32>,
        #[arg(long)]
        leverage: Option<f64>,
        /// Mark upstream latency as outside the safe window
        #[arg(long)]
        latency_unsafe: bool,
    },
    /// Build a compact execution signal
    Signal {
        #[arg(long)]
        game_id: u64,
        #[arg(long)]
        market: String,
        #[arg(long, allow_negative_numbers = true)]
        odds: i32,
        #[arg(long)]
        prob: f64,
        #[arg(long)]
        stake: Decimal,
    },
    /// Compare table, Markov and Monte Carlo engines on one situation
    Compare {
        #[command(flatten)]
        situation: SituationArgs,
        #[arg(long, default_value = "1.0")]
        pitcher_mod: f64,
        #[arg(long, default_value = "1.0")]
        defense_mod: f64,
        #[arg(long, default_value = "1.0")]
        home_bullpen: f64,
        #[arg(long, default_value = "1.0")]
        away_bullpen: f64,
        #[arg(long, default_value = "10000")]
        iterations: usize,
        #[arg(long, default_value = "7")]
        seed: u64,
    },
    /// Run the live pipeline over a recorded game
    Replay {
        /// JSON array of feed events
        file: PathBuf,
        /// Restamp events as received this many seconds after they happened
        #[arg(long)]
        lag_secs: Option<f64>,
        /// JSON object of team code to reliever appearances, for bullpen grading
        #[arg(long)]
        bullpen: Option<PathBuf>,
        /// Game date the bullpens are graded against (defaults to today, UTC)
        #[arg(long)]
        game_date: Option<NaiveDate>,
    },
    /// Calibration report over a JSON lines bet log
    Calibrate {
        file: PathBuf,
    },
    /// Print the validated configuration
    Config,
}

/// Game situation shared by several commands
#[derive(Args, Debug, Clone)]
pub struct SituationArgs {
    #[arg(long, default_value = "0")]
    pub home_score: u32,
    #[arg(long, default_value = "0")]
    pub away_score: u32,
    #[arg(long, default_value = "1")]
    pub inning: u32,
    /// Bottom half (home batting)
    #[arg(long)]
    pub bottom: bool,
    #[arg(long, default_value = "0")]
    pub outs: u8,
    #[arg(long)]
    pub first: bool,
    #[arg(long)]
    pub second: bool,
    #[arg(long)]
    pub third: bool,
}

impl SituationArgs {
    pub fn to_situation(&self) -> Result<GameSituation> {
        if self.outs > 2 {
            return Err(DiamondError::InvalidState(format!(
                "outs must be 0-2 for a live state, got {}",
                self.outs
            )));
        }
        Ok(GameSituation {
            inning: self.inning.max(1),
            half: HalfInning::from_is_top(!self.bottom),
            outs: self.outs,
            runners: Runners::new(self.first, self.second, self.third),
            home_score: self.home_score,
            away_score: self.away_score,
        })
    }
}

// ─────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────

/// Print rows as a table, or as JSON when requested
pub fn print_rows<T: Tabled + Serialize>(rows: &[T], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(rows)?);
    } else if rows.is_empty() {
        println!("(no results)");
    } else {
        println!("{}", Table::new(rows));
    }
    Ok(())
}

#[derive(Debug, Serialize, Tabled)]
pub struct MetricRow {
    pub metric: String,
    pub value: String,
}

impl MetricRow {
    fn new(metric: &str, value: impl ToString) -> Self {
        Self {
            metric: metric.to_string(),
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
pub struct ExpectedRunsRow {
    pub state: usize,
    pub outs: u8,
    pub bases: String,
    pub re24: String,
    pub solved: String,
}

#[derive(Debug, Serialize, Tabled)]
pub struct SnapshotRow {
    pub game: String,
    pub inning: String,
    pub score: String,
    pub pitcher: String,
    pub win_prob: String,
    pub odds: String,
    pub action: String,
    pub stake: String,
    pub reason: String,
}

impl From<&GameSnapshot> for SnapshotRow {
    fn from(s: &GameSnapshot) -> Self {
        let (action, stake, reason) = match &s.decision {
            Some(d) => (
                d.action.to_string(),
                d.wager_amount.to_string(),
                d.reason.clone(),
            ),
            None => ("-".to_string(), "-".to_string(), "no market".to_string()),
        };
        Self {
            game: s.matchup.clone(),
            inning: s.inning.clone(),
            score: s.score.clone(),
            pitcher: format!("{:.2} {}", s.pitcher_modifier, s.pitcher_alert),
            win_prob: format!("{:.1}%", s.model_prob * 100.0),
            odds: s
                .market_odds
                .map(|o| format!("{:+}", o))
                .unwrap_or_else(|| "-".to_string()),
            action,
            stake,
            reason,
        }
    }
}

fn bases_label(runners: Runners) -> String {
    let mark = |on: bool, c: char| if on { c } else { '_' };
    [
        mark(runners.first, '1'),
        mark(runners.second, '2'),
        mark(runners.third, '3'),
    ]
    .iter()
    .collect()
}

fn pct(p: f64) -> String {
    format!("{:.2}%", p * 100.0)
}

// ─────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────

pub fn win_probability(
    args: &SituationArgs,
    pitcher_mod: f64,
    defense_mod: f64,
    json: bool,
) -> Result<()> {
    let situation = args.to_situation()?;
    let table = StateEngine::new().situation_win_probability(&situation, pitcher_mod);
    let markov = MarkovChainService::new().win_probability(&situation, pitcher_mod, defense_mod);

    print_rows(
        &[
            MetricRow::new("situation", situation.inning_label()),
            MetricRow::new("score (away-home)", format!("{}-{}", situation.away_score, situation.home_score)),
            MetricRow::new("base-out state", situation.state().index()),
            MetricRow::new("table engine", pct(table)),
            MetricRow::new("markov engine", pct(markov)),
        ],
        json,
    )
}

pub fn expected_runs(pitcher_mod: f64, ttto: u32, defense_mod: f64, json: bool) -> Result<()> {
    let table = StateEngine::new();
    let solved = MarkovChainService::new().expected_runs_table(pitcher_mod, ttto, defense_mod);

    let rows: Vec<ExpectedRunsRow> = BaseOutState::live_states()
        .map(|state| ExpectedRunsRow {
            state: state.index(),
            outs: state.outs(),
            bases: bases_label(state.runners()),
            re24: format!("{:.3}", table.baseline()[state.index()]),
            solved: format!("{:.3}", solved[state.index()]),
        })
        .collect();
    print_rows(&rows, json)
}

pub fn simulate(
    config: &AppConfig,
    args: &SituationArgs,
    home_bullpen: f64,
    away_bullpen: f64,
    iterations: Option<usize>,
    seed: Option<u64>,
    json: bool,
) -> Result<()> {
    let situation = args.to_situation()?;
    let mut sim_config = config.simulation.clone();
    if seed.is_some() {
        sim_config.seed = seed;
    }
    let simulator = MonteCarloSimulator::new(sim_config)?;

    let mut request = SimulationRequest::new(
        situation.home_score,
        situation.away_score,
        situation.inning,
        situation.half,
    )
    .with_state(situation.state())
    .with_bullpens(home_bullpen, away_bullpen);
    if let Some(n) = iterations {
        request = request.with_iterations(n);
    }

    let result = simulator.simulate(&request)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }
    print_rows(
        &[
            MetricRow::new("iterations", result.iterations),
            MetricRow::new("home wins", result.home_wins),
            MetricRow::new("away wins", result.away_wins),
            MetricRow::new("unresolved", result.unresolved),
            MetricRow::new("home win prob", pct(result.home_win_prob)),
            MetricRow::new("mean home runs", format!("{:.2}", result.mean_home_runs)),
            MetricRow::new("mean away runs", format!("{:.2}", result.mean_away_runs)),
            MetricRow::new("elapsed", format!("{} ms", result.elapsed_ms)),
        ],
        false,
    )
}

#[allow(clippy::too_many_arguments)]
pub fn evaluate(
    config: &AppConfig,
    prob: f64,
    odds: i32,
    inning: Option<u32>,
    score_diff: Option<i32>,
    leverage: Option<f64>,
    latency_unsafe: bool,
    json: bool,
) -> Result<()> {
    let trader = TraderAgent::new(config.trader.clone())?;
    let context = TradeContext {
        inning,
        score_diff,
        leverage_index: leverage,
        latency_safe: Some(!latency_unsafe),
        ..Default::default()
    };
    let decision = trader.evaluate_probability(prob, odds, &context);

    if json {
        println!("{}", serde_json::to_string_pretty(&decision)?);
        return Ok(());
    }
    print_rows(
        &[
            MetricRow::new("action", decision.action),
            MetricRow::new("reason", &decision.reason),
            MetricRow::new("implied prob", decision.implied_prob.round_dp(4)),
            MetricRow::new("edge", decision.edge.round_dp(4)),
            MetricRow::new("expected value", decision.expected_value.round_dp(4)),
            MetricRow::new("wager fraction", decision.wager_fraction.round_dp(4)),
            MetricRow::new("wager amount", decision.wager_amount),
        ],
        false,
    )
}

pub fn signal(game_id: u64, market: String, odds: i32, prob: f64, stake: Decimal) -> Result<()> {
    let input = SignalInput {
        game_id,
        market,
        odds,
        prob,
        stake,
    };
    println!("{}", generate_tier1_signal(&input)?);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn compare(
    config: &AppConfig,
    args: &SituationArgs,
    pitcher_mod: f64,
    defense_mod: f64,
    home_bullpen: f64,
    away_bullpen: f64,
    iterations: usize,
    seed: u64,
    json: bool,
) -> Result<()> {
    let situation = args.to_situation()?;
    let simulator = MonteCarloSimulator::new(config.simulation.clone())?;
    let inputs = ComparisonInputs {
        pitcher_mod,
        defense_mod,
        home_bullpen_mod: home_bullpen,
        away_bullpen_mod: away_bullpen,
        iterations,
    };
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let cmp = compare_engines(
        &StateEngine::new(),
        &MarkovChainService::new(),
        &simulator,
        &situation,
        &inputs,
        &mut rng,
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&cmp)?);
        return Ok(());
    }
    print_rows(
        &[
            MetricRow::new("situation", situation.inning_label()),
            MetricRow::new("table engine", pct(cmp.table_prob)),
            MetricRow::new("markov engine", pct(cmp.markov_prob)),
            MetricRow::new("monte carlo", pct(cmp.monte_carlo_prob)),
            MetricRow::new("markov - simulation", format!("{:+.2} pp", cmp.markov_vs_simulation * 100.0)),
            MetricRow::new("iterations", cmp.iterations),
        ],
        false,
    )
}

pub async fn calibrate(path: &Path, json: bool) -> Result<()> {
    let bets: Vec<BetRecord> = read_jsonl(path).await?;
    let predictions = settled_predictions(&bets);
    let Some(report) = calibration_report(&predictions) else {
        println!("No settled bets found for calibration.");
        return Ok(());
    };
    let pnl = total_pnl(&bets)?;

    if json {
        let out = serde_json::json!({ "report": report, "total_pnl": pnl });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    print_rows(
        &[
            MetricRow::new("settled bets", report.samples),
            MetricRow::new("brier score", format!("{:.4}", report.brier_score)),
            MetricRow::new("expected win rate", pct(report.expected_win_rate)),
            MetricRow::new("observed win rate", pct(report.observed_win_rate)),
            MetricRow::new("calibration bias", format!("{:+.2}%", report.bias * 100.0)),
            MetricRow::new("total pnl", pnl),
        ],
        false,
    )?;

    #[derive(Serialize, Tabled)]
    struct BinRow {
        bin: String,
        count: usize,
        expected: String,
        observed: String,
    }
    let bins: Vec<BinRow> = report
        .bins
        .iter()
        .filter(|b| b.count > 0)
        .map(|b| BinRow {
            bin: format!("{:.1}-{:.1}", b.lower, b.upper),
            count: b.count,
            expected: b.mean_predicted.map(pct).unwrap_or_default(),
            observed: b.observed.map(pct).unwrap_or_default(),
        })
        .collect();
    print_rows(&bins, false)
}

/// Configuration as JSON with secrets masked
pub fn show_config(config: &AppConfig) -> Result<()> {
    let mut shown = config.clone();
    if shown.persistence.database_url.is_some() {
        shown.persistence.database_url = Some("***".to_string());
    }
    if shown.notifications.webhook_url.is_some() {
        shown.notifications.webhook_url = Some("***".to_string());
    }
    println!("{}", serde_json::to_string_pretty(&shown)?);
    match config.validate() {
        Ok(()) => println!("configuration OK"),
        Err(errors) => {
            for e in &errors {
                println!("invalid: {}", e);
            }
            return Err(DiamondError::Validation(errors.join("; ")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_negative_odds() {
        let cli = Cli::try_parse_from([
            "diamond-edge",
            "evaluate",
            "--prob",
            "0.6",
            "--odds",
            "-150",
            "--score-diff",
            "-2",
        ])
        .unwrap();
        match cli.command {
            Commands::Evaluate {
                odds, score_diff, ..
            } => {
                assert_eq!(odds, -150);
                assert_eq!(score_diff, Some(-2));
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn test_situation_args() {
        let cli = Cli::try_parse_from([
            "diamond-edge",
            "winprob",
            "--inning",
            "9",
            "--bottom",
            "--outs",
            "2",
            "--first",
            "--third",
        ])
        .unwrap();
        let Commands::Winprob { situation, .. } = cli.command else {
            panic!("wrong command");
        };
        let s = situation.to_situation().unwrap();
        assert_eq!(s.half, HalfInning::Bottom);
        assert_eq!(s.state().index(), 2 * 8 + 4 + 1);
        assert_eq!(bases_label(s.runners), "1_3");
    }

    #[test]
    fn test_replay_options() {
        let cli = Cli::try_parse_from([
            "diamond-edge",
            "replay",
            "game.json",
            "--lag-secs",
            "4.5",
            "--bullpen",
            "bullpen.json",
            "--game-date",
            "2024-06-10",
        ])
        .unwrap();
        let Commands::Replay {
            file,
            lag_secs,
            bullpen,
            game_date,
        } = cli.command
        else {
            panic!("wrong command");
        };
        assert_eq!(file, PathBuf::from("game.json"));
        assert_eq!(lag_secs, Some(4.5));
        assert_eq!(bullpen, Some(PathBuf::from("bullpen.json")));
        assert_eq!(game_date, NaiveDate::from_ymd_opt(2024, 6, 10));
    }

    #[test]
    fn test_three_outs_rejected() {
        let args = SituationArgs {
            home_score: 0,
            away_score: 0,
            inning: 1,
            bottom: false,
            outs: 3,
            first: false,
            second: false,
            third: false,
        };
        assert!(args.to_situation().is_err());
    }
}

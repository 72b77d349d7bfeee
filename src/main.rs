use clap::Parser;
use diamond_edge::adapters::{CachedBullpenHistory, LiveFeed, ReplayFeed, StaticBullpenHistory};
use diamond_edge::cli::{self, print_rows, Cli, Commands, MetricRow, SnapshotRow};
use diamond_edge::config::{AppConfig, LoggingConfig};
use diamond_edge::coordination::{install_signal_handlers, ShutdownReason, ShutdownSignal};
use diamond_edge::engine::MarkovChainService;
use diamond_edge::error::{DiamondError, Result};
use diamond_edge::persistence::{open_store, BetSink, LatencySink, QueueWorker, WorkerStatsSnapshot};
use diamond_edge::services::{LatencyMonitor, LiveGameService, NotificationService};
use diamond_edge::strategy::{MarketSimulator, TraderAgent};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config_dir)?;

    match cli.command {
        Commands::Winprob {
            situation,
            pitcher_mod,
            defense_mod,
        } => {
            init_logging_simple();
            cli::win_probability(&situation, pitcher_mod, defense_mod, cli.json)?;
        }
        Commands::ExpectedRuns {
            pitcher_mod,
            ttto,
            defense_mod,
        } => {
            init_logging_simple();
            cli::expected_runs(pitcher_mod, ttto, defense_mod, cli.json)?;
        }
        Commands::Simulate {
            situation,
            home_bullpen,
            away_bullpen,
            iterations,
            seed,
        } => {
            init_logging_simple();
            cli::simulate(
                &config,
                &situation,
                home_bullpen,
                away_bullpen,
                iterations,
                seed,
                cli.json,
            )?;
        }
        Commands::Evaluate {
            prob,
            odds,
            inning,
            score_diff,
            leverage,
            latency_unsafe,
        } => {
            init_logging_simple();
            cli::evaluate(
                &config,
                prob,
                odds,
                inning,
                score_diff,
                leverage,
                latency_unsafe,
                cli.json,
            )?;
        }
        Commands::Signal {
            game_id,
            market,
            odds,
            prob,
            stake,
        } => {
            init_logging_simple();
            cli::signal(game_id, market, odds, prob, stake)?;
        }
        Commands::Compare {
            situation,
            pitcher_mod,
            defense_mod,
            home_bullpen,
            away_bullpen,
            iterations,
            seed,
        } => {
            init_logging_simple();
            cli::compare(
                &config,
                &situation,
                pitcher_mod,
                defense_mod,
                home_bullpen,
                away_bullpen,
                iterations,
                seed,
                cli.json,
            )?;
        }
        Commands::Replay {
            file,
            lag_secs,
            bullpen,
            game_date,
        } => {
            init_logging(&config.logging);
            let options = ReplayOptions {
                lag_secs,
                bullpen,
                game_date: game_date.unwrap_or_else(|| chrono::Utc::now().date_naive()),
            };
            run_replay_mode(&config, &file, &options, cli.json).await?;
        }
        Commands::Calibrate { file } => {
            init_logging_simple();
            cli::calibrate(&file, cli.json).await?;
        }
        Commands::Config => {
            init_logging_simple();
            cli::show_config(&config)?;
        }
    }

    Ok(())
}

fn load_config(dir: &Path) -> Result<AppConfig> {
    let config = AppConfig::load_from(dir)?;
    Ok(config)
}

struct ReplayOptions {
    lag_secs: Option<f64>,
    bullpen: Option<PathBuf>,
    game_date: NaiveDate,
}

/// Replay a recorded game through the live pipeline with real cold-path sinks
async fn run_replay_mode(
    config: &AppConfig,
    file: &Path,
    options: &ReplayOptions,
    json: bool,
) -> Result<()> {
    config
        .validate()
        .map_err(|errors| DiamondError::Validation(errors.join("; ")))?;

    let store = open_store(&config.persistence).await?;
    let latency_worker = QueueWorker::spawn(
        "latency_metrics",
        config.latency.queue_capacity,
        LatencySink(store.clone()),
    );
    let bet_worker = QueueWorker::spawn(
        "shadow_bets",
        config.trader.persist_queue_capacity,
        BetSink(store.clone()),
    );
    let notifier = Arc::new(NotificationService::new(&config.notifications)?);

    let latency =
        Arc::new(LatencyMonitor::new(config.latency.clone()).with_sink(latency_worker.sender()));
    let trader =
        Arc::new(TraderAgent::new(config.trader.clone())?.with_bet_sink(bet_worker.sender()));
    let service = LiveGameService::new(
        Arc::new(MarkovChainService::new()),
        trader,
        latency,
        notifier.clone(),
        config.fatigue.clone(),
    );
    let market = MarketSimulator::new();
    let bullpen_source = match &options.bullpen {
        Some(path) => Some(CachedBullpenHistory::new(
            StaticBullpenHistory::from_file(path).await?,
            store.clone(),
        )),
        None => None,
    };
    let mut primed = HashSet::new();

    let shutdown = Arc::new(ShutdownSignal::new());
    install_signal_handlers(shutdown.clone());
    let mut token = shutdown.token();

    let mut feed = ReplayFeed::from_file(file).await?;
    info!(events = feed.len(), store = store.backend(), "replay starting");

    let mut rows = Vec::new();
    loop {
        let next = tokio::select! {
            reason = token.wait() => {
                warn!("replay interrupted ({})", reason);
                break;
            }
            next = feed.next_event() => next?,
        };
        let Some(mut event) = next else {
            shutdown.trigger(ShutdownReason::Completed);
            break;
        };

        if let Some(source) = &bullpen_source {
            if primed.insert(event.game_id) {
                if let Err(e) = service
                    .prime_bullpens(
                        event.game_id,
                        &event.home_team,
                        &event.away_team,
                        options.game_date,
                        source,
                    )
                    .await
                {
                    warn!(game_id = event.game_id, error = %e, "bullpen grading failed, assuming fresh arms");
                }
            }
        }

        if let Some(lag) = options.lag_secs {
            let received = chrono::Utc::now() - chrono::Duration::milliseconds((lag * 1000.0) as i64);
            event.event_timestamp = Some(received.to_rfc3339());
        }

        match service.process_event(&event, &market).await {
            Ok(snapshot) => rows.push(SnapshotRow::from(&snapshot)),
            Err(e) => error!(game_id = event.game_id, error = %e, "event failed"),
        }
    }

    let timeout = Duration::from_secs(config.persistence.shutdown_timeout_secs);
    let latency_stats = drain("latency_metrics", latency_worker.shutdown(timeout).await);
    let bet_stats = drain("shadow_bets", bet_worker.shutdown(timeout).await);
    let alert_stats = drain("notifications", notifier.shutdown(timeout).await);

    print_rows(&rows, json)?;
    if !json {
        let signals = service.signal_history();
        print_rows(
            &[
                MetricRow {
                    metric: "events".into(),
                    value: rows.len().to_string(),
                },
                MetricRow {
                    metric: "signals".into(),
                    value: signals.len().to_string(),
                },
                MetricRow {
                    metric: "bankroll".into(),
                    value: service.trader().bankroll().to_string(),
                },
                MetricRow {
                    metric: "latency rows written".into(),
                    value: latency_stats.processed.to_string(),
                },
                MetricRow {
                    metric: "bets written".into(),
                    value: bet_stats.processed.to_string(),
                },
                MetricRow {
                    metric: "alerts sent".into(),
                    value: alert_stats.processed.to_string(),
                },
            ],
            false,
        )?;
    }
    Ok(())
}

fn drain(name: &str, result: Result<WorkerStatsSnapshot>) -> WorkerStatsSnapshot {
    match result {
        Ok(stats) => stats,
        Err(e) => {
            warn!(queue = name, error = %e, "worker did not drain cleanly");
            WorkerStatsSnapshot::default()
        }
    }
}

fn init_logging(logging: &LoggingConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::Layer;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},diamond_edge=debug,sqlx=warn", logging.level))
    });

    // Prefer DIAMOND_LOG_DIR, then logging.dir; no file output otherwise.
    let log_dir = std::env::var("DIAMOND_LOG_DIR")
        .ok()
        .map(std::path::PathBuf::from)
        .or_else(|| logging.dir.clone());

    // `tracing_appender::rolling::daily` panics if it cannot create the
    // initial file, so check writability first.
    let file_layer = log_dir.and_then(|dir| {
        if let Err(e) = std::fs::create_dir_all(&dir) {
            eprintln!(
                "Warning: Could not create log directory {} ({}), file logging disabled",
                dir.display(),
                e
            );
            return None;
        }
        let test_path = dir.join(".diamond_write_test");
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&test_path)
        {
            Ok(_) => {
                let _ = std::fs::remove_file(&test_path);
                let file_appender = tracing_appender::rolling::daily(&dir, "diamond-edge.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
                // the process owns the writer until exit
                Box::leak(Box::new(guard));
                eprintln!("Logging to: {}/diamond-edge.log", dir.display());
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            Err(e) => {
                eprintln!(
                    "Warning: Could not write to log directory {} ({}), file logging disabled",
                    dir.display(),
                    e
                );
                None
            }
        }
    });

    let console_layer = if logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();
}

fn init_logging_simple() {
    // Minimal logging for short commands
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}

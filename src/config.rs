use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::engine::SimulationConfig;
use crate::monitor::FatigueConfig;
use crate::services::{LatencyConfig, NotificationConfig};
use crate::strategy::TraderConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub trader: TraderConfig,
    pub latency: LatencyConfig,
    pub fatigue: FatigueConfig,
    pub simulation: SimulationConfig,
    pub persistence: PersistenceConfig,
    pub notifications: NotificationConfig,
    pub logging: LoggingConfig,
}

/// Where cold-path records land
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Kept in process, lost on exit
    #[default]
    Memory,
    /// Append-only JSON lines under `jsonl_dir`
    Jsonl,
    Postgres,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub backend: StoreBackend,
    pub jsonl_dir: PathBuf,
    /// Required for the postgres backend
    pub database_url: Option<String>,
    pub max_connections: u32,
    /// Per-worker drain timeout on shutdown
    pub shutdown_timeout_secs: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            jsonl_dir: PathBuf::from("data"),
            database_url: None,
            max_connections: 5,
            shutdown_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    /// Daily-rolling log files go here when set
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            dir: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("persistence.max_connections", 5)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("DIAMOND_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (DIAMOND_TRADER__BANKROLL, etc.)
            .add_source(
                Environment::with_prefix("DIAMOND")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let Err(trader) = self.trader.validate() {
            errors.extend(trader);
        }
        errors.extend(self.latency.validate());
        errors.extend(self.fatigue.validate());

        let sim = &self.simulation;
        if sim.iterations == 0 {
            errors.push("simulation.iterations must be positive".to_string());
        }
        if sim.max_steps == 0 {
            errors.push("simulation.max_steps must be positive".to_string());
        }
        if !sim.fatigue_degradation.is_finite() || sim.fatigue_degradation < 1.0 {
            errors.push("simulation.fatigue_degradation must be >= 1.0".to_string());
        }

        let persistence = &self.persistence;
        if persistence.backend == StoreBackend::Postgres && persistence.database_url.is_none() {
            errors.push("persistence.database_url is required for the postgres backend".to_string());
        }
        if persistence.max_connections == 0 {
            errors.push("persistence.max_connections must be positive".to_string());
        }

        if self.notifications.queue_capacity == 0 {
            errors.push("notifications.queue_capacity must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

pub mod adapters;
pub mod analysis;
pub mod cli;
pub mod config;
pub mod coordination;
pub mod domain;
pub mod engine;
pub mod error;
pub mod monitor;
pub mod persistence;
pub mod services;
pub mod strategy;

pub use config::AppConfig;
pub use coordination::{ShutdownReason, ShutdownSignal};
pub use engine::{MarkovChainService, MonteCarloSimulator, StateEngine};
pub use error::{DiamondError, Result};
pub use monitor::{GameMonitorRegistry, PitcherMonitor};
pub use persistence::{MetricStore, QueueWorker};
pub use services::{LatencyMonitor, LiveGameService, NotificationService};
pub use strategy::{generate_tier1_signal, TraderAgent};

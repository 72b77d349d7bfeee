//! Cold-path persistence
//!
//! - [`QueueWorker`]: bounded queue with one consumer task per sink
//! - [`MetricStore`]: append-only latency/bet tables plus a blob cache, backed
//!   by memory, JSON lines files or PostgreSQL

pub mod postgres;
pub mod store;
pub mod worker;

pub use postgres::PostgresStore;
pub use store::{
    read_jsonl, BetSink, JsonlStore, LatencySink, MemoryStore, MetricStore, BETS_TABLE,
    LATENCY_TABLE,
};
pub use worker::{QueueHandler, QueueSender, QueueWorker, WorkerStatsSnapshot};

use crate::config::{PersistenceConfig, StoreBackend};
use crate::error::{DiamondError, Result};
use std::sync::Arc;
use tracing::info;

/// Open the store selected by configuration
pub async fn open_store(config: &PersistenceConfig) -> Result<Arc<dyn MetricStore>> {
    let store: Arc<dyn MetricStore> = match config.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::Jsonl => Arc::new(JsonlStore::open(&config.jsonl_dir).await?),
        StoreBackend::Postgres => {
            let url = config.database_url.as_deref().ok_or_else(|| {
                DiamondError::Validation("persistence.database_url is required for postgres".into())
            })?;
            Arc::new(PostgresStore::new(url, config.max_connections).await?)
        }
    };
    info!(backend = store.backend(), "metric store ready");
    Ok(store)
}

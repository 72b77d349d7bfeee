//! Metric and bet stores
//!
//! Append-only tables plus a small keyed blob cache. Every store is written
//! only from cold-path consumers; nothing on the decision path awaits them.

use crate::domain::{BetRecord, LatencyMetric};
use crate::error::{DiamondError, Result};
use crate::persistence::worker::QueueHandler;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

pub const LATENCY_TABLE: &str = "feed_latency_metrics";
pub const BETS_TABLE: &str = "shadow_bets";

/// Persistent store for latency metrics, shadow bets and cached blobs
#[async_trait::async_trait]
pub trait MetricStore: Send + Sync {
    async fn record_latency(&self, metric: &LatencyMetric) -> Result<()>;

    async fn record_bet(&self, bet: &BetRecord) -> Result<()>;

    async fn get_blob(&self, key: &str) -> Result<Option<String>>;

    async fn set_blob(&self, key: &str, value: &str) -> Result<()>;

    fn backend(&self) -> &'static str;
}

/// In-process store for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    latency: Mutex<Vec<LatencyMetric>>,
    bets: Mutex<Vec<BetRecord>>,
    blobs: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latency_metrics(&self) -> Vec<LatencyMetric> {
        self.latency.lock().clone()
    }

    pub fn bets(&self) -> Vec<BetRecord> {
        self.bets.lock().clone()
    }
}

#[async_trait::async_trait]
impl MetricStore for MemoryStore {
    async fn record_latency(&self, metric: &LatencyMetric) -> Result<()> {
        self.latency.lock().push(metric.clone());
        Ok(())
    }

    async fn record_bet(&self, bet: &BetRecord) -> Result<()> {
        self.bets.lock().push(bet.clone());
        Ok(())
    }

    async fn get_blob(&self, key: &str) -> Result<Option<String>> {
        Ok(self.blobs.lock().get(key).cloned())
    }

    async fn set_blob(&self, key: &str, value: &str) -> Result<()> {
        self.blobs.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Append-only JSON lines, one file per table
#[derive(Debug, Clone)]
pub struct JsonlStore {
    dir: PathBuf,
}

impl JsonlStore {
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(dir.join("blobs")).await?;
        Ok(Self { dir })
    }

    pub fn table_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{}.jsonl", table))
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.dir.join("blobs").join(format!("{}.json", blob_file_stem(key)))
    }

    async fn append<T: Serialize + Sync>(&self, table: &str, row: &T) -> Result<()> {
        let mut line = serde_json::to_string(row)?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.table_path(table))
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Read every row of a table, skipping lines that fail to parse
    pub async fn read_table<T: serde::de::DeserializeOwned>(&self, table: &str) -> Result<Vec<T>> {
        read_jsonl(self.table_path(table)).await
    }
}

/// Parse a JSON lines file, skipping blank or malformed lines
pub async fn read_jsonl<T: serde::de::DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    let path = path.as_ref();
    let content = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut rows = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(row) => rows.push(row),
            Err(e) => debug!(path = %path.display(), line = lineno + 1, error = %e, "skipping bad row"),
        }
    }
    Ok(rows)
}

/// Filename-safe stem for a blob key. ASCII alphanumerics and `-` pass
/// through, every other byte becomes `_xx` hex, so distinct keys never share
/// a file.
fn blob_file_stem(key: &str) -> String {
    let mut stem = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            stem.push(byte as char);
        } else {
            stem.push_str(&format!("_{:02x}", byte));
        }
    }
    stem
}

#[async_trait::async_trait]
impl MetricStore for JsonlStore {
    #[instrument(skip(self, metric), fields(delta = metric.delta_seconds))]
    async fn record_latency(&self, metric: &LatencyMetric) -> Result<()> {
        self.append(LATENCY_TABLE, metric).await
    }

    #[instrument(skip(self, bet), fields(bet_id = %bet.id))]
    async fn record_bet(&self, bet: &BetRecord) -> Result<()> {
        self.append(BETS_TABLE, bet).await
    }

    async fn get_blob(&self, key: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.blob_path(key)).await {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_blob(&self, key: &str, value: &str) -> Result<()> {
        tokio::fs::write(self.blob_path(key), value).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "jsonl"
    }
}

/// Cold-path handler writing latency metrics to a store
pub struct LatencySink(pub Arc<dyn MetricStore>);

#[async_trait::async_trait]
impl QueueHandler<LatencyMetric> for LatencySink {
    async fn handle(&self, item: LatencyMetric) -> Result<()> {
        self.0.record_latency(&item).await
    }
}

/// Cold-path handler writing accepted bets to a store
pub struct BetSink(pub Arc<dyn MetricStore>);

#[async_trait::async_trait]
impl QueueHandler<BetRecord> for BetSink {
    async fn handle(&self, item: BetRecord) -> Result<()> {
        self.0
            .record_bet(&item)
            .await
            .map_err(|e| DiamondError::Persistence(format!("bet {}: {}", item.id, e)))
    }
}

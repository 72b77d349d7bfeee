use crate::domain::{BetRecord, LatencyMetric};
use crate::error::Result;
use crate::persistence::store::MetricStore;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::{info, instrument};

/// PostgreSQL storage adapter
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect and make sure the tables exist
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        for ddl in [
            r#"
            CREATE TABLE IF NOT EXISTS feed_latency_metrics (
                id BIGSERIAL PRIMARY KEY,
                game_id BIGINT,
                event_timestamp TEXT,
                receipt_timestamp TIMESTAMPTZ NOT NULL,
                delta_seconds DOUBLE PRECISION NOT NULL,
                is_safe_window BOOLEAN NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS shadow_bets (
                id UUID PRIMARY KEY,
                created_at TIMESTAMPTZ NOT NULL,
                game_id BIGINT,
                stake NUMERIC NOT NULL,
                odds_american INTEGER NOT NULL,
                model_prob NUMERIC NOT NULL,
                implied_prob NUMERIC NOT NULL,
                edge NUMERIC NOT NULL,
                leverage_index DOUBLE PRECISION NOT NULL,
                latency_secs DOUBLE PRECISION,
                outcome TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS cached_blobs (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        ] {
            sqlx::query(ddl).execute(&self.pool).await?;
        }
        info!("Database schema ready");
        Ok(())
    }
}

#[async_trait::async_trait]
impl MetricStore for PostgresStore {
    #[instrument(skip(self, metric))]
    async fn record_latency(&self, metric: &LatencyMetric) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO feed_latency_metrics
                (game_id, event_timestamp, receipt_timestamp, delta_seconds, is_safe_window)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(metric.game_id.map(|g| g as i64))
        .bind(&metric.event_timestamp)
        .bind(metric.receipt_timestamp)
        .bind(metric.delta_seconds)
        .bind(metric.is_safe_window)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self, bet), fields(bet_id = %bet.id))]
    async fn record_bet(&self, bet: &BetRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO shadow_bets
                (id, created_at, game_id, stake, odds_american, model_prob,
                 implied_prob, edge, leverage_index, latency_secs, outcome)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(bet.id)
        .bind(bet.created_at)
        .bind(bet.game_id.map(|g| g as i64))
        .bind(bet.stake)
        .bind(bet.odds_american)
        .bind(bet.model_prob)
        .bind(bet.implied_prob)
        .bind(bet.edge)
        .bind(bet.leverage_index)
        .bind(bet.latency_secs)
        .bind(bet.outcome.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_blob(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM cached_blobs WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("value")))
    }

    async fn set_blob(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cached_blobs (key, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

//! Play-by-play and box-score sources.
//!
//! The live pipeline only sees these traits. `ReplayFeed` replays a recorded
//! game from disk for shadow runs; `StaticBullpenHistory` serves appearance
//! logs loaded up front; `CachedBullpenHistory` keeps fetched logs in the
//! store's blob cache.

use crate::domain::FeedEvent;
use crate::error::{DiamondError, Result};
use crate::monitor::Appearance;
use crate::persistence::MetricStore;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

// ─────────────────────────────────────────────────────────────
// Traits
// ─────────────────────────────────────────────────────────────

/// Source of play-by-play updates in game order.
///
/// Returns `None` once the feed is exhausted.
#[async_trait]
pub trait LiveFeed: Send {
    async fn next_event(&mut self) -> Result<Option<FeedEvent>>;
}

/// Historical box scores used to grade bullpen fatigue
#[async_trait]
pub trait BullpenHistorySource: Send + Sync {
    /// Relief appearances for `team` on dates in `[since, until)`
    async fn appearances(
        &self,
        team: &str,
        since: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<Appearance>>;
}

// ─────────────────────────────────────────────────────────────
// ReplayFeed
// ─────────────────────────────────────────────────────────────

/// Recorded feed events replayed in file order
#[derive(Debug, Default)]
pub struct ReplayFeed {
    events: VecDeque<FeedEvent>,
}

impl ReplayFeed {
    pub fn new(events: Vec<FeedEvent>) -> Self {
        Self {
            events: events.into(),
        }
    }

    /// Load a JSON array of feed events
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await?;
        let events: Vec<FeedEvent> = serde_json::from_str(&raw)
            .map_err(|e| DiamondError::Feed(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), events = events.len(), "replay feed loaded");
        Ok(Self::new(events))
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[async_trait]
impl LiveFeed for ReplayFeed {
    async fn next_event(&mut self) -> Result<Option<FeedEvent>> {
        Ok(self.events.pop_front())
    }
}

// ─────────────────────────────────────────────────────────────
// StaticBullpenHistory
// ─────────────────────────────────────────────────────────────

/// In-memory appearance logs keyed by team
#[derive(Debug, Clone, Default)]
pub struct StaticBullpenHistory {
    by_team: HashMap<String, Vec<Appearance>>,
}

impl StaticBullpenHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_team(mut self, team: impl Into<String>, appearances: Vec<Appearance>) -> Self {
        self.by_team.insert(team.into(), appearances);
        self
    }

    /// Load a JSON object mapping team code to its appearance log
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await?;
        let by_team: HashMap<String, Vec<Appearance>> = serde_json::from_str(&raw)
            .map_err(|e| DiamondError::Feed(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), teams = by_team.len(), "bullpen history loaded");
        Ok(Self { by_team })
    }

    pub fn teams(&self) -> usize {
        self.by_team.len()
    }
}

#[async_trait]
impl BullpenHistorySource for StaticBullpenHistory {
    async fn appearances(
        &self,
        team: &str,
        since: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<Appearance>> {
        Ok(self
            .by_team
            .get(team)
            .map(|apps| {
                apps.iter()
                    .filter(|a| a.date >= since && a.date < until)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

// ─────────────────────────────────────────────────────────────
// CachedBullpenHistory
// ─────────────────────────────────────────────────────────────

/// Read-through blob cache in front of another history source.
///
/// Box scores for past dates never change, so a cached log is served as is.
/// Cache read and write failures fall back to the inner source.
pub struct CachedBullpenHistory<S> {
    inner: S,
    store: Arc<dyn MetricStore>,
}

impl<S: BullpenHistorySource> CachedBullpenHistory<S> {
    pub fn new(inner: S, store: Arc<dyn MetricStore>) -> Self {
        Self { inner, store }
    }

    pub fn cache_key(team: &str, since: NaiveDate, until: NaiveDate) -> String {
        format!("bullpen:{}:{}:{}", team, since, until)
    }
}

#[async_trait]
impl<S: BullpenHistorySource> BullpenHistorySource for CachedBullpenHistory<S> {
    async fn appearances(
        &self,
        team: &str,
        since: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<Appearance>> {
        let key = Self::cache_key(team, since, until);
        match self.store.get_blob(&key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(apps) => {
                    debug!(key = %key, "bullpen cache hit");
                    return Ok(apps);
                }
                Err(e) => warn!(key = %key, error = %e, "corrupt bullpen cache entry, refetching"),
            },
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "bullpen cache read failed"),
        }

        let apps = self.inner.appearances(team, since, until).await?;
        match serde_json::to_string(&apps) {
            Ok(raw) => {
                if let Err(e) = self.store.set_blob(&key, &raw).await {
                    warn!(key = %key, error = %e, "bullpen cache write failed");
                }
            }
            Err(e) => warn!(key = %key, error = %e, "bullpen log not cacheable"),
        }
        Ok(apps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        inner: StaticBullpenHistory,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BullpenHistorySource for Counting {
        async fn appearances(
            &self,
            team: &str,
            since: NaiveDate,
            until: NaiveDate,
        ) -> Result<Vec<Appearance>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.appearances(team, since, until).await
        }
    }

    #[tokio::test]
    async fn test_replay_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"game_id": 7, "home_team": "BOS", "away_team": "NYY", "inning": 1,
                  "is_top": true, "outs": 0, "home_score": 0, "away_score": 0}},
                {{"game_id": 7, "inning": 1, "is_top": true, "outs": 1,
                  "runners": [1, 0, 0], "home_score": 0, "away_score": 0,
                  "pitcher_id": 42, "pitches": 4,
                  "event_timestamp": "2024-06-01T23:05:00Z"}}
            ]"#
        )
        .unwrap();

        let mut feed = ReplayFeed::from_file(file.path()).await.unwrap();
        assert_eq!(feed.len(), 2);
        let first = feed.next_event().await.unwrap().unwrap();
        assert_eq!(first.matchup(), "NYY @ BOS");
        assert!(first.is_starter);
        let second = feed.next_event().await.unwrap().unwrap();
        assert_eq!(second.pitcher_id, Some(42));
        assert_eq!(second.situation().state().index(), 12);
        assert!(feed.next_event().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replay_rejects_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        let err = ReplayFeed::from_file(file.path()).await.unwrap_err();
        assert!(matches!(err, DiamondError::Feed(_)));
    }

    #[tokio::test]
    async fn test_static_history_filters_dates() {
        let day = |d| NaiveDate::from_ymd_opt(2024, 6, d).unwrap();
        let app = |d| Appearance {
            pitcher_id: 1,
            pitcher_name: "Setup".into(),
            date: day(d),
            pitches: 15,
        };
        let source = StaticBullpenHistory::new().with_team("BOS", vec![app(1), app(8), app(10)]);
        let apps = source.appearances("BOS", day(7), day(10)).await.unwrap();
        assert_eq!(apps.len(), 1);
        assert!(source.appearances("NYY", day(7), day(10)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cache_serves_second_lookup() {
        let day = |d| NaiveDate::from_ymd_opt(2024, 6, d).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let inner = Counting {
            inner: StaticBullpenHistory::new().with_team(
                "BOS",
                vec![Appearance {
                    pitcher_id: 3,
                    pitcher_name: "Closer".into(),
                    date: day(9),
                    pitches: 22,
                }],
            ),
            calls: calls.clone(),
        };
        let store = Arc::new(MemoryStore::new());
        let cached = CachedBullpenHistory::new(inner, store.clone() as Arc<dyn MetricStore>);

        let first = cached.appearances("BOS", day(7), day(10)).await.unwrap();
        let second = cached.appearances("BOS", day(7), day(10)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let key = CachedBullpenHistory::<Counting>::cache_key("BOS", day(7), day(10));
        assert_eq!(key, "bullpen:BOS:2024-06-07:2024-06-10");
        assert!(store.get_blob(&key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_corrupt_cache_entry_refetches() {
        let day = |d| NaiveDate::from_ymd_opt(2024, 6, d).unwrap();
        let store = Arc::new(MemoryStore::new());
        let key = CachedBullpenHistory::<StaticBullpenHistory>::cache_key("NYY", day(1), day(4));
        store.set_blob(&key, "{broken").await.unwrap();

        let cached = CachedBullpenHistory::new(StaticBullpenHistory::new(), store.clone() as Arc<dyn MetricStore>);
        let apps = cached.appearances("NYY", day(1), day(4)).await.unwrap();
        assert!(apps.is_empty());
        assert_eq!(store.get_blob(&key).await.unwrap().as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn test_history_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"BOS": [{{"pitcher_id": 1, "date": "2024-06-09", "pitches": 30}}], "NYY": []}}"#
        )
        .unwrap();
        let source = StaticBullpenHistory::from_file(file.path()).await.unwrap();
        assert_eq!(source.teams(), 2);
        let day = |d| NaiveDate::from_ymd_opt(2024, 6, d).unwrap();
        let apps = source.appearances("BOS", day(7), day(10)).await.unwrap();
        assert_eq!(apps[0].pitches, 30);
    }
}

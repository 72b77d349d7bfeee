//! Feed latency tracking
//!
//! The hot path only touches an in-memory ring buffer and enqueues a
//! [`LatencyMetric`]; storage happens on the cold-path worker.

use crate::domain::{GameId, LatencyMetric, LatencySample};
use crate::persistence::QueueSender;
use chrono::{DateTime, NaiveDateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Naive timestamp layouts accepted as UTC when no offset is present
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencyConfig {
    /// Ring buffer size
    pub window_capacity: usize,
    /// Below this the market has likely repriced already
    pub min_advantage_secs: f64,
    /// Above this local state is too stale to trust
    pub max_staleness_secs: f64,
    pub queue_capacity: usize,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            window_capacity: 50,
            min_advantage_secs: 3.0,
            max_staleness_secs: 6.0,
            queue_capacity: 1024,
        }
    }
}

impl LatencyConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.window_capacity == 0 {
            errors.push("latency.window_capacity must be positive".to_string());
        }
        if self.queue_capacity == 0 {
            errors.push("latency.queue_capacity must be positive".to_string());
        }
        if !(self.min_advantage_secs >= 0.0) {
            errors.push("latency.min_advantage_secs must be >= 0".to_string());
        }
        if !(self.min_advantage_secs < self.max_staleness_secs) {
            errors.push("latency.min_advantage_secs must be below max_staleness_secs".to_string());
        }
        errors
    }
}

/// Parse a feed timestamp, treating offset-less values as UTC
pub fn parse_feed_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Rolling feed delay monitor
#[derive(Debug)]
pub struct LatencyMonitor {
    config: LatencyConfig,
    window: Mutex<VecDeque<f64>>,
    sink: Option<QueueSender<LatencyMetric>>,
}

impl LatencyMonitor {
    pub fn new(config: LatencyConfig) -> Self {
        let capacity = config.window_capacity.max(1);
        Self {
            config,
            window: Mutex::new(VecDeque::with_capacity(capacity)),
            sink: None,
        }
    }

    /// Enqueue every sample for persistence on this queue
    pub fn with_sink(mut self, sink: QueueSender<LatencyMetric>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &LatencyConfig {
        &self.config
    }

    /// Record the delay between the feed's event time and now.
    ///
    /// Returns the clamped delta in seconds. An unparseable or missing
    /// timestamp records a zero-delta sample.
    pub fn log_feed_delta(&self, game_id: Option<GameId>, event_timestamp: Option<&str>) -> f64 {
        self.log_feed_delta_at(game_id, event_timestamp, Utc::now())
    }

    /// [`log_feed_delta`](Self::log_feed_delta) with an explicit receipt time
    pub fn log_feed_delta_at(
        &self,
        game_id: Option<GameId>,
        event_timestamp: Option<&str>,
        receipt: DateTime<Utc>,
    ) -> f64 {
        let delta = match event_timestamp.map(|raw| (raw, parse_feed_timestamp(raw))) {
            Some((_, Some(event))) => LatencySample::between(event, receipt).delta_seconds,
            Some((raw, None)) => {
                warn!(?game_id, raw, "unparseable feed timestamp, recording zero delta");
                0.0
            }
            None => 0.0,
        };

        let is_safe_window = {
            let mut window = self.window.lock();
            if window.len() >= self.config.window_capacity.max(1) {
                window.pop_front();
            }
            window.push_back(delta);
            self.safe(&window)
        };
        debug!(?game_id, delta_secs = delta, is_safe_window, "feed delta");

        if let Some(sink) = &self.sink {
            sink.enqueue(LatencyMetric {
                game_id,
                event_timestamp: event_timestamp.map(str::to_string),
                receipt_timestamp: receipt,
                delta_seconds: delta,
                is_safe_window,
            });
        }
        delta
    }

    /// Rolling mean delay, `None` before the first sample
    pub fn average(&self) -> Option<f64> {
        Self::mean(&self.window.lock())
    }

    pub fn len(&self) -> usize {
        self.window.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.lock().is_empty()
    }

    /// True only while the rolling mean sits strictly inside the advantage band
    pub fn is_safe_window(&self) -> bool {
        self.safe(&self.window.lock())
    }

    fn safe(&self, window: &VecDeque<f64>) -> bool {
        match Self::mean(window) {
            Some(avg) => avg > self.config.min_advantage_secs && avg < self.config.max_staleness_secs,
            None => false,
        }
    }

    fn mean(window: &VecDeque<f64>) -> Option<f64> {
        if window.is_empty() {
            None
        } else {
            Some(window.iter().sum::<f64>() / window.len() as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn event() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 10, 27, 19, 5, 0).unwrap()
    }

    fn feed(monitor: &LatencyMonitor, lag_secs: i64, n: usize) {
        let ts = event().to_rfc3339();
        for _ in 0..n {
            monitor.log_feed_delta_at(Some(1), Some(&ts), event() + Duration::seconds(lag_secs));
        }
    }

    #[test]
    fn test_empty_window_is_unsafe() {
        let monitor = LatencyMonitor::new(LatencyConfig::default());
        assert!(!monitor.is_safe_window());
        assert_eq!(monitor.average(), None);
    }

    #[test]
    fn test_band_edges() {
        let monitor = LatencyMonitor::new(LatencyConfig::default());
        feed(&monitor, 4, 50);
        assert!(monitor.is_safe_window());

        let stale = LatencyMonitor::new(LatencyConfig::default());
        feed(&stale, 10, 50);
        assert!(!stale.is_safe_window());

        let fast = LatencyMonitor::new(LatencyConfig::default());
        feed(&fast, 1, 50);
        assert!(!fast.is_safe_window());

        // bounds are exclusive
        let edge = LatencyMonitor::new(LatencyConfig::default());
        feed(&edge, 3, 5);
        assert!(!edge.is_safe_window());
    }

    #[test]
    fn test_ring_buffer_evicts_oldest() {
        let config = LatencyConfig {
            window_capacity: 3,
            ..Default::default()
        };
        let monitor = LatencyMonitor::new(config);
        feed(&monitor, 10, 3);
        feed(&monitor, 4, 3);
        assert_eq!(monitor.len(), 3);
        assert_eq!(monitor.average(), Some(4.0));
    }

    #[test]
    fn test_clock_skew_and_bad_input() {
        let monitor = LatencyMonitor::new(LatencyConfig::default());
        let ts = event().to_rfc3339();
        assert_eq!(
            monitor.log_feed_delta_at(None, Some(&ts), event() - Duration::seconds(5)),
            0.0
        );
        assert_eq!(monitor.log_feed_delta_at(None, Some("not a time"), event()), 0.0);
        assert_eq!(monitor.log_feed_delta_at(None, None, event()), 0.0);
        assert_eq!(monitor.len(), 3);
    }

    #[test]
    fn test_parse_formats() {
        let expected = event();
        assert_eq!(parse_feed_timestamp("2023-10-27T19:05:00Z"), Some(expected));
        assert_eq!(parse_feed_timestamp("2023-10-27T15:05:00-04:00"), Some(expected));
        assert_eq!(parse_feed_timestamp("2023-10-27T19:05:00"), Some(expected));
        assert_eq!(parse_feed_timestamp("2023-10-27 19:05:00.000"), Some(expected));
        assert_eq!(parse_feed_timestamp("yesterday"), None);
    }

    #[test]
    fn test_validate() {
        assert!(LatencyConfig::default().validate().is_empty());
        let bad = LatencyConfig {
            min_advantage_secs: 6.0,
            max_staleness_secs: 3.0,
            window_capacity: 0,
            ..Default::default()
        };
        assert_eq!(bad.validate().len(), 2);
    }
}

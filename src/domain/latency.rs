use super::GameId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One feed-to-receipt delay measurement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencySample {
    pub event_timestamp: DateTime<Utc>,
    pub receipt_timestamp: DateTime<Utc>,
    /// Never negative; clock skew is clamped to zero
    pub delta_seconds: f64,
}

impl LatencySample {
    /// Build a sample from two UTC instants, clamping negative deltas.
    pub fn between(event_timestamp: DateTime<Utc>, receipt_timestamp: DateTime<Utc>) -> Self {
        let millis = (receipt_timestamp - event_timestamp).num_milliseconds();
        Self {
            event_timestamp,
            receipt_timestamp,
            delta_seconds: (millis as f64 / 1000.0).max(0.0),
        }
    }
}

/// Persistence payload for the latency metrics table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyMetric {
    pub game_id: Option<GameId>,
    /// Raw timestamp as received, kept for audit even if it failed to parse
    pub event_timestamp: Option<String>,
    pub receipt_timestamp: DateTime<Utc>,
    pub delta_seconds: f64,
    pub is_safe_window: bool,
}

//! Tier-1 execution signal
//!
//! Minified JSON with single-letter keys for the execution layer. Pure
//! serialisation, no I/O.

use crate::domain::GameId;
use crate::error::Result;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fields the caller supplies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalInput {
    pub game_id: GameId,
    /// Market label, e.g. "ML:NYY"
    pub market: String,
    pub odds: i32,
    pub prob: f64,
    pub stake: Decimal,
}

/// Wire layout: `{"t","g","m","o","p","s","id"}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tier1Signal {
    /// Unix seconds with fractional part
    pub t: String,
    pub g: GameId,
    pub m: String,
    pub o: i32,
    pub p: f64,
    pub s: Decimal,
    pub id: Uuid,
}

impl Tier1Signal {
    pub fn new(input: &SignalInput) -> Self {
        let now = Utc::now();
        Self {
            t: format!("{}.{:06}", now.timestamp(), now.timestamp_subsec_micros()),
            g: input.game_id,
            m: input.market.clone(),
            o: input.odds,
            p: input.prob,
            s: input.stake,
            id: Uuid::new_v4(),
        }
    }
}

/// Build and serialise a signal in one step
pub fn generate_tier1_signal(input: &SignalInput) -> Result<String> {
    Ok(serde_json::to_string(&Tier1Signal::new(input))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::time::Instant;

    fn input() -> SignalInput {
        SignalInput {
            game_id: 745_123,
            market: "ML:NYY".to_string(),
            odds: -120,
            prob: 0.58,
            stake: dec!(250.00),
        }
    }

    #[test]
    fn test_compact_layout() {
        let json = generate_tier1_signal(&input()).unwrap();
        assert!(!json.contains(' '));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        for key in ["t", "g", "m", "o", "p", "s", "id"] {
            assert!(keys.contains(&key), "missing key {}", key);
        }
        assert_eq!(keys.len(), 7);
        assert_eq!(value["g"], 745_123);
        assert_eq!(value["o"], -120);
    }

    #[test]
    fn test_unique_ids_and_budget() {
        let started = Instant::now();
        let a: Tier1Signal = serde_json::from_str(&generate_tier1_signal(&input()).unwrap()).unwrap();
        let b: Tier1Signal = serde_json::from_str(&generate_tier1_signal(&input()).unwrap()).unwrap();
        assert!(started.elapsed().as_millis() < 50);
        assert_ne!(a.id, b.id);
        assert_eq!(a.s, dec!(250.00));
    }
}

//! Reliever availability from recent appearances
//!
//! Fetching box scores is someone else's job; this module only classifies an
//! appearance log relative to a reference date.

use super::FatigueConfig;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// One pitching appearance from a box score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appearance {
    pub pitcher_id: u64,
    #[serde(default)]
    pub pitcher_name: String,
    pub date: NaiveDate,
    pub pitches: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BullpenStatus {
    Fresh,
    Tired,
    Dead,
}

impl BullpenStatus {
    pub fn modifier(&self, config: &FatigueConfig) -> f64 {
        match self {
            BullpenStatus::Fresh => 1.0,
            BullpenStatus::Tired => config.tired_modifier,
            BullpenStatus::Dead => config.dead_arm_modifier,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BullpenStatus::Fresh => "Fresh",
            BullpenStatus::Tired => "Tired",
            BullpenStatus::Dead => "Dead",
        }
    }
}

impl fmt::Display for BullpenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fatigue assessment for one reliever
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelieverFatigue {
    pub pitcher_id: u64,
    pub name: String,
    pub status: BullpenStatus,
    pub modifier: f64,
    /// Pitches thrown over the lookback window
    pub pitches_window: u32,
    /// Dates pitched, most recent first
    pub days_pitched: Vec<NaiveDate>,
    /// Consecutive days pitched counting back from yesterday
    pub consecutive_days: u32,
    pub yesterday_pitches: u32,
}

/// Fatigue by pitcher id
pub type BullpenReport = HashMap<u64, RelieverFatigue>;

/// Classify every pitcher in the log against `today`.
///
/// Only appearances inside `[today - lookback_days, today)` with at least one
/// pitch count. Dead beats Tired beats Fresh.
pub fn classify_bullpen(
    appearances: &[Appearance],
    today: NaiveDate,
    config: &FatigueConfig,
) -> BullpenReport {
    let window_start = today - Duration::days(config.lookback_days as i64);
    let yesterday = today - Duration::days(1);

    let mut by_pitcher: HashMap<u64, Vec<&Appearance>> = HashMap::new();
    for app in appearances
        .iter()
        .filter(|a| a.pitches > 0 && a.date >= window_start && a.date < today)
    {
        by_pitcher.entry(app.pitcher_id).or_default().push(app);
    }

    by_pitcher
        .into_iter()
        .map(|(pitcher_id, apps)| {
            let dates: BTreeSet<NaiveDate> = apps.iter().map(|a| a.date).collect();

            let mut consecutive_days = 0u32;
            let mut day = yesterday;
            while dates.contains(&day) {
                consecutive_days += 1;
                day -= Duration::days(1);
            }

            let yesterday_pitches: u32 = apps
                .iter()
                .filter(|a| a.date == yesterday)
                .map(|a| a.pitches)
                .sum();

            let status = if consecutive_days >= config.consecutive_day_cap {
                BullpenStatus::Dead
            } else if yesterday_pitches > config.high_stress_pitches {
                BullpenStatus::Tired
            } else {
                BullpenStatus::Fresh
            };

            let name = apps
                .iter()
                .map(|a| a.pitcher_name.as_str())
                .find(|n| !n.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("Pitcher {}", pitcher_id));

            let report = RelieverFatigue {
                pitcher_id,
                name,
                status,
                modifier: status.modifier(config),
                pitches_window: apps.iter().map(|a| a.pitches).sum(),
                days_pitched: dates.iter().rev().copied().collect(),
                consecutive_days,
                yesterday_pitches,
            };
            (pitcher_id, report)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn app(pitcher_id: u64, d: u32, pitches: u32) -> Appearance {
        Appearance {
            pitcher_id,
            pitcher_name: String::new(),
            date: day(d),
            pitches,
        }
    }

    #[test]
    fn test_classification() {
        let config = FatigueConfig::default();
        let log = vec![
            app(1, 9, 12),
            app(1, 8, 15), // back to back
            app(2, 9, 31), // stressed yesterday
            app(3, 9, 20), // light yesterday
            app(4, 7, 40), // rested since
            app(5, 9, 0),  // warmed up, never pitched
        ];
        let report = classify_bullpen(&log, day(10), &config);

        assert_eq!(report[&1].status, BullpenStatus::Dead);
        assert_eq!(report[&1].modifier, 1.25);
        assert_eq!(report[&1].consecutive_days, 2);
        assert_eq!(report[&1].pitches_window, 27);
        assert_eq!(report[&1].days_pitched, vec![day(9), day(8)]);

        assert_eq!(report[&2].status, BullpenStatus::Tired);
        assert_eq!(report[&2].modifier, 1.15);
        assert_eq!(report[&3].status, BullpenStatus::Fresh);
        assert_eq!(report[&4].status, BullpenStatus::Fresh);
        assert_eq!(report[&4].consecutive_days, 0);
        assert!(!report.contains_key(&5));
        assert_eq!(report[&3].name, "Pitcher 3");
    }

    #[test]
    fn test_window_excludes_old_and_today() {
        let config = FatigueConfig::default();
        let log = vec![app(9, 1, 50), app(9, 10, 50)];
        assert!(classify_bullpen(&log, day(10), &config).is_empty());
    }
}

//! In-game fatigue and fielding monitors

pub mod bullpen;
pub mod defense;
pub mod pitcher;
pub mod registry;

pub use bullpen::{classify_bullpen, Appearance, BullpenReport, BullpenStatus, RelieverFatigue};
pub use defense::DefenseMonitor;
pub use pitcher::{PitcherAlert, PitcherMonitor};
pub use registry::{GameMonitorRegistry, GameMonitors};

use serde::{Deserialize, Serialize};

/// Fatigue thresholds and multipliers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FatigueConfig {
    /// Pitches after which a pitcher counts as fatigued
    pub pitch_count_cap: u32,
    pub ttto_min_batters: u32,
    pub ttto_max_batters: u32,
    /// Pitches in yesterday's outing that make a reliever tired
    pub high_stress_pitches: u32,
    /// Consecutive days pitched that make a reliever unavailable
    pub consecutive_day_cap: u32,
    /// Days of appearances considered by the bullpen classifier
    pub lookback_days: u32,
    pub ttto_modifier: f64,
    pub pitch_count_modifier: f64,
    pub dead_arm_modifier: f64,
    pub tired_modifier: f64,
    pub modifier_cap: f64,
}

impl Default for FatigueConfig {
    fn default() -> Self {
        Self {
            pitch_count_cap: 95,
            ttto_min_batters: 19,
            ttto_max_batters: 27,
            high_stress_pitches: 25,
            consecutive_day_cap: 2,
            lookback_days: 3,
            ttto_modifier: 1.15,
            pitch_count_modifier: 1.10,
            dead_arm_modifier: 1.25,
            tired_modifier: 1.15,
            modifier_cap: 1.50,
        }
    }
}

impl FatigueConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.ttto_min_batters > self.ttto_max_batters {
            errors.push("fatigue.ttto_min_batters must not exceed ttto_max_batters".to_string());
        }
        if self.consecutive_day_cap == 0 {
            errors.push("fatigue.consecutive_day_cap must be positive".to_string());
        }
        for (name, value) in [
            ("ttto_modifier", self.ttto_modifier),
            ("pitch_count_modifier", self.pitch_count_modifier),
            ("dead_arm_modifier", self.dead_arm_modifier),
            ("tired_modifier", self.tired_modifier),
            ("modifier_cap", self.modifier_cap),
        ] {
            if !value.is_finite() || value < 1.0 {
                errors.push(format!("fatigue.{} must be >= 1.0", name));
            }
        }
        errors
    }
}

use super::bullpen::BullpenReport;
use super::FatigueConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Dashboard label for a pitcher modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PitcherAlert {
    Ok,
    Ttto,
    Fatigue,
}

impl PitcherAlert {
    pub fn from_modifier(modifier: f64) -> Self {
        if modifier > 1.10 {
            PitcherAlert::Fatigue
        } else if modifier > 1.05 {
            PitcherAlert::Ttto
        } else {
            PitcherAlert::Ok
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PitcherAlert::Ok => "OK",
            PitcherAlert::Ttto => "TTTO",
            PitcherAlert::Fatigue => "FATIGUE",
        }
    }
}

impl fmt::Display for PitcherAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tracks the pitcher currently on the mound for one side.
///
/// Starters pick up a times-through-the-order penalty while facing batters
/// 19 through 27; anyone past the pitch-count cap is fatigued; relievers
/// also carry their recent-usage modifier from the bullpen report.
#[derive(Debug, Clone)]
pub struct PitcherMonitor {
    config: FatigueConfig,
    bullpen: BullpenReport,
    current_pitcher_id: Option<u64>,
    batters_faced: u32,
    pitch_count: u32,
    is_bullpen: bool,
}

impl PitcherMonitor {
    pub fn new(config: FatigueConfig, bullpen: BullpenReport) -> Self {
        Self {
            config,
            bullpen,
            current_pitcher_id: None,
            batters_faced: 0,
            pitch_count: 0,
            is_bullpen: false,
        }
    }

    /// Register the pitcher on the mound; counts reset only on a change.
    pub fn update_pitcher(&mut self, pitcher_id: Option<u64>, is_starter: bool) {
        if self.current_pitcher_id != pitcher_id {
            debug!(?pitcher_id, is_starter, "pitching change");
            self.current_pitcher_id = pitcher_id;
            self.batters_faced = 0;
            self.pitch_count = 0;
            self.is_bullpen = !is_starter;
        }
    }

    pub fn log_at_bat(&mut self) {
        self.batters_faced += 1;
    }

    pub fn log_pitches(&mut self, count: u32) {
        self.pitch_count += count;
    }

    pub fn ttto_signal(&self) -> bool {
        !self.is_bullpen
            && self.batters_faced >= self.config.ttto_min_batters
            && self.batters_faced <= self.config.ttto_max_batters
    }

    pub fn fatigue_signal(&self) -> bool {
        self.pitch_count > self.config.pitch_count_cap
    }

    /// Recent-usage modifier for the current reliever (1.0 for starters)
    pub fn bullpen_modifier(&self) -> f64 {
        if !self.is_bullpen {
            return 1.0;
        }
        self.current_pitcher_id
            .and_then(|id| self.bullpen.get(&id))
            .map(|r| r.modifier)
            .unwrap_or(1.0)
    }

    /// Compounded effectiveness multiplier, capped
    pub fn performance_modifier(&self) -> f64 {
        let mut modifier = 1.0;
        if self.ttto_signal() {
            modifier *= self.config.ttto_modifier;
        }
        if self.fatigue_signal() {
            modifier *= self.config.pitch_count_modifier;
        }
        modifier *= self.bullpen_modifier();
        modifier.min(self.config.modifier_cap)
    }

    pub fn alert(&self) -> PitcherAlert {
        PitcherAlert::from_modifier(self.performance_modifier())
    }

    pub fn current_pitcher(&self) -> Option<u64> {
        self.current_pitcher_id
    }

    pub fn batters_faced(&self) -> u32 {
        self.batters_faced
    }

    pub fn pitch_count(&self) -> u32 {
        self.pitch_count
    }

    pub fn is_bullpen(&self) -> bool {
        self.is_bullpen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::bullpen::{BullpenStatus, RelieverFatigue};

    fn monitor() -> PitcherMonitor {
        PitcherMonitor::new(FatigueConfig::default(), BullpenReport::new())
    }

    #[test]
    fn test_ttto_window() {
        let mut m = monitor();
        m.update_pitcher(Some(10), true);
        for _ in 0..18 {
            m.log_at_bat();
        }
        assert!(!m.ttto_signal());
        m.log_at_bat();
        assert!(m.ttto_signal());
        assert!((m.performance_modifier() - 1.15).abs() < 1e-12);
        assert_eq!(m.alert(), PitcherAlert::Fatigue);
        for _ in 0..9 {
            m.log_at_bat();
        }
        assert_eq!(m.batters_faced(), 28);
        assert!(!m.ttto_signal());
    }

    #[test]
    fn test_pitch_count_and_cap() {
        let mut m = monitor();
        m.update_pitcher(Some(10), true);
        m.log_pitches(95);
        assert!(!m.fatigue_signal());
        m.log_pitches(1);
        assert!(m.fatigue_signal());
        assert!((m.performance_modifier() - 1.10).abs() < 1e-12);
        assert_eq!(m.alert(), PitcherAlert::Ttto);
    }

    #[test]
    fn test_reliever_uses_bullpen_report() {
        let mut report = BullpenReport::new();
        report.insert(
            55,
            RelieverFatigue {
                pitcher_id: 55,
                name: "Closer".into(),
                status: BullpenStatus::Dead,
                modifier: 1.25,
                pitches_window: 40,
                days_pitched: vec![],
                consecutive_days: 2,
                yesterday_pitches: 20,
            },
        );
        let mut m = PitcherMonitor::new(FatigueConfig::default(), report);
        m.update_pitcher(Some(55), false);
        m.log_pitches(120);
        // 1.10 * 1.25 = 1.375, below the cap
        assert!((m.performance_modifier() - 1.375).abs() < 1e-12);

        // relievers never get the TTTO penalty
        for _ in 0..20 {
            m.log_at_bat();
        }
        assert!(!m.ttto_signal());
    }

    #[test]
    fn test_change_resets_counts() {
        let mut m = monitor();
        m.update_pitcher(Some(1), true);
        m.log_pitches(50);
        m.update_pitcher(Some(1), true);
        assert_eq!(m.pitch_count(), 50);
        m.update_pitcher(Some(2), false);
        assert_eq!(m.pitch_count(), 0);
        assert!(m.is_bullpen());
        assert_eq!(m.performance_modifier(), 1.0);
        assert_eq!(m.alert(), PitcherAlert::Ok);
    }

    #[test]
    fn test_modifier_cap() {
        let config = FatigueConfig {
            ttto_modifier: 1.4,
            pitch_count_modifier: 1.3,
            ..Default::default()
        };
        let mut m = PitcherMonitor::new(config, BullpenReport::new());
        m.update_pitcher(Some(3), true);
        for _ in 0..20 {
            m.log_at_bat();
        }
        m.log_pitches(100);
        assert_eq!(m.performance_modifier(), 1.5);
    }
}

//! Per-game monitor state keyed by game id
//!
//! Different games proceed concurrently; everything for one game runs under
//! that game's mutex so pitch and error counts never interleave.

use super::{BullpenReport, DefenseMonitor, FatigueConfig, PitcherMonitor};
use crate::domain::{GameId, HalfInning};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Monitors for both sides of one game
#[derive(Debug, Clone)]
pub struct GameMonitors {
    /// Home pitcher (pitching in the top half)
    pub home_pitching: PitcherMonitor,
    /// Away pitcher (pitching in the bottom half)
    pub away_pitching: PitcherMonitor,
    pub home_defense: DefenseMonitor,
    pub away_defense: DefenseMonitor,
}

impl GameMonitors {
    pub fn new(
        config: &FatigueConfig,
        home_team: &str,
        away_team: &str,
        home_bullpen: BullpenReport,
        away_bullpen: BullpenReport,
    ) -> Self {
        Self {
            home_pitching: PitcherMonitor::new(config.clone(), home_bullpen),
            away_pitching: PitcherMonitor::new(config.clone(), away_bullpen),
            home_defense: DefenseMonitor::new(home_team),
            away_defense: DefenseMonitor::new(away_team),
        }
    }

    /// Pitcher on the mound in this half
    pub fn pitching(&mut self, half: HalfInning) -> &mut PitcherMonitor {
        match half {
            HalfInning::Top => &mut self.home_pitching,
            HalfInning::Bottom => &mut self.away_pitching,
        }
    }

    /// Fielding team in this half
    pub fn fielding(&mut self, half: HalfInning) -> &mut DefenseMonitor {
        match half {
            HalfInning::Top => &mut self.home_defense,
            HalfInning::Bottom => &mut self.away_defense,
        }
    }
}

#[derive(Debug, Default)]
pub struct GameMonitorRegistry {
    games: DashMap<GameId, Arc<Mutex<GameMonitors>>>,
}

impl GameMonitorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` under the game's lock, creating the entry with `init` if absent
    pub fn with_game<R>(
        &self,
        game_id: GameId,
        init: impl FnOnce() -> GameMonitors,
        f: impl FnOnce(&mut GameMonitors) -> R,
    ) -> R {
        let entry = self
            .games
            .entry(game_id)
            .or_insert_with(|| {
                debug!(game_id, "tracking new game");
                Arc::new(Mutex::new(init()))
            })
            .clone();
        // the map shard is released before the per-game lock is taken
        let mut monitors = entry.lock();
        f(&mut monitors)
    }

    pub fn contains(&self, game_id: GameId) -> bool {
        self.games.contains_key(&game_id)
    }

    /// Stop tracking a finished game
    pub fn remove(&self, game_id: GameId) -> bool {
        self.games.remove(&game_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn init() -> GameMonitors {
        GameMonitors::new(
            &FatigueConfig::default(),
            "BOS",
            "NYY",
            BullpenReport::new(),
            BullpenReport::new(),
        )
    }

    #[test]
    fn test_per_game_updates_serialise() {
        let registry = Arc::new(GameMonitorRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || {
                    for _ in 0..250 {
                        registry.with_game(1, init, |g| {
                            g.pitching(HalfInning::Top).log_pitches(1);
                            g.fielding(HalfInning::Bottom).log_error();
                        });
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let (pitches, errors) = registry.with_game(1, init, |g| {
            (g.home_pitching.pitch_count(), g.away_defense.error_count())
        });
        assert_eq!(pitches, 2_000);
        assert_eq!(errors, 2_000);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_init_runs_once_and_remove() {
        let registry = GameMonitorRegistry::new();
        registry.with_game(5, init, |g| g.home_defense.log_error());
        let count = registry.with_game(
            5,
            || panic!("already initialised"),
            |g| g.home_defense.error_count(),
        );
        assert_eq!(count, 1);
        assert!(registry.remove(5));
        assert!(!registry.contains(5));
        assert!(registry.is_empty());
    }
}

//! Monte Carlo rest-of-game simulator
//!
//! Independent of the Markov solver: plays out whole games from the current
//! situation, trials advancing in lock-step over structure-of-arrays buffers.
//! Two transition matrices are precomputed at construction (normal and
//! fatigued bullpen) together with their row CDFs; each step picks a row per
//! trial and samples it by inverse CDF.

use super::events::{EventMasks, EventRates, RunMatrix};
use crate::domain::{BaseOutState, HalfInning, ABSORBING_INDEX, TOTAL_STATES};
use crate::error::{DiamondError, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

/// Normalised offensive share is held below this so every half-inning can end
pub const OFFENSE_CAP: f64 = 0.98;

type CdfTable = [[f64; TOTAL_STATES]; TOTAL_STATES];

/// Simulator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Trials per call when the request does not say otherwise
    pub iterations: usize,
    /// Plate appearances simulated before a trial is abandoned
    pub max_steps: usize,
    /// Pitcher modifier used to build the fatigued matrix
    pub fatigue_degradation: f64,
    /// First inning in which a tired bullpen switches to the fatigued matrix
    pub fatigue_inning: u32,
    /// Bullpen modifier above which the pitching side counts as fatigued
    pub bullpen_fatigue_threshold: f64,
    /// Fixed seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            iterations: 10_000,
            max_steps: 200,
            fatigue_degradation: 1.25,
            fatigue_inning: 7,
            bullpen_fatigue_threshold: 1.10,
            seed: None,
        }
    }
}

/// Starting point for a simulation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationRequest {
    pub state: BaseOutState,
    pub home_score: u32,
    pub away_score: u32,
    pub inning: u32,
    pub half: HalfInning,
    pub home_bullpen_mod: f64,
    pub away_bullpen_mod: f64,
    /// Overrides the configured trial count
    pub iterations: Option<usize>,
}

impl SimulationRequest {
    /// Request at the start of a half-inning with fresh bullpens
    pub fn new(home_score: u32, away_score: u32, inning: u32, half: HalfInning) -> Self {
        Self {
            state: BaseOutState::START,
            home_score,
            away_score,
            inning,
            half,
            home_bullpen_mod: 1.0,
            away_bullpen_mod: 1.0,
            iterations: None,
        }
    }

    pub fn with_state(mut self, state: BaseOutState) -> Self {
        self.state = state;
        self
    }

    pub fn with_bullpens(mut self, home: f64, away: f64) -> Self {
        self.home_bullpen_mod = home;
        self.away_bullpen_mod = away;
        self
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = Some(iterations);
        self
    }
}

/// Aggregate outcome of a simulation batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub iterations: usize,
    pub home_wins: usize,
    pub away_wins: usize,
    /// Trials still tied when the step cap was reached
    pub unresolved: usize,
    /// Fraction of trials where home finished ahead
    pub home_win_prob: f64,
    pub mean_home_runs: f64,
    pub mean_away_runs: f64,
    pub elapsed_ms: u64,
}

/// Lock-step trial buffers
struct TrialBatch {
    state: Vec<u8>,
    home: Vec<u32>,
    away: Vec<u32>,
    inning: Vec<u32>,
    top: Vec<bool>,
    active: Vec<usize>,
}

impl TrialBatch {
    fn new(request: &SimulationRequest, n: usize) -> Self {
        Self {
            state: vec![request.state.index() as u8; n],
            home: vec![request.home_score; n],
            away: vec![request.away_score; n],
            inning: vec![request.inning.max(1); n],
            top: vec![request.half.is_top(); n],
            active: (0..n).collect(),
        }
    }
}

/// Monte Carlo simulator
#[derive(Debug, Clone)]
pub struct MonteCarloSimulator {
    config: SimulationConfig,
    normal_cdf: Box<CdfTable>,
    fatigued_cdf: Box<CdfTable>,
    runs: RunMatrix,
}

impl MonteCarloSimulator {
    pub fn new(config: SimulationConfig) -> Result<Self> {
        if !config.fatigue_degradation.is_finite() || config.fatigue_degradation < 1.0 {
            return Err(DiamondError::Validation(format!(
                "fatigue degradation must be >= 1.0, got {}",
                config.fatigue_degradation
            )));
        }
        if config.max_steps == 0 {
            return Err(DiamondError::Validation("max_steps must be positive".into()));
        }

        let masks = EventMasks::new();
        let normal = EventRates::LEAGUE_AVERAGE.with_offense_capped(OFFENSE_CAP);
        let fatigued =
            EventRates::adjusted(config.fatigue_degradation, 1, 1.0).with_offense_capped(OFFENSE_CAP);

        let normal_matrix = masks.transition_matrix(&normal);
        let fatigued_matrix = masks.transition_matrix(&fatigued);
        normal_matrix.validate()?;
        fatigued_matrix.validate()?;

        Ok(Self {
            normal_cdf: Box::new(normal_matrix.cumulative_rows()),
            fatigued_cdf: Box::new(fatigued_matrix.cumulative_rows()),
            runs: masks.run_matrix().clone(),
            config,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Simulate with the configured seed, or entropy when none is set
    pub fn simulate(&self, request: &SimulationRequest) -> Result<SimulationResult> {
        let mut rng = match self.config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        self.simulate_rest_of_game(request, &mut rng)
    }

    /// Play out the remaining game for every trial and count home wins
    pub fn simulate_rest_of_game<R: Rng + ?Sized>(
        &self,
        request: &SimulationRequest,
        rng: &mut R,
    ) -> Result<SimulationResult> {
        let n = request.iterations.unwrap_or(self.config.iterations);
        if n == 0 {
            return Err(DiamondError::Validation("iterations must be positive".into()));
        }

        let started = Instant::now();
        let mut batch = TrialBatch::new(request, n);
        let mut home_wins = 0usize;
        let mut away_wins = 0usize;

        // entry: an absorbed start flips the half, a finished game ends at once
        let TrialBatch {
            state,
            home,
            away,
            inning,
            top,
            active,
        } = &mut batch;
        active.retain(|&i| {
            let new_inning = if state[i] as usize == ABSORBING_INDEX {
                state[i] = 0;
                flip_half(&mut top[i], &mut inning[i])
            } else {
                false
            };
            match outcome(top[i], inning[i], home[i], away[i], new_inning) {
                Some(true) => {
                    home_wins += 1;
                    false
                }
                Some(false) => {
                    away_wins += 1;
                    false
                }
                None => true,
            }
        });

        let mut steps = 0;
        while steps < self.config.max_steps && !batch.active.is_empty() {
            steps += 1;
            let TrialBatch {
                state,
                home,
                away,
                inning,
                top,
                active,
            } = &mut batch;

            active.retain(|&i| {
                let from = state[i] as usize;
                let fatigued = self.pitching_side_fatigued(top[i], inning[i], request);
                let row = if fatigued {
                    &self.fatigued_cdf[from]
                } else {
                    &self.normal_cdf[from]
                };

                let draw: f64 = rng.gen();
                let to = row
                    .iter()
                    .position(|&c| c >= draw)
                    .unwrap_or(TOTAL_STATES - 1);

                let scored = self.runs.get(from, to);
                if top[i] {
                    away[i] += scored;
                } else {
                    home[i] += scored;
                }

                let new_inning = if to == ABSORBING_INDEX {
                    state[i] = 0;
                    flip_half(&mut top[i], &mut inning[i])
                } else {
                    state[i] = to as u8;
                    false
                };

                match outcome(top[i], inning[i], home[i], away[i], new_inning) {
                    Some(true) => {
                        home_wins += 1;
                        false
                    }
                    Some(false) => {
                        away_wins += 1;
                        false
                    }
                    None => true,
                }
            });
        }

        // survivors hit the step cap; score them on the current scoreboard
        let mut unresolved = 0;
        for &i in &batch.active {
            match batch.home[i].cmp(&batch.away[i]) {
                std::cmp::Ordering::Greater => home_wins += 1,
                std::cmp::Ordering::Less => away_wins += 1,
                std::cmp::Ordering::Equal => unresolved += 1,
            }
        }

        let mean = |v: &[u32]| v.iter().map(|&x| x as f64).sum::<f64>() / n as f64;
        let result = SimulationResult {
            iterations: n,
            home_wins,
            away_wins,
            unresolved,
            home_win_prob: home_wins as f64 / n as f64,
            mean_home_runs: mean(&batch.home),
            mean_away_runs: mean(&batch.away),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        debug!(
            iterations = n,
            steps,
            home_win_prob = result.home_win_prob,
            unresolved,
            elapsed_ms = result.elapsed_ms,
            "monte carlo batch complete"
        );
        Ok(result)
    }

    /// Top half: home is pitching. Bottom half: away is pitching.
    fn pitching_side_fatigued(&self, top: bool, inning: u32, request: &SimulationRequest) -> bool {
        let bullpen = if top {
            request.home_bullpen_mod
        } else {
            request.away_bullpen_mod
        };
        inning >= self.config.fatigue_inning && bullpen > self.config.bullpen_fatigue_threshold
    }
}

/// Advance to the next half-inning; true when a new inning begins
fn flip_half(top: &mut bool, inning: &mut u32) -> bool {
    if *top {
        *top = false;
        false
    } else {
        *top = true;
        *inning += 1;
        true
    }
}

/// Winner once the game is decided: `Some(true)` home, `Some(false)` away.
///
/// Home wins the moment it leads in the bottom of the ninth or later. Away
/// wins only as a half flips into the top of the tenth or later with away
/// ahead, meaning the home side has used up its last turn at bat. A lead
/// taken in the top of an extra inning is not final.
fn outcome(top: bool, inning: u32, home: u32, away: u32, new_inning: bool) -> Option<bool> {
    if !top && inning >= 9 && home > away {
        return Some(true);
    }
    if new_inning && inning >= 10 && away > home {
        return Some(false);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Runners;

    fn seeded() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(7)
    }

    fn simulator() -> MonteCarloSimulator {
        MonteCarloSimulator::new(SimulationConfig::default()).unwrap()
    }

    #[test]
    fn test_outcome_predicate() {
        assert_eq!(outcome(false, 9, 3, 2, false), Some(true));
        assert_eq!(outcome(false, 8, 3, 2, false), None);
        assert_eq!(outcome(true, 10, 2, 3, true), Some(false));
        // away leading mid top half: home still bats
        assert_eq!(outcome(true, 10, 2, 3, false), None);
        assert_eq!(outcome(true, 9, 2, 3, true), None);
        assert_eq!(outcome(true, 11, 3, 3, true), None);
    }

    #[test]
    fn test_flip_half() {
        let (mut top, mut inning) = (true, 9);
        assert!(!flip_half(&mut top, &mut inning));
        assert_eq!((top, inning), (false, 9));
        assert!(flip_half(&mut top, &mut inning));
        assert_eq!((top, inning), (true, 10));
    }

    #[test]
    fn test_home_bats_after_extra_inning_top_lead() {
        let sim = simulator();
        let request = SimulationRequest::new(4, 5, 10, HalfInning::Top)
            .with_state(BaseOutState::from_parts(1, Runners::EMPTY))
            .with_iterations(4_000);
        let result = sim.simulate_rest_of_game(&request, &mut seeded()).unwrap();
        assert!(result.home_win_prob > 0.05, "home never batted: {}", result.home_win_prob);
        assert!(result.away_wins > 0);
    }

    #[test]
    fn test_tied_tenth_matches_tied_ninth() {
        // with rested bullpens a tie after nine replays the same extra inning
        let sim = simulator();
        let ninth = SimulationRequest::new(3, 3, 9, HalfInning::Top).with_iterations(8_000);
        let tenth = SimulationRequest::new(3, 3, 10, HalfInning::Top).with_iterations(8_000);
        let a = sim.simulate_rest_of_game(&ninth, &mut seeded()).unwrap();
        let b = sim.simulate_rest_of_game(&tenth, &mut ChaCha8Rng::seed_from_u64(11)).unwrap();
        assert!(
            (a.home_win_prob - b.home_win_prob).abs() < 0.05,
            "ninth {} tenth {}",
            a.home_win_prob,
            b.home_win_prob
        );
    }

    #[test]
    fn test_step_cap_leaves_ties_unresolved() {
        let config = SimulationConfig {
            max_steps: 3,
            ..Default::default()
        };
        let sim = MonteCarloSimulator::new(config).unwrap();
        let request = SimulationRequest::new(2, 2, 8, HalfInning::Top).with_iterations(2_000);
        let result = sim.simulate_rest_of_game(&request, &mut seeded()).unwrap();

        assert!(result.unresolved > 0);
        assert_eq!(result.home_wins + result.away_wins + result.unresolved, 2_000);
        assert_eq!(result.home_win_prob, result.home_wins as f64 / 2_000.0);
        assert!(result.home_win_prob <= (2_000 - result.unresolved) as f64 / 2_000.0);
    }

    #[test]
    fn test_rejects_bad_config() {
        let mut config = SimulationConfig::default();
        config.fatigue_degradation = 0.9;
        assert!(MonteCarloSimulator::new(config).is_err());

        let mut config = SimulationConfig::default();
        config.max_steps = 0;
        assert!(MonteCarloSimulator::new(config).is_err());
    }

    #[test]
    fn test_zero_iterations_is_error() {
        let sim = simulator();
        let request = SimulationRequest::new(0, 0, 1, HalfInning::Top).with_iterations(0);
        assert!(sim.simulate_rest_of_game(&request, &mut seeded()).is_err());
    }

    #[test]
    fn test_decided_game_resolves_immediately() {
        let sim = simulator();
        let request = SimulationRequest::new(4, 2, 9, HalfInning::Bottom).with_iterations(500);
        let result = sim.simulate_rest_of_game(&request, &mut seeded()).unwrap();
        assert_eq!(result.home_wins, 500);
        assert_eq!(result.home_win_prob, 1.0);
    }

    #[test]
    fn test_absorbed_start_flips_half() {
        let sim = simulator();
        // away ahead after the bottom of the ninth ends: game over
        let request = SimulationRequest::new(1, 3, 9, HalfInning::Bottom)
            .with_state(BaseOutState::INNING_OVER)
            .with_iterations(100);
        let result = sim.simulate_rest_of_game(&request, &mut seeded()).unwrap();
        assert_eq!(result.away_wins, 100);
        assert_eq!(result.home_win_prob, 0.0);
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let sim = simulator();
        let request = SimulationRequest::new(2, 2, 6, HalfInning::Top)
            .with_state(BaseOutState::from_parts(1, Runners::new(true, false, false)))
            .with_iterations(2_000);
        let a = sim.simulate_rest_of_game(&request, &mut seeded()).unwrap();
        let b = sim.simulate_rest_of_game(&request, &mut seeded()).unwrap();
        assert_eq!(a.home_wins, b.home_wins);
        assert_eq!(a.mean_away_runs, b.mean_away_runs);
    }

    #[test]
    fn test_probability_tracks_score() {
        let sim = simulator();
        let mut rng = seeded();
        let leading = SimulationRequest::new(5, 1, 7, HalfInning::Top).with_iterations(4_000);
        let trailing = SimulationRequest::new(1, 5, 7, HalfInning::Top).with_iterations(4_000);
        let lead = sim.simulate_rest_of_game(&leading, &mut rng).unwrap();
        let trail = sim.simulate_rest_of_game(&trailing, &mut rng).unwrap();
        assert!(lead.home_win_prob > 0.8);
        assert!(trail.home_win_prob < 0.2);
        assert_eq!(lead.home_wins + lead.away_wins + lead.unresolved, 4_000);
    }

    #[test]
    fn test_configured_seed_is_deterministic() {
        let config = SimulationConfig {
            seed: Some(99),
            iterations: 1_000,
            ..Default::default()
        };
        let sim = MonteCarloSimulator::new(config).unwrap();
        let request = SimulationRequest::new(0, 0, 8, HalfInning::Bottom);
        let a = sim.simulate(&request).unwrap();
        let b = sim.simulate(&request).unwrap();
        assert_eq!(a.home_wins, b.home_wins);
        assert_eq!(a.iterations, 1_000);
    }
}

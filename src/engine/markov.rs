//! Markov chain run-expectancy engine
//!
//! Builds a parameterised 25×25 transition matrix from the event masks and
//! solves the absorption equation `E = (I − Q)⁻¹ · R` for the expected runs
//! left in the half-inning from every live state. Win probability uses the
//! same logistic model as [`StateEngine`](super::StateEngine), with the solved
//! expectancy in place of the RE24 table.
//!
//! Modifiers are continuous, so solved tables are memoised on a fixed grid
//! (0.001). The matrix is always built from the quantised modifiers, which
//! keeps results bit-identical whether or not the cache is hit.

use super::events::{EventMasks, EventRates, RunMatrix, TransitionMatrix};
use super::state::{logistic_win_probability, sanitize_modifier};
use crate::domain::{BaseOutState, GameSituation, HalfInning, Runners, LIVE_STATES};
use dashmap::DashMap;
use nalgebra::{SMatrix, SVector};
use tracing::{debug, warn};

/// Modifier quantisation step
pub const MODIFIER_GRID: f64 = 0.001;

/// Default bound on memoised expectancy tables
pub const DEFAULT_CACHE_CAPACITY: usize = 4096;

type TransientMatrix = SMatrix<f64, LIVE_STATES, LIVE_STATES>;
type LiveVector = SVector<f64, LIVE_STATES>;

/// Expected runs for the rest of the half-inning from each live state
pub type ExpectedRuns = [f64; LIVE_STATES];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ModifierKey {
    pitcher: i64,
    times_through_order: u32,
    defense: i64,
}

impl ModifierKey {
    fn new(pitcher_mod: f64, times_through_order: u32, defense_mod: f64) -> Self {
        Self {
            pitcher: quantize(pitcher_mod),
            times_through_order: times_through_order.max(1),
            defense: quantize(defense_mod),
        }
    }

    fn pitcher_mod(&self) -> f64 {
        self.pitcher as f64 * MODIFIER_GRID
    }

    fn defense_mod(&self) -> f64 {
        self.defense as f64 * MODIFIER_GRID
    }
}

fn quantize(modifier: f64) -> i64 {
    (sanitize_modifier(modifier) / MODIFIER_GRID).round() as i64
}

/// Markov chain service
///
/// Stateless apart from the memo table; safe to share behind an `Arc` and
/// call from any number of tasks.
#[derive(Debug)]
pub struct MarkovChainService {
    masks: EventMasks,
    cache: DashMap<ModifierKey, ExpectedRuns>,
    cache_capacity: usize,
}

impl MarkovChainService {
    pub fn new() -> Self {
        Self::with_cache_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// Service with a bounded memo table; `0` disables caching.
    pub fn with_cache_capacity(cache_capacity: usize) -> Self {
        Self {
            masks: EventMasks::new(),
            cache: DashMap::new(),
            cache_capacity,
        }
    }

    /// Transition matrix for a pitcher/order/defense situation
    pub fn build_matrix(
        &self,
        pitcher_mod: f64,
        times_through_order: u32,
        defense_mod: f64,
    ) -> TransitionMatrix {
        let rates = EventRates::adjusted(pitcher_mod, times_through_order, defense_mod);
        self.masks.transition_matrix(&rates)
    }

    /// Runs scored on each transition
    pub fn run_matrix(&self) -> &RunMatrix {
        self.masks.run_matrix()
    }

    /// Solve the absorption equation for a transition matrix.
    ///
    /// Returns all zeros if `I − Q` is singular or the solution is not finite.
    pub fn solve_expected_runs(&self, matrix: &TransitionMatrix) -> ExpectedRuns {
        let runs = self.run_matrix();
        let q = TransientMatrix::from_fn(|i, j| matrix.get(i, j));
        let r_imm = LiveVector::from_fn(|i, _| {
            (0..crate::domain::TOTAL_STATES)
                .map(|j| matrix.get(i, j) * runs.get(i, j) as f64)
                .sum()
        });

        let system = TransientMatrix::identity() - q;
        let mut expected = [0.0; LIVE_STATES];
        match system.lu().solve(&r_imm) {
            Some(solution) if solution.iter().all(|v| v.is_finite()) => {
                for (dst, src) in expected.iter_mut().zip(solution.iter()) {
                    *dst = *src;
                }
            }
            _ => {
                warn!("absorption system is singular, using zero expectancy");
            }
        }
        expected
    }

    /// Solved expectancy table for a situation, memoised on the modifier grid
    pub fn expected_runs_table(
        &self,
        pitcher_mod: f64,
        times_through_order: u32,
        defense_mod: f64,
    ) -> ExpectedRuns {
        let key = ModifierKey::new(pitcher_mod, times_through_order, defense_mod);
        if let Some(hit) = self.cache.get(&key) {
            return *hit;
        }

        let matrix = self.build_matrix(key.pitcher_mod(), key.times_through_order, key.defense_mod());
        let table = self.solve_expected_runs(&matrix);

        if self.cache_capacity > 0 {
            if self.cache.len() >= self.cache_capacity {
                debug!(entries = self.cache.len(), "markov cache full, clearing");
                self.cache.clear();
            }
            self.cache.insert(key, table);
        }
        table
    }

    /// Expected runs from one state (zero when the inning is over)
    pub fn expected_runs(
        &self,
        state: BaseOutState,
        pitcher_mod: f64,
        times_through_order: u32,
        defense_mod: f64,
    ) -> f64 {
        if state.is_absorbing() {
            return 0.0;
        }
        self.expected_runs_table(pitcher_mod, times_through_order, defense_mod)[state.index()]
    }

    /// Home win probability for an explicit situation.
    ///
    /// Times through the order is taken as one; callers that track it fold the
    /// effect into `pitcher_mod`.
    #[allow(clippy::too_many_arguments)]
    pub fn instant_win_prob(
        &self,
        inning: u32,
        outs: u8,
        runners: Runners,
        score_diff: i32,
        is_top: bool,
        pitcher_mod: f64,
        defense_mod: f64,
    ) -> f64 {
        let half = HalfInning::from_is_top(is_top);
        let state = BaseOutState::from_parts(outs, runners);
        let expected = self.expected_runs(state, pitcher_mod, 1, defense_mod);
        logistic_win_probability(score_diff, expected, inning.max(1), half)
    }

    /// Home win probability for a full situation
    pub fn win_probability(&self, situation: &GameSituation, pitcher_mod: f64, defense_mod: f64) -> f64 {
        self.instant_win_prob(
            situation.inning,
            situation.outs,
            situation.runners,
            situation.score_diff(),
            situation.half.is_top(),
            pitcher_mod,
            defense_mod,
        )
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

impl Default for MarkovChainService {
    fn default() -> Self {
        Self::new()
    }
}

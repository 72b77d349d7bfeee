//! Plate-appearance events and base-running rules
//!
//! Six outcomes drive every transition: out, walk, single, double, triple,
//! home run. Each one is encoded once as a 25×25 0/1 mask (from-state →
//! to-state) plus the runs it scores from each live state. Matrices for any
//! pitcher/defense situation are weighted sums of these masks.

use crate::domain::{BaseOutState, Runners, ABSORBING_INDEX, LIVE_STATES, TOTAL_STATES};
use crate::error::{DiamondError, Result};
use nalgebra::SMatrix;

/// 25×25 matrix over base-out states
pub type StateMatrix = SMatrix<f64, TOTAL_STATES, TOTAL_STATES>;

/// Row-sum tolerance for a valid stochastic matrix
pub const ROW_SUM_TOLERANCE: f64 = 1e-6;

/// Extra-base power inflation applied on top of the pitcher modifier once a
/// pitcher is compromised
pub const POWER_FATIGUE_FACTOR: f64 = 1.1;

/// Walk inflation per extra pass through the batting order
pub const WALK_INFLATION_PER_PASS: f64 = 0.10;

/// Outcome of a plate appearance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlateEvent {
    Out,
    Walk,
    Single,
    Double,
    Triple,
    HomeRun,
}

impl PlateEvent {
    pub const ALL: [PlateEvent; 6] = [
        PlateEvent::Out,
        PlateEvent::Walk,
        PlateEvent::Single,
        PlateEvent::Double,
        PlateEvent::Triple,
        PlateEvent::HomeRun,
    ];

    fn slot(&self) -> usize {
        match self {
            PlateEvent::Out => 0,
            PlateEvent::Walk => 1,
            PlateEvent::Single => 2,
            PlateEvent::Double => 3,
            PlateEvent::Triple => 4,
            PlateEvent::HomeRun => 5,
        }
    }

    /// Next state and runs scored when this event happens in `state`.
    ///
    /// Base running is fixed: walks only force runners; a single sends the
    /// runner on first to second and scores everyone else; a double puts the
    /// runner from first on third and scores everyone else; a triple clears
    /// the bases and leaves the batter on third; a home run scores everyone.
    pub fn apply(&self, state: BaseOutState) -> (BaseOutState, u32) {
        if state.is_absorbing() {
            return (state, 0);
        }
        let outs = state.outs();
        let r = state.runners();
        match self {
            PlateEvent::Out => (BaseOutState::from_parts(outs + 1, r), 0),
            PlateEvent::Walk => {
                let (next, runs) = match (r.first, r.second, r.third) {
                    (true, true, true) => (Runners::LOADED, 1),
                    (true, true, false) => (Runners::LOADED, 0),
                    (true, false, third) => (Runners::new(true, true, third), 0),
                    (false, second, third) => (Runners::new(true, second, third), 0),
                };
                (BaseOutState::from_parts(outs, next), runs)
            }
            PlateEvent::Single => (
                BaseOutState::from_parts(outs, Runners::new(true, r.first, false)),
                r.second as u32 + r.third as u32,
            ),
            PlateEvent::Double => (
                BaseOutState::from_parts(outs, Runners::new(false, true, r.first)),
                r.second as u32 + r.third as u32,
            ),
            PlateEvent::Triple => (
                BaseOutState::from_parts(outs, Runners::new(false, false, true)),
                r.count(),
            ),
            PlateEvent::HomeRun => (
                BaseOutState::from_parts(outs, Runners::EMPTY),
                r.count() + 1,
            ),
        }
    }
}

/// Per-plate-appearance event probabilities (unnormalised weights)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventRates {
    pub out: f64,
    pub walk: f64,
    pub single: f64,
    pub double: f64,
    pub triple: f64,
    pub home_run: f64,
}

impl EventRates {
    /// League-average baseline
    pub const LEAGUE_AVERAGE: EventRates = EventRates {
        out: 0.68,
        walk: 0.085,
        single: 0.15,
        double: 0.05,
        triple: 0.005,
        home_run: 0.03,
    };

    /// Baseline rates adjusted for pitcher effectiveness, times through the
    /// order and fielding quality.
    ///
    /// - walks grow 10% per pass through the order beyond the first
    /// - singles and walks scale linearly with `pitcher_mod`
    /// - extra-base hits scale with `pitcher_mod × 1.1` once `pitcher_mod > 1`
    /// - poor defense (`defense_mod > 1`) turns outs into free bases, inflating
    ///   singles and walks again
    pub fn adjusted(pitcher_mod: f64, times_through_order: u32, defense_mod: f64) -> Self {
        let pitcher_mod = super::state::sanitize_modifier(pitcher_mod);
        let defense_mod = super::state::sanitize_modifier(defense_mod);
        let base = Self::LEAGUE_AVERAGE;

        let extra_passes = times_through_order.saturating_sub(1) as f64;
        let mut walk = base.walk * (1.0 + WALK_INFLATION_PER_PASS * extra_passes);
        let mut single = base.single;

        walk *= pitcher_mod;
        single *= pitcher_mod;

        let power = if pitcher_mod > 1.0 {
            pitcher_mod * POWER_FATIGUE_FACTOR
        } else {
            pitcher_mod
        };

        if defense_mod > 1.0 {
            walk *= defense_mod;
            single *= defense_mod;
        }

        Self {
            out: base.out,
            walk,
            single,
            double: base.double * power,
            triple: base.triple * power,
            home_run: base.home_run * power,
        }
    }

    pub fn get(&self, event: PlateEvent) -> f64 {
        match event {
            PlateEvent::Out => self.out,
            PlateEvent::Walk => self.walk,
            PlateEvent::Single => self.single,
            PlateEvent::Double => self.double,
            PlateEvent::Triple => self.triple,
            PlateEvent::HomeRun => self.home_run,
        }
    }

    pub fn total(&self) -> f64 {
        self.out + self.offensive_mass()
    }

    /// Weight of every non-out outcome
    pub fn offensive_mass(&self) -> f64 {
        self.walk + self.single + self.double + self.triple + self.home_run
    }

    /// Same rates scaled to sum to one
    pub fn normalized(&self) -> Self {
        let total = self.total();
        if total <= 0.0 {
            return Self::LEAGUE_AVERAGE;
        }
        self.scaled_offense(1.0, total)
    }

    /// Shrink the offensive outcomes so their normalised share stays at or
    /// below `limit` (an inning must still be able to end).
    pub fn with_offense_capped(&self, limit: f64) -> Self {
        let offense = self.offensive_mass();
        let total = self.total();
        if total <= 0.0 || offense / total <= limit || self.out <= 0.0 {
            return *self;
        }
        let k = limit * self.out / (offense * (1.0 - limit));
        self.scaled_offense(k, 1.0)
    }

    fn scaled_offense(&self, k: f64, divisor: f64) -> Self {
        Self {
            out: self.out / divisor,
            walk: self.walk * k / divisor,
            single: self.single * k / divisor,
            double: self.double * k / divisor,
            triple: self.triple * k / divisor,
            home_run: self.home_run * k / divisor,
        }
    }
}

impl Default for EventRates {
    fn default() -> Self {
        Self::LEAGUE_AVERAGE
    }
}

/// Row-stochastic transition matrix over the 25 base-out states
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionMatrix {
    probs: StateMatrix,
}

impl TransitionMatrix {
    /// Wrap a raw matrix after checking it is row-stochastic with an
    /// absorbing final state.
    pub fn from_raw(probs: StateMatrix) -> Result<Self> {
        let matrix = Self { probs };
        matrix.validate()?;
        Ok(matrix)
    }

    pub fn validate(&self) -> Result<()> {
        for i in 0..TOTAL_STATES {
            let row = self.probs.row(i);
            if let Some(v) = row.iter().find(|v| !v.is_finite() || **v < 0.0) {
                return Err(DiamondError::Matrix(format!(
                    "row {} has invalid entry {}",
                    i, v
                )));
            }
            let sum: f64 = row.iter().sum();
            if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
                return Err(DiamondError::Matrix(format!(
                    "row {} sums to {} (expected 1.0)",
                    i, sum
                )));
            }
        }
        if (self.probs[(ABSORBING_INDEX, ABSORBING_INDEX)] - 1.0).abs() > ROW_SUM_TOLERANCE {
            return Err(DiamondError::Matrix(
                "absorbing state must transition only to itself".into(),
            ));
        }
        Ok(())
    }

    pub fn get(&self, from: usize, to: usize) -> f64 {
        self.probs[(from, to)]
    }

    pub fn row_sum(&self, row: usize) -> f64 {
        self.probs.row(row).iter().sum()
    }

    pub fn as_matrix(&self) -> &StateMatrix {
        &self.probs
    }

    /// Row-wise cumulative distribution for inverse-CDF sampling.
    ///
    /// The last column of every row is pinned to exactly 1.0 so a uniform
    /// draw in `[0, 1)` always lands somewhere.
    pub fn cumulative_rows(&self) -> [[f64; TOTAL_STATES]; TOTAL_STATES] {
        let mut cdf = [[0.0; TOTAL_STATES]; TOTAL_STATES];
        for (i, row) in cdf.iter_mut().enumerate() {
            let mut acc = 0.0;
            for (j, cell) in row.iter_mut().enumerate() {
                acc += self.probs[(i, j)];
                *cell = acc;
            }
            row[TOTAL_STATES - 1] = 1.0;
        }
        cdf
    }
}

/// Runs scored on each `(from, to)` transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunMatrix {
    runs: [[u8; TOTAL_STATES]; TOTAL_STATES],
}

impl RunMatrix {
    pub fn get(&self, from: usize, to: usize) -> u32 {
        self.runs[from][to] as u32
    }
}

/// Precomputed event masks and run vectors
#[derive(Debug, Clone)]
pub struct EventMasks {
    masks: [StateMatrix; 6],
    /// Runs scored by each event from each live state
    runs: [[f64; LIVE_STATES]; 6],
    run_matrix: RunMatrix,
}

impl EventMasks {
    pub fn new() -> Self {
        let mut masks = [StateMatrix::zeros(); 6];
        let mut runs = [[0.0; LIVE_STATES]; 6];
        let mut run_matrix = [[0u8; TOTAL_STATES]; TOTAL_STATES];

        for state in BaseOutState::live_states() {
            let i = state.index();
            for event in PlateEvent::ALL {
                let (next, scored) = event.apply(state);
                let j = next.index();
                masks[event.slot()][(i, j)] = 1.0;
                runs[event.slot()][i] = scored as f64;
                // base-running rules never map two events with different run
                // totals onto the same (from, to) pair
                debug_assert!(run_matrix[i][j] == 0 || run_matrix[i][j] as u32 == scored);
                run_matrix[i][j] = scored as u8;
            }
        }

        Self {
            masks,
            runs,
            run_matrix: RunMatrix { runs: run_matrix },
        }
    }

    pub fn mask(&self, event: PlateEvent) -> &StateMatrix {
        &self.masks[event.slot()]
    }

    pub fn runs_for(&self, event: PlateEvent) -> &[f64; LIVE_STATES] {
        &self.runs[event.slot()]
    }

    pub fn run_matrix(&self) -> &RunMatrix {
        &self.run_matrix
    }

    /// Weighted sum of the masks, row-normalised, with the absorbing state
    /// mapped onto itself.
    pub fn transition_matrix(&self, rates: &EventRates) -> TransitionMatrix {
        let rates = rates.normalized();
        let mut probs = StateMatrix::zeros();
        for event in PlateEvent::ALL {
            probs += self.mask(event) * rates.get(event);
        }
        probs[(ABSORBING_INDEX, ABSORBING_INDEX)] = 1.0;
        TransitionMatrix { probs }
    }

    /// Expected runs scored on the very next plate appearance from each
    /// live state
    pub fn immediate_runs(&self, rates: &EventRates) -> [f64; LIVE_STATES] {
        let rates = rates.normalized();
        let mut out = [0.0; LIVE_STATES];
        for event in PlateEvent::ALL {
            let weight = rates.get(event);
            for (acc, runs) in out.iter_mut().zip(self.runs_for(event).iter()) {
                *acc += weight * runs;
            }
        }
        out
    }
}

impl Default for EventMasks {
    fn default() -> Self {
        Self::new()
    }
}

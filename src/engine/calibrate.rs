//! Cross-check of the closed-form engines against the simulator

use super::{MarkovChainService, MonteCarloSimulator, SimulationRequest, StateEngine};
use crate::domain::GameSituation;
use crate::error::Result;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Modifiers applied to one comparison
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComparisonInputs {
    pub pitcher_mod: f64,
    pub defense_mod: f64,
    pub home_bullpen_mod: f64,
    pub away_bullpen_mod: f64,
    pub iterations: usize,
}

impl Default for ComparisonInputs {
    fn default() -> Self {
        Self {
            pitcher_mod: 1.0,
            defense_mod: 1.0,
            home_bullpen_mod: 1.0,
            away_bullpen_mod: 1.0,
            iterations: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineComparison {
    pub situation: GameSituation,
    pub table_prob: f64,
    pub markov_prob: f64,
    pub monte_carlo_prob: f64,
    /// Markov minus Monte Carlo
    pub markov_vs_simulation: f64,
    pub iterations: usize,
}

/// Evaluate one situation with every engine
pub fn compare_engines<R: Rng + ?Sized>(
    table: &StateEngine,
    markov: &MarkovChainService,
    simulator: &MonteCarloSimulator,
    situation: &GameSituation,
    inputs: &ComparisonInputs,
    rng: &mut R,
) -> Result<EngineComparison> {
    let table_prob = table.situation_win_probability(situation, inputs.pitcher_mod);
    let markov_prob = markov.win_probability(situation, inputs.pitcher_mod, inputs.defense_mod);

    let request = SimulationRequest::new(
        situation.home_score,
        situation.away_score,
        situation.inning,
        situation.half,
    )
    .with_state(situation.state())
    .with_bullpens(inputs.home_bullpen_mod, inputs.away_bullpen_mod)
    .with_iterations(inputs.iterations);
    let simulated = simulator.simulate_rest_of_game(&request, rng)?;

    Ok(EngineComparison {
        situation: *situation,
        table_prob,
        markov_prob,
        monte_carlo_prob: simulated.home_win_prob,
        markov_vs_simulation: markov_prob - simulated.home_win_prob,
        iterations: simulated.iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{HalfInning, Runners};
    use crate::engine::SimulationConfig;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_engines_agree_on_direction() {
        let table = StateEngine::new();
        let markov = MarkovChainService::new();
        let simulator = MonteCarloSimulator::new(SimulationConfig::default()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(11);

        let situation = GameSituation {
            inning: 8,
            half: HalfInning::Top,
            outs: 1,
            runners: Runners::EMPTY,
            home_score: 4,
            away_score: 1,
        };
        let inputs = ComparisonInputs {
            iterations: 3_000,
            ..Default::default()
        };
        let cmp = compare_engines(&table, &markov, &simulator, &situation, &inputs, &mut rng).unwrap();

        assert!(cmp.table_prob > 0.5);
        assert!(cmp.markov_prob > 0.5);
        assert!(cmp.monte_carlo_prob > 0.5);
        assert_eq!(cmp.iterations, 3_000);
        assert!((cmp.markov_vs_simulation - (cmp.markov_prob - cmp.monte_carlo_prob)).abs() < 1e-12);
    }
}

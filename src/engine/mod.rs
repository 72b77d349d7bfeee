//! Win-probability engines
//!
//! - [`StateEngine`]: RE24 table lookup plus the logistic model
//! - [`MarkovChainService`]: solved run expectancy under pitcher/defense modifiers
//! - [`MonteCarloSimulator`]: full rest-of-game simulation for validation

pub mod calibrate;
pub mod events;
pub mod markov;
pub mod monte_carlo;
pub mod state;

pub use calibrate::{compare_engines, ComparisonInputs, EngineComparison};
pub use events::{EventMasks, EventRates, PlateEvent, RunMatrix, TransitionMatrix};
pub use markov::{ExpectedRuns, MarkovChainService};
pub use monte_carlo::{MonteCarloSimulator, SimulationConfig, SimulationRequest, SimulationResult};
pub use state::{logistic_win_probability, sigmoid, StateEngine, RE24_BASELINE};

//! Trading decisions
//!
//! Odds math, Kelly sizing, the trader agent, execution signals and the
//! simulated market used for shadow runs.

pub mod kelly;
pub mod market;
pub mod odds;
pub mod signal;
pub mod trader;

pub use kelly::{full_kelly, leverage_multiplier, KellySizer};
pub use market::{MarketSimulator, OddsSource};
pub use odds::{american_to_decimal, implied_probability, probability_to_american};
pub use signal::{generate_tier1_signal, SignalInput, Tier1Signal};
pub use trader::{TraderAgent, TraderConfig};

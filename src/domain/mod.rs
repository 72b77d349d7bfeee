pub mod game;
pub mod latency;
pub mod trade;

pub use game::*;
pub use latency::*;
pub use trade::*;

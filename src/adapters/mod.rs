pub mod feed;

pub use feed::{
    BullpenHistorySource, CachedBullpenHistory, LiveFeed, ReplayFeed, StaticBullpenHistory,
};

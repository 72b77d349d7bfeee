use serde::{Deserialize, Serialize};
use std::fmt;

/// Game identifier (MLB game pk)
pub type GameId = u64;

/// Number of live base-out states
pub const LIVE_STATES: usize = 24;

/// Total states including the absorbing "inning over" state
pub const TOTAL_STATES: usize = 25;

/// Index of the absorbing state (three outs)
pub const ABSORBING_INDEX: usize = 24;

/// Which half of an inning is being played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HalfInning {
    /// Away team batting, home team pitching
    Top,
    /// Home team batting, away team pitching
    Bottom,
}

impl HalfInning {
    pub fn from_is_top(is_top: bool) -> Self {
        if is_top {
            HalfInning::Top
        } else {
            HalfInning::Bottom
        }
    }

    pub fn is_top(&self) -> bool {
        matches!(self, HalfInning::Top)
    }

    /// True when the home side is at bat
    pub fn home_batting(&self) -> bool {
        matches!(self, HalfInning::Bottom)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HalfInning::Top => "Top",
            HalfInning::Bottom => "Bot",
        }
    }
}

impl fmt::Display for HalfInning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Occupied bases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Runners {
    pub first: bool,
    pub second: bool,
    pub third: bool,
}

impl Runners {
    pub const EMPTY: Runners = Runners {
        first: false,
        second: false,
        third: false,
    };

    pub const LOADED: Runners = Runners {
        first: true,
        second: true,
        third: true,
    };

    pub fn new(first: bool, second: bool, third: bool) -> Self {
        Self {
            first,
            second,
            third,
        }
    }

    /// Build from 0/1 flags as delivered by the live feed
    pub fn from_flags(flags: [u8; 3]) -> Self {
        Self::new(flags[0] != 0, flags[1] != 0, flags[2] != 0)
    }

    /// Feed-style bitmask: 1 = first, 2 = second, 4 = third
    pub fn bitmask(&self) -> u8 {
        (self.first as u8) | ((self.second as u8) << 1) | ((self.third as u8) << 2)
    }

    pub fn count(&self) -> u32 {
        self.first as u32 + self.second as u32 + self.third as u32
    }

    pub fn as_flags(&self) -> [u8; 3] {
        [self.first as u8, self.second as u8, self.third as u8]
    }
}

/// One of the 24 live base-out states or the absorbing "inning over" state.
///
/// Live states are enumerated in `(outs, r1, r2, r3)` order with third base as
/// the least significant bit: `index = outs * 8 + r1 * 4 + r2 * 2 + r3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BaseOutState(u8);

impl BaseOutState {
    pub const START: BaseOutState = BaseOutState(0);
    pub const INNING_OVER: BaseOutState = BaseOutState(ABSORBING_INDEX as u8);

    /// The 24 live states in index order
    pub const ALL_LIVE: [BaseOutState; LIVE_STATES] = {
        let mut states = [BaseOutState(0); LIVE_STATES];
        let mut i = 0;
        while i < LIVE_STATES {
            states[i] = BaseOutState(i as u8);
            i += 1;
        }
        states
    };

    /// Index for a situation. Three or more outs always map to the absorbing state.
    pub fn from_parts(outs: u8, runners: Runners) -> Self {
        if outs >= 3 {
            return Self::INNING_OVER;
        }
        let idx = outs * 8
            + (runners.first as u8) * 4
            + (runners.second as u8) * 2
            + runners.third as u8;
        BaseOutState(idx)
    }

    /// Build from a raw index; anything past 24 is rejected.
    pub fn from_index(index: usize) -> Option<Self> {
        (index < TOTAL_STATES).then_some(BaseOutState(index as u8))
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }

    pub fn is_absorbing(&self) -> bool {
        self.index() == ABSORBING_INDEX
    }

    /// Outs recorded (3 for the absorbing state)
    pub fn outs(&self) -> u8 {
        if self.is_absorbing() {
            3
        } else {
            self.0 / 8
        }
    }

    pub fn runners(&self) -> Runners {
        if self.is_absorbing() {
            return Runners::EMPTY;
        }
        let bits = self.0 % 8;
        Runners::new(bits & 4 != 0, bits & 2 != 0, bits & 1 != 0)
    }

    /// All live states in index order
    pub fn live_states() -> impl Iterator<Item = BaseOutState> {
        Self::ALL_LIVE.into_iter()
    }
}

impl fmt::Display for BaseOutState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_absorbing() {
            return write!(f, "inning over");
        }
        let r = self.runners();
        write!(
            f,
            "{} out, {}{}{}",
            self.outs(),
            if r.first { '1' } else { '-' },
            if r.second { '2' } else { '-' },
            if r.third { '3' } else { '-' },
        )
    }
}

/// Complete in-game situation used by the probability engines
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GameSituation {
    pub inning: u32,
    pub half: HalfInning,
    pub outs: u8,
    pub runners: Runners,
    pub home_score: u32,
    pub away_score: u32,
}

impl GameSituation {
    pub fn state(&self) -> BaseOutState {
        BaseOutState::from_parts(self.outs, self.runners)
    }

    /// Home minus away
    pub fn score_diff(&self) -> i32 {
        self.home_score as i32 - self.away_score as i32
    }

    /// Label such as "Bot 8"
    pub fn inning_label(&self) -> String {
        format!("{} {}", self.half, self.inning)
    }
}

/// One play-by-play update from the upstream live feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedEvent {
    pub game_id: GameId,
    #[serde(default)]
    pub home_team: String,
    #[serde(default)]
    pub away_team: String,
    pub inning: u32,
    pub is_top: bool,
    pub outs: u8,
    /// 0/1 flags for first, second, third
    #[serde(default)]
    pub runners: [u8; 3],
    pub home_score: u32,
    pub away_score: u32,
    #[serde(default)]
    pub pitcher_id: Option<u64>,
    #[serde(default)]
    pub pitcher_name: Option<String>,
    /// Whether the current pitcher started the game
    #[serde(default = "default_is_starter")]
    pub is_starter: bool,
    /// Pitches thrown during this plate appearance
    #[serde(default)]
    pub pitches: u32,
    /// Fielding errors charged to the defense on this play
    #[serde(default)]
    pub errors: u32,
    /// Raw event timestamp from the feed (ISO 8601)
    #[serde(default)]
    pub event_timestamp: Option<String>,
}

fn default_is_starter() -> bool {
    true
}

impl FeedEvent {
    pub fn situation(&self) -> GameSituation {
        GameSituation {
            inning: self.inning.max(1),
            half: HalfInning::from_is_top(self.is_top),
            outs: self.outs,
            runners: Runners::from_flags(self.runners),
            home_score: self.home_score,
            away_score: self.away_score,
        }
    }

    pub fn matchup(&self) -> String {
        format!("{} @ {}", self.away_team, self.home_team)
    }
}

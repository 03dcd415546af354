use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Newtype wrapper for play indices. Unique and strictly increasing
/// within a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayId(pub u32);

impl fmt::Display for PlayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A (home, away) score pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Score {
    pub home: u32,
    pub away: u32,
}

/// Which side is ahead at a given score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Leader {
    Home,
    Away,
    Tied,
}

impl Score {
    pub const ZERO: Score = Score { home: 0, away: 0 };

    pub fn new(home: u32, away: u32) -> Self {
        Self { home, away }
    }

    pub fn total(&self) -> u32 {
        self.home + self.away
    }

    pub fn leader(&self) -> Leader {
        match self.home.cmp(&self.away) {
            Ordering::Greater => Leader::Home,
            Ordering::Less => Leader::Away,
            Ordering::Equal => Leader::Tied,
        }
    }

    /// Absolute point margin between the teams.
    pub fn margin(&self) -> u32 {
        self.home.abs_diff(self.away)
    }

    /// True if either side's score went down going from `self` to `later`.
    pub fn decreases_to(&self, later: &Score) -> bool {
        later.home < self.home || later.away < self.away
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.home, self.away)
    }
}

/// One normalized play-by-play event. Owned by the caller and read-only
/// to the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Play {
    pub play_index: PlayId,
    pub period: u32,
    /// `"M:SS"`, descending within a period.
    pub game_clock: String,
    pub play_type: String,
    #[serde(default)]
    pub team_abbreviation: Option<String>,
    #[serde(default)]
    pub player_name: Option<String>,
    pub description: String,
    pub home_score: u32,
    pub away_score: u32,
    /// Opaque source payload, carried through untouched.
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl Play {
    pub fn id(&self) -> PlayId {
        self.play_index
    }

    pub fn score(&self) -> Score {
        Score::new(self.home_score, self.away_score)
    }

    /// Player name, ignoring blank strings from sloppy feeds.
    pub fn player(&self) -> Option<&str> {
        self.player_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    pub fn team(&self) -> Option<&str> {
        self.team_abbreviation
            .as_deref()
            .map(str::trim)
            .filter(|team| !team.is_empty())
    }
}

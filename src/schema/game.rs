use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::play::{Play, Score};

/// League code, used for period-label formatting and flag resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum League {
    Nba,
    Wnba,
    Ncaab,
    Nhl,
}

/// How a league divides regulation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeriodFormat {
    Quarters,
    Halves,
    Hockey,
}

impl League {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Nba => "NBA",
            Self::Wnba => "WNBA",
            Self::Ncaab => "NCAAB",
            Self::Nhl => "NHL",
        }
    }

    pub fn period_format(&self) -> PeriodFormat {
        match self {
            Self::Nba | Self::Wnba => PeriodFormat::Quarters,
            Self::Ncaab => PeriodFormat::Halves,
            Self::Nhl => PeriodFormat::Hockey,
        }
    }

    /// Short period label: `Q3`, `H2`, `P1`, `OT`, `2OT`, `SO`.
    ///
    /// Hockey periods past the shootout continue the overtime count from
    /// `2OT`, so period 6 is `2OT` and period 7 is `3OT`.
    pub fn period_label(&self, period: u32) -> String {
        let regulation = match self.period_format() {
            PeriodFormat::Quarters => 4,
            PeriodFormat::Halves => 2,
            PeriodFormat::Hockey => 3,
        };
        if period == 0 {
            return "PRE".to_string();
        }
        if period <= regulation {
            let prefix = match self.period_format() {
                PeriodFormat::Quarters => "Q",
                PeriodFormat::Halves => "H",
                PeriodFormat::Hockey => "P",
            };
            return format!("{}{}", prefix, period);
        }
        let mut extra = period - regulation;
        if self.period_format() == PeriodFormat::Hockey {
            match extra {
                2 => return "SO".to_string(),
                3.. => extra -= 1,
                _ => {}
            }
        }
        if extra == 1 {
            "OT".to_string()
        } else {
            format!("{}OT", extra)
        }
    }
}

/// Game and team metadata supplied with the play list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameInfo {
    pub game_id: String,
    pub league: League,
    pub home_team: String,
    pub away_team: String,
    pub home_abbreviation: String,
    pub away_abbreviation: String,
}

/// One player's line in the box score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerLine {
    pub name: String,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub points: u32,
    #[serde(default)]
    pub rebounds: u32,
    #[serde(default)]
    pub assists: u32,
}

/// Final box score. The guardrail layer treats it as the source of
/// truth for which players and numbers may appear in rewritten text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoxScore {
    pub players: Vec<PlayerLine>,
    pub final_score: Score,
}

impl BoxScore {
    /// Derive a box score from the play list: points are credited from
    /// score deltas to the play's named player, rebounds and assists are
    /// counted from descriptions.
    pub fn from_plays(plays: &[Play]) -> Self {
        let mut lines: BTreeMap<String, PlayerLine> = BTreeMap::new();
        let mut previous = Score::ZERO;

        for play in plays {
            let score = play.score();
            let delta = score.total().saturating_sub(previous.total());
            previous = score;

            let Some(name) = play.player() else {
                continue;
            };
            let line = lines.entry(name.to_string()).or_insert_with(|| PlayerLine {
                name: name.to_string(),
                team: play.team().map(str::to_string),
                points: 0,
                rebounds: 0,
                assists: 0,
            });
            line.points += delta;
            let description = play.description.to_lowercase();
            if description.contains("rebound") {
                line.rebounds += 1;
            }
            if description.contains("assist") {
                line.assists += 1;
            }
        }

        Self {
            players: lines.into_values().collect(),
            final_score: previous,
        }
    }

    pub fn player_names(&self) -> impl Iterator<Item = &str> {
        self.players.iter().map(|p| p.name.as_str())
    }

    /// Every number the box score can vouch for.
    pub fn numerals(&self) -> Vec<String> {
        let mut out = vec![
            self.final_score.home.to_string(),
            self.final_score.away.to_string(),
        ];
        for line in &self.players {
            out.push(line.points.to_string());
            out.push(line.rebounds.to_string());
            out.push(line.assists.to_string());
        }
        out.sort();
        out.dedup();
        out
    }
}

/// Everything needed to process one game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameInput {
    pub info: GameInfo,
    pub plays: Vec<Play>,
    #[serde(default)]
    pub box_score: Option<BoxScore>,
}

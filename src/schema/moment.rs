use serde::{Deserialize, Serialize};

use super::play::{PlayId, Score};

/// Whether a boundary could have been withdrawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoundaryStrength {
    Hard,
    Soft,
}

/// Why a moment closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BoundaryReason {
    /// The absolute play-count safety cap was reached.
    AbsoluteCap,
    LeadChange,
    /// The next play would push the explicit-play count past two.
    ExplicitCap,
    /// The next play belongs to another period.
    PeriodEnd,
    EndOfGame,
    SoftCap,
    Scoring,
    Stoppage,
    Turnover,
    SecondExplicitPlay,
}

impl BoundaryReason {
    pub fn strength(&self) -> BoundaryStrength {
        match self {
            Self::AbsoluteCap
            | Self::LeadChange
            | Self::ExplicitCap
            | Self::PeriodEnd
            | Self::EndOfGame => BoundaryStrength::Hard,
            Self::SoftCap
            | Self::Scoring
            | Self::Stoppage
            | Self::Turnover
            | Self::SecondExplicitPlay => BoundaryStrength::Soft,
        }
    }

    /// Soft reasons that flow continuity may override. The soft cap
    /// always stands.
    pub fn is_mergeable(&self) -> bool {
        matches!(
            self,
            Self::Scoring | Self::Stoppage | Self::Turnover | Self::SecondExplicitPlay
        )
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::AbsoluteCap => "ABSOLUTE_CAP",
            Self::LeadChange => "LEAD_CHANGE",
            Self::ExplicitCap => "EXPLICIT_CAP",
            Self::PeriodEnd => "PERIOD_END",
            Self::EndOfGame => "END_OF_GAME",
            Self::SoftCap => "SOFT_CAP",
            Self::Scoring => "SCORING",
            Self::Stoppage => "STOPPAGE",
            Self::Turnover => "TURNOVER",
            Self::SecondExplicitPlay => "SECOND_EXPLICIT_PLAY",
        }
    }
}

/// The smallest narratable unit: a contiguous run of plays with at most
/// two plays any narrative must mention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Moment {
    pub play_ids: Vec<PlayId>,
    pub explicitly_narrated_play_ids: Vec<PlayId>,
    pub score_before: Score,
    pub score_after: Score,
    pub period: u32,
    pub start_clock: String,
    pub end_clock: String,
    #[serde(default)]
    pub narrative: Option<String>,
    pub boundary_reason: BoundaryReason,
}

impl Moment {
    pub fn first_play(&self) -> Option<PlayId> {
        self.play_ids.first().copied()
    }

    pub fn last_play(&self) -> Option<PlayId> {
        self.play_ids.last().copied()
    }

    pub fn contains(&self, id: PlayId) -> bool {
        self.play_ids.binary_search(&id).is_ok()
    }

    pub fn narrative_text(&self) -> &str {
        self.narrative.as_deref().unwrap_or("")
    }
}

use serde::{Deserialize, Serialize};

use super::play::{PlayId, Score};

/// The semantic role a block plays in the game's arc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockRole {
    Setup,
    MomentumShift,
    Response,
    DecisionPoint,
    Resolution,
}

impl BlockRole {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Setup => "SETUP",
            Self::MomentumShift => "MOMENTUM_SHIFT",
            Self::Response => "RESPONSE",
            Self::DecisionPoint => "DECISION_POINT",
            Self::Resolution => "RESOLUTION",
        }
    }
}

/// A contiguous group of moments forming one narrative beat. Serves as
/// a chapter of the finished story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub block_id: String,
    pub moment_indices: Vec<usize>,
    pub role: BlockRole,
    pub score_before: Score,
    pub score_after: Score,
    pub play_ids: Vec<PlayId>,
    pub key_play_ids: Vec<PlayId>,
    #[serde(default)]
    pub narrative: Option<String>,
}

impl Block {
    pub fn word_count(&self) -> usize {
        self.narrative
            .as_deref()
            .map(|n| n.split_whitespace().count())
            .unwrap_or(0)
    }
}

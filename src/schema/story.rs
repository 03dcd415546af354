use serde::{Deserialize, Serialize};

use super::block::Block;
use super::game::League;

/// Counters describing how the story's text was produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoryMetadata {
    pub game_id: String,
    pub league: Option<League>,
    pub play_count: usize,
    pub moment_count: usize,
    pub generated_narratives: usize,
    pub fallback_narratives: usize,
    pub injected_narratives: usize,
    pub total_words: usize,
}

/// The finished recap: ordered chapters plus summary data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStory {
    pub chapters: Vec<Block>,
    #[serde(default)]
    pub compact_story: Option<String>,
    pub reading_time_estimate_minutes: f64,
    pub metadata: StoryMetadata,
}

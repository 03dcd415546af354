//! Testing utilities.
//!
//! - `MockGenerator` returns scripted replies in order and records prompts
//! - `PlayBuilder` builds plays without spelling out every field

use async_trait::async_trait;
use std::sync::Mutex;

use crate::core::llm::{Generation, GenerationError, TextGenerator};
use crate::schema::play::{Play, PlayId};

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String, f32),
    Fail(String),
    /// Never completes; exercises timeouts.
    Hang,
}

/// A generator that replays a script. Once the script runs out every call
/// fails.
#[derive(Debug, Default)]
pub struct MockGenerator {
    replies: Mutex<Vec<MockReply>>,
    prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    pub fn new(mut replies: Vec<MockReply>) -> Self {
        replies.reverse();
        Self {
            replies: Mutex::new(replies),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Every call answers with the same text.
    pub fn always(text: &str, confidence: f32, times: usize) -> Self {
        Self::new(vec![MockReply::Text(text.to_string(), confidence); times])
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, prompt: &str) -> Result<Generation, GenerationError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        let reply = self.replies.lock().ok().and_then(|mut r| r.pop());
        match reply {
            Some(MockReply::Text(text, confidence)) => Ok(Generation::new(text, confidence)),
            Some(MockReply::Fail(message)) => Err(GenerationError::Failed(message)),
            Some(MockReply::Hang) => std::future::pending().await,
            None => Err(GenerationError::Failed("script exhausted".to_string())),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Fluent builder for test plays.
#[derive(Debug, Clone)]
pub struct PlayBuilder {
    play: Play,
}

impl PlayBuilder {
    pub fn new(index: u32) -> Self {
        Self {
            play: Play {
                play_index: PlayId(index),
                period: 1,
                game_clock: "12:00".to_string(),
                play_type: "event".to_string(),
                team_abbreviation: None,
                player_name: None,
                description: String::new(),
                home_score: 0,
                away_score: 0,
                raw: serde_json::Value::Null,
            },
        }
    }

    pub fn period(mut self, period: u32) -> Self {
        self.play.period = period;
        self
    }

    pub fn clock(mut self, clock: &str) -> Self {
        self.play.game_clock = clock.to_string();
        self
    }

    pub fn kind(mut self, play_type: &str) -> Self {
        self.play.play_type = play_type.to_string();
        self
    }

    pub fn player(mut self, name: &str) -> Self {
        self.play.player_name = Some(name.to_string());
        self
    }

    pub fn team(mut self, abbreviation: &str) -> Self {
        self.play.team_abbreviation = Some(abbreviation.to_string());
        self
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.play.description = description.to_string();
        self
    }

    pub fn score(mut self, home: u32, away: u32) -> Self {
        self.play.home_score = home;
        self.play.away_score = away;
        self
    }

    pub fn build(self) -> Play {
        self.play
    }
}

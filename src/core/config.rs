//! Pipeline configuration: thresholds and caps for every stage,
//! loadable from RON.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::core::flags::FlagResolver;
use crate::core::tone::ToneProfile;

/// Hard cap on explicitly narrated plays per moment. Not configurable.
pub const EXPLICIT_PLAY_CAP: usize = 2;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Preferred maximum plays per moment.
    pub soft_play_cap: usize,
    /// Safety cap that always closes a moment.
    pub absolute_play_cap: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            soft_play_cap: 10,
            absolute_play_cap: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Moments per generation call.
    pub batch_size: usize,
    pub description_max_chars: usize,
    pub min_sentences: usize,
    pub max_sentences: usize,
    pub call_timeout_ms: u64,
    /// Transport retries after a failed or timed-out call.
    pub call_retries: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            description_max_chars: 100,
            min_sentences: 2,
            max_sentences: 4,
            call_timeout_ms: 30_000,
            call_retries: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockConfig {
    pub min_blocks: usize,
    pub max_blocks: usize,
    pub min_words: usize,
    pub max_words: usize,
    pub total_word_budget: usize,
    pub max_key_plays: usize,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            min_blocks: 4,
            max_blocks: 7,
            min_words: 20,
            max_words: 160,
            total_word_budget: 900,
            max_key_plays: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardrailConfig {
    pub confidence_threshold: f32,
    pub max_rewrite_sentences: usize,
    /// Rewrite length may not exceed this multiple of the original.
    pub max_length_ratio: f32,
    pub max_transition_sentence_words: usize,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.6,
            max_rewrite_sentences: 4,
            max_length_ratio: 1.5,
            max_transition_sentence_words: 25,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub segmentation: SegmentationConfig,
    pub render: RenderConfig,
    pub blocks: BlockConfig,
    pub guardrail: GuardrailConfig,
    pub flags: FlagResolver,
    pub tone: ToneProfile,
}

impl PipelineConfig {
    pub fn load_from_ron(path: &Path) -> Result<PipelineConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<PipelineConfig, ConfigError> {
        let config: PipelineConfig = ron::from_str(input)?;
        config.check()?;
        Ok(config)
    }

    /// Reject combinations no stage can work with.
    pub fn check(&self) -> Result<(), ConfigError> {
        let seg = &self.segmentation;
        if seg.soft_play_cap == 0 || seg.absolute_play_cap < seg.soft_play_cap {
            return Err(ConfigError::Invalid(format!(
                "play caps must satisfy 0 < soft ({}) <= absolute ({})",
                seg.soft_play_cap, seg.absolute_play_cap
            )));
        }
        if self.render.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be positive".to_string()));
        }
        if self.render.min_sentences > self.render.max_sentences {
            return Err(ConfigError::Invalid(
                "min_sentences exceeds max_sentences".to_string(),
            ));
        }
        if self.blocks.min_blocks == 0 || self.blocks.min_blocks > self.blocks.max_blocks {
            return Err(ConfigError::Invalid(format!(
                "block range {}..={} is empty",
                self.blocks.min_blocks, self.blocks.max_blocks
            )));
        }
        if !(0.0..=1.0).contains(&self.guardrail.confidence_threshold) {
            return Err(ConfigError::Invalid(
                "confidence_threshold must be within [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_check() {
        PipelineConfig::default().check().unwrap();
    }

    #[test]
    fn partial_ron_fills_defaults() {
        let config = PipelineConfig::parse_ron(
            r#"(
                segmentation: (soft_play_cap: 6),
                guardrail: (confidence_threshold: 0.75),
                tone: Analyst,
            )"#,
        )
        .unwrap();
        assert_eq!(config.segmentation.soft_play_cap, 6);
        assert_eq!(config.segmentation.absolute_play_cap, 30);
        assert_eq!(config.render.batch_size, 50);
        assert!((config.guardrail.confidence_threshold - 0.75).abs() < f32::EPSILON);
        assert_eq!(config.tone, ToneProfile::Analyst);
    }

    #[test]
    fn inverted_caps_rejected() {
        let err = PipelineConfig::parse_ron(
            "(segmentation: (soft_play_cap: 40, absolute_play_cap: 30))",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_ron_is_an_error() {
        assert!(matches!(
            PipelineConfig::parse_ron("(segmentation: ["),
            Err(ConfigError::Ron(_))
        ));
    }
}

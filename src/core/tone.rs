use serde::{Deserialize, Serialize};

use crate::core::flags::FeatureFlags;

/// Wording style for augmentation prompts. A tone never changes which
/// facts are stated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToneProfile {
    #[default]
    Neutral,
    Analyst,
    Fan,
    Minimal,
}

impl ToneProfile {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Neutral => "NEUTRAL",
            Self::Analyst => "ANALYST",
            Self::Fan => "FAN",
            Self::Minimal => "MINIMAL",
        }
    }

    /// Prompt instructions for this tone.
    pub fn instructions(&self) -> &'static str {
        match self {
            Self::Neutral => "Write in a plain, neutral wire-service register.",
            Self::Analyst => {
                "Write like a tactical analyst: name actions and sequences precisely, keep sentences compact."
            }
            Self::Fan => {
                "Write with warm, energetic wording suited to a general audience, without opinions or exaggeration."
            }
            Self::Minimal => "Use the fewest words that still state every fact.",
        }
    }

    /// The tone actually in effect: the requested one when tone profiles
    /// are enabled, otherwise neutral.
    pub fn effective(self, flags: &FeatureFlags) -> ToneProfile {
        if flags.enable_tone_profiles {
            self
        } else {
            ToneProfile::Neutral
        }
    }
}

//! Forbidden-language rules for narrative text.
//!
//! Narratives state what happened. Momentum talk, hindsight, speculation,
//! subjective adjectives, crowd colour and guesses about intent are all
//! rejected. Plain descriptions of runs ("scoring run", "unanswered
//! points", "extended the lead") are facts and pass.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// The family a forbidden phrase belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StyleViolationType {
    Momentum,
    Retrospective,
    Speculation,
    SubjectiveAdjective,
    CrowdAtmosphere,
    IntentSpeculation,
}

/// One forbidden phrase found in a narrative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleViolation {
    pub kind: StyleViolationType,
    pub matched: String,
}

const PATTERNS: &[(StyleViolationType, &str)] = &[
    (StyleViolationType::Momentum, r"\bmomentum\b"),
    (StyleViolationType::Momentum, r"\btook over\b"),
    (StyleViolationType::Momentum, r"\bturning point\b"),
    (StyleViolationType::Momentum, r"\b(?:caught|on) fire\b"),
    (StyleViolationType::Momentum, r"\bswung the game\b"),
    (StyleViolationType::Momentum, r"\bshifted the (?:game|tide)\b"),
    (StyleViolationType::Retrospective, r"\blooking back\b"),
    (StyleViolationType::Retrospective, r"\bin hindsight\b"),
    (StyleViolationType::Retrospective, r"\bwould prove\b"),
    (StyleViolationType::Retrospective, r"\bproved to be\b"),
    (StyleViolationType::Retrospective, r"\bultimately\b"),
    (StyleViolationType::Retrospective, r"\bsealed (?:the|their|his|her) fate\b"),
    (StyleViolationType::Speculation, r"\b(?:could|might|would) have\b"),
    (StyleViolationType::Speculation, r"\b(?:seemed|appeared) to\b"),
    (StyleViolationType::Speculation, r"\bperhaps\b"),
    (StyleViolationType::SubjectiveAdjective, r"\bclutch\b"),
    (StyleViolationType::SubjectiveAdjective, r"\bdominan(?:t|ce)\b"),
    (StyleViolationType::SubjectiveAdjective, r"\bdominated\b"),
    (
        StyleViolationType::SubjectiveAdjective,
        r"\b(?:spectacular|brilliant|incredible|amazing|stunning|electric|electrifying)\b",
    ),
    (StyleViolationType::SubjectiveAdjective, r"\b(?:huge|massive|monster)\b"),
    (StyleViolationType::CrowdAtmosphere, r"\bcrowd\b"),
    (StyleViolationType::CrowdAtmosphere, r"\bfans\b"),
    (StyleViolationType::CrowdAtmosphere, r"\batmosphere\b"),
    (StyleViolationType::CrowdAtmosphere, r"\b(?:arena|building) (?:erupted|exploded)\b"),
    (StyleViolationType::IntentSpeculation, r"\bfelt\b"),
    (StyleViolationType::IntentSpeculation, r"\bwanted to\b"),
    (StyleViolationType::IntentSpeculation, r"\bdetermined to\b"),
    (StyleViolationType::IntentSpeculation, r"\bfrustrat\w*"),
    (StyleViolationType::IntentSpeculation, r"\b(?:confident|desperate|desperation)\b"),
];

/// A compiled forbidden-phrase table. Build once and share by reference.
#[derive(Debug, Clone)]
pub struct ForbiddenLanguage {
    rules: Vec<(StyleViolationType, Regex)>,
}

static DEFAULT_RULES: LazyLock<ForbiddenLanguage> = LazyLock::new(|| {
    ForbiddenLanguage::from_patterns(PATTERNS).expect("built-in forbidden patterns compile")
});

impl ForbiddenLanguage {
    /// The process-wide built-in table.
    pub fn standard() -> &'static ForbiddenLanguage {
        &DEFAULT_RULES
    }

    /// Compile a custom table. Matching is always case-insensitive.
    pub fn from_patterns(patterns: &[(StyleViolationType, &str)]) -> Result<Self, regex::Error> {
        let rules = patterns
            .iter()
            .map(|(kind, pattern)| Ok((*kind, Regex::new(&format!("(?i){}", pattern))?)))
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { rules })
    }

    pub fn find(&self, text: &str) -> Vec<StyleViolation> {
        let mut found = Vec::new();
        for (kind, regex) in &self.rules {
            for m in regex.find_iter(text) {
                found.push(StyleViolation {
                    kind: *kind,
                    matched: m.as_str().to_lowercase(),
                });
            }
        }
        found
    }

    pub fn is_clean(&self, text: &str) -> bool {
        self.rules.iter().all(|(_, regex)| !regex.is_match(text))
    }

    /// Example words for prompt instructions.
    pub fn prompt_examples(&self) -> &'static [&'static str] {
        &[
            "momentum",
            "took over",
            "clutch",
            "dominant",
            "felt",
            "crowd",
            "ultimately",
            "seemed to",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_each_family() {
        let rules = ForbiddenLanguage::standard();
        let cases = [
            ("The Knicks seized momentum.", StyleViolationType::Momentum),
            ("Brunson took over late.", StyleViolationType::Momentum),
            ("That basket would prove decisive.", StyleViolationType::Retrospective),
            ("He could have passed.", StyleViolationType::Speculation),
            ("A clutch jumper.", StyleViolationType::SubjectiveAdjective),
            ("A Dominant stretch.", StyleViolationType::SubjectiveAdjective),
            ("The crowd roared.", StyleViolationType::CrowdAtmosphere),
            ("Hart felt the pressure.", StyleViolationType::IntentSpeculation),
            ("A frustrated Randle fouled.", StyleViolationType::IntentSpeculation),
        ];
        for (text, kind) in cases {
            let found = rules.find(text);
            assert!(
                found.iter().any(|v| v.kind == kind),
                "expected {:?} in {:?}, got {:?}",
                kind,
                text,
                found
            );
        }
    }

    #[test]
    fn factual_phrasing_allowed() {
        let rules = ForbiddenLanguage::standard();
        for text in [
            "The Knicks went on a 9-0 scoring run.",
            "Boston scored seven unanswered points.",
            "Brunson's layup extended the lead to 12.",
            "Hart grabbed a defensive rebound and pushed ahead.",
        ] {
            assert!(rules.is_clean(text), "unexpected violation in {:?}", text);
        }
    }

    #[test]
    fn word_boundaries_respected() {
        let rules = ForbiddenLanguage::standard();
        // Forbidden words embedded in names do not count.
        assert!(rules.is_clean("Feltham passed to Ofansa."));
    }

    #[test]
    fn custom_table() {
        let rules =
            ForbiddenLanguage::from_patterns(&[(StyleViolationType::Momentum, r"\bheater\b")])
                .unwrap();
        assert!(!rules.is_clean("He was on a HEATER."));
        assert!(rules.is_clean("He was on a heat check."));
    }
}

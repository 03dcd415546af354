//! Optional text augmentation: per-moment rewrites and chapter
//! transitions. Generated text is accepted only when it passes every
//! check; otherwise the deterministic text stands unchanged.

use regex::Regex;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use crate::core::config::GuardrailConfig;
use crate::core::coverage::check_coverage;
use crate::core::flags::FeatureFlags;
use crate::core::language::ForbiddenLanguage;
use crate::core::llm::{call_bounded, CallPolicy, GenerationError, TextGenerator};
use crate::core::prompt::{json_object, parse_single_response};
use crate::core::sentences::{count_sentences, split_sentences, word_count};
use crate::core::tone::ToneProfile;
use crate::schema::block::Block;
use crate::schema::game::{BoxScore, GameInfo};
use crate::schema::moment::Moment;
use crate::schema::play::{Play, PlayId};

static NUMERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("numeral pattern compiles"));

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z][A-Za-z'’\-]*").expect("word pattern compiles"));

/// Capitalised words that are never names, mostly sentence openers.
const COMMON_CAPITALIZED: &[&str] = &[
    "the", "a", "an", "he", "she", "they", "his", "her", "their", "it", "its", "after", "before",
    "then", "with", "on", "in", "at", "from", "both", "later", "early", "late", "that", "this",
    "when", "while", "as", "by", "for", "of", "to", "and", "but", "so", "yet", "still", "once",
    "again", "even", "now", "soon", "there", "these", "those", "another", "each", "every", "one",
    "two", "three", "despite", "meanwhile", "moments", "minutes", "seconds", "over", "down", "up",
    "back", "what", "just", "only", "neither", "nobody", "no", "not", "all", "some", "if",
];

/// One reason a rewrite was rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RewriteViolation {
    LowConfidence { confidence: f32, threshold: f32 },
    Empty,
    DroppedNumeral { numeral: String },
    InventedNumeral { numeral: String },
    UnknownName { name: String },
    TooManySentences { count: usize, max: usize },
    TooLong { ratio: f32, max: f32 },
    ForbiddenLanguage { matched: String },
    MissingExplicitPlay { play_id: PlayId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RewriteFallbackReason {
    LowConfidence,
    ValidationFailed,
    GenerationFailed,
    Timeout,
}

impl From<&GenerationError> for RewriteFallbackReason {
    fn from(err: &GenerationError) -> Self {
        match err {
            GenerationError::Failed(_) => Self::GenerationFailed,
            GenerationError::Timeout(_) => Self::Timeout,
        }
    }
}

/// The outcome of rewriting one moment. On fallback the rewritten text
/// is exactly the template text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentRewrite {
    pub moment_index: usize,
    pub template_summary: String,
    pub rewritten_summary: String,
    pub used_fallback: bool,
    pub fallback_reason: Option<RewriteFallbackReason>,
    pub confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<RewriteViolation>,
}

impl MomentRewrite {
    fn fallback(
        moment_index: usize,
        template: &str,
        reason: RewriteFallbackReason,
        confidence: Option<f32>,
        violations: Vec<RewriteViolation>,
    ) -> Self {
        Self {
            moment_index,
            template_summary: template.to_string(),
            rewritten_summary: template.to_string(),
            used_fallback: true,
            fallback_reason: Some(reason),
            confidence,
            violations,
        }
    }
}

fn numerals(text: &str) -> Vec<String> {
    NUMERAL.find_iter(text).map(|m| m.as_str().to_string()).collect()
}

fn is_capitalized(token: &str) -> bool {
    let mut chars = token.chars();
    chars.next().is_some_and(char::is_uppercase) && chars.any(char::is_lowercase)
}

fn strip_possessive(token: &str) -> &str {
    token
        .strip_suffix("'s")
        .or_else(|| token.strip_suffix("’s"))
        .unwrap_or(token)
}

/// Checks a rewrite against the text it replaces and the box score.
pub struct RewriteValidator<'a> {
    pub info: &'a GameInfo,
    pub box_score: &'a BoxScore,
    pub config: &'a GuardrailConfig,
    pub language: &'a ForbiddenLanguage,
}

impl RewriteValidator<'_> {
    /// Every violation found; empty means the rewrite may be used.
    pub fn validate(&self, original: &str, rewrite: &str, confidence: f32) -> Vec<RewriteViolation> {
        let mut violations = Vec::new();
        if confidence < self.config.confidence_threshold {
            violations.push(RewriteViolation::LowConfidence {
                confidence,
                threshold: self.config.confidence_threshold,
            });
        }
        if rewrite.trim().is_empty() {
            violations.push(RewriteViolation::Empty);
            return violations;
        }

        let original_numerals = numerals(original);
        let rewrite_numerals = numerals(rewrite);
        let mut reported = FxHashSet::default();
        for numeral in &original_numerals {
            if !rewrite_numerals.contains(numeral) && reported.insert(numeral.clone()) {
                violations.push(RewriteViolation::DroppedNumeral {
                    numeral: numeral.clone(),
                });
            }
        }
        let vouched = self.box_score.numerals();
        for numeral in &rewrite_numerals {
            if !original_numerals.contains(numeral)
                && !vouched.contains(numeral)
                && reported.insert(numeral.clone())
            {
                violations.push(RewriteViolation::InventedNumeral {
                    numeral: numeral.clone(),
                });
            }
        }

        for name in self.unknown_names(original, rewrite) {
            violations.push(RewriteViolation::UnknownName { name });
        }

        let sentences = count_sentences(rewrite);
        if sentences > self.config.max_rewrite_sentences {
            violations.push(RewriteViolation::TooManySentences {
                count: sentences,
                max: self.config.max_rewrite_sentences,
            });
        }

        let original_len = original.trim().chars().count().max(1) as f32;
        let ratio = rewrite.trim().chars().count() as f32 / original_len;
        if ratio > self.config.max_length_ratio {
            violations.push(RewriteViolation::TooLong {
                ratio,
                max: self.config.max_length_ratio,
            });
        }

        for violation in self.language.find(rewrite) {
            violations.push(RewriteViolation::ForbiddenLanguage {
                matched: violation.matched,
            });
        }
        violations
    }

    /// Capitalised words in `rewrite` that name nobody in the original
    /// text, the box score, or the two teams. Sentence-initial words are
    /// checked too; only `COMMON_CAPITALIZED` words are exempt.
    fn unknown_names(&self, original: &str, rewrite: &str) -> Vec<String> {
        let mut known: FxHashSet<String> = COMMON_CAPITALIZED.iter().map(|w| w.to_string()).collect();
        let sources = [
            original,
            self.info.home_team.as_str(),
            self.info.away_team.as_str(),
        ];
        for source in sources.into_iter().chain(self.box_score.player_names()) {
            for m in WORD.find_iter(source) {
                known.insert(strip_possessive(m.as_str()).to_lowercase());
            }
        }

        let mut unknown: Vec<String> = Vec::new();
        for sentence in split_sentences(rewrite) {
            for token in WORD.find_iter(&sentence).map(|m| m.as_str()) {
                if !is_capitalized(token) {
                    continue;
                }
                let bare = strip_possessive(token);
                if !known.contains(&bare.to_lowercase()) && !unknown.iter().any(|u| u == bare) {
                    unknown.push(bare.to_string());
                }
            }
        }
        unknown
    }
}

/// Opening, one sentence per chapter boundary, and closing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionSet {
    pub opening: String,
    pub between: Vec<String>,
    pub closing: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransitionViolation {
    Unparseable,
    WrongCount { expected: usize, found: usize },
    Empty,
    Numeral { text: String },
    SentenceTooLong { words: usize, max: usize },
    ForbiddenLanguage { matched: String },
}

/// Accepted transitions, or why the whole set was discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub transitions: Option<TransitionSet>,
    pub fallback_reason: Option<RewriteFallbackReason>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<TransitionViolation>,
}

#[derive(Debug, Deserialize)]
struct TransitionReply {
    opening: String,
    #[serde(default)]
    transitions: Vec<String>,
    closing: String,
}

/// Check a transition set; any violation discards all of it.
pub fn validate_transitions(
    set: &TransitionSet,
    chapter_count: usize,
    config: &GuardrailConfig,
    language: &ForbiddenLanguage,
) -> Vec<TransitionViolation> {
    let mut violations = Vec::new();
    let expected = chapter_count.saturating_sub(1);
    if set.between.len() != expected {
        violations.push(TransitionViolation::WrongCount {
            expected,
            found: set.between.len(),
        });
    }
    let texts = std::iter::once(&set.opening)
        .chain(&set.between)
        .chain(std::iter::once(&set.closing));
    for text in texts {
        if text.trim().is_empty() {
            violations.push(TransitionViolation::Empty);
            continue;
        }
        if NUMERAL.is_match(text) {
            violations.push(TransitionViolation::Numeral { text: text.clone() });
        }
        for sentence in split_sentences(text) {
            let words = word_count(&sentence);
            if words > config.max_transition_sentence_words {
                violations.push(TransitionViolation::SentenceTooLong {
                    words,
                    max: config.max_transition_sentence_words,
                });
            }
        }
        for violation in language.find(text) {
            violations.push(TransitionViolation::ForbiddenLanguage {
                matched: violation.matched,
            });
        }
    }
    violations
}

/// Everything the augmentation layer produced for one game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Augmentation {
    pub flags: FeatureFlags,
    pub tone: ToneProfile,
    pub rewrites: Vec<MomentRewrite>,
    pub transitions: Option<TransitionOutcome>,
}

impl Augmentation {
    /// Nothing enabled, nothing generated.
    pub fn disabled(flags: FeatureFlags) -> Self {
        Self {
            flags,
            tone: ToneProfile::Neutral,
            rewrites: Vec::new(),
            transitions: None,
        }
    }
}

pub struct Augmenter<'a> {
    info: &'a GameInfo,
    box_score: &'a BoxScore,
    config: &'a GuardrailConfig,
    language: &'a ForbiddenLanguage,
    generator: &'a dyn TextGenerator,
    policy: CallPolicy,
    tone: ToneProfile,
}

impl<'a> Augmenter<'a> {
    pub fn new(
        info: &'a GameInfo,
        box_score: &'a BoxScore,
        config: &'a GuardrailConfig,
        generator: &'a dyn TextGenerator,
    ) -> Self {
        Self {
            info,
            box_score,
            config,
            language: ForbiddenLanguage::standard(),
            generator,
            policy: CallPolicy::default(),
            tone: ToneProfile::Neutral,
        }
    }

    pub fn with_policy(mut self, policy: CallPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_tone(mut self, tone: ToneProfile) -> Self {
        self.tone = tone;
        self
    }

    pub fn with_language(mut self, language: &'a ForbiddenLanguage) -> Self {
        self.language = language;
        self
    }

    fn validator(&self) -> RewriteValidator<'_> {
        RewriteValidator {
            info: self.info,
            box_score: self.box_score,
            config: self.config,
            language: self.language,
        }
    }

    fn rewrite_prompt(&self, template: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.tone.instructions());
        let _ = writeln!(out, "Rewrite this basketball recap passage for readability.");
        let _ = writeln!(out, "\nRules:");
        let _ = writeln!(out, "- Keep every number exactly as written. Add no numbers.");
        let names: Vec<&str> = self.box_score.player_names().collect();
        if !names.is_empty() {
            let _ = writeln!(out, "- Name only these players: {}.", names.join(", "));
        }
        let _ = writeln!(
            out,
            "- Teams: {} and {}.",
            self.info.home_team, self.info.away_team
        );
        let _ = writeln!(
            out,
            "- At most {} sentences, no longer than {:.1} times the original.",
            self.config.max_rewrite_sentences, self.config.max_length_ratio
        );
        let _ = writeln!(
            out,
            "- Never use these words: {}.",
            self.language.prompt_examples().join(", ")
        );
        let _ = writeln!(out, "\nOriginal:\n{}", template.trim());
        let _ = writeln!(out, "\nRespond with the rewritten text only.");
        out
    }

    /// Rewrite one moment's text, falling back to it on any failure. A
    /// rewrite must still name every explicit play the original named.
    pub async fn rewrite_moment(
        &self,
        moment_index: usize,
        moment: &Moment,
        plays: &[Play],
    ) -> MomentRewrite {
        let template = moment.narrative_text();
        let prompt = self.rewrite_prompt(template);
        let generation = match call_bounded(self.generator, &prompt, self.policy).await {
            Ok(generation) => generation,
            Err(err) => {
                warn!(moment = moment_index, error = %err, "rewrite call failed");
                return MomentRewrite::fallback(
                    moment_index,
                    template,
                    RewriteFallbackReason::from(&err),
                    None,
                    Vec::new(),
                );
            }
        };

        let rewrite = parse_single_response(&generation.text);
        let mut violations = self
            .validator()
            .validate(template, &rewrite, generation.confidence);
        if !rewrite.trim().is_empty() {
            let explicit = &moment.explicitly_narrated_play_ids;
            let uncovered = check_coverage(template, explicit, plays);
            for play_id in check_coverage(&rewrite, explicit, plays) {
                if !uncovered.contains(&play_id) {
                    violations.push(RewriteViolation::MissingExplicitPlay { play_id });
                }
            }
        }
        if violations.is_empty() {
            debug!(moment = moment_index, confidence = generation.confidence, "rewrite accepted");
            return MomentRewrite {
                moment_index,
                template_summary: template.to_string(),
                rewritten_summary: rewrite,
                used_fallback: false,
                fallback_reason: None,
                confidence: Some(generation.confidence),
                violations,
            };
        }

        let reason = if violations
            .iter()
            .any(|v| matches!(v, RewriteViolation::LowConfidence { .. }))
        {
            RewriteFallbackReason::LowConfidence
        } else {
            RewriteFallbackReason::ValidationFailed
        };
        warn!(
            moment = moment_index,
            ?reason,
            violations = violations.len(),
            "rewrite rejected"
        );
        MomentRewrite::fallback(
            moment_index,
            template,
            reason,
            Some(generation.confidence),
            violations,
        )
    }

    pub async fn rewrite_moments(&self, moments: &[Moment], plays: &[Play]) -> Vec<MomentRewrite> {
        let mut rewrites = Vec::with_capacity(moments.len());
        for (i, moment) in moments.iter().enumerate() {
            rewrites.push(self.rewrite_moment(i, moment, plays).await);
        }
        rewrites
    }

    fn transition_prompt(&self, chapters: &[Block]) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.tone.instructions());
        let _ = writeln!(
            out,
            "Write connective sentences for a recap of {} at {}.",
            self.info.away_team, self.info.home_team
        );
        for (i, chapter) in chapters.iter().enumerate() {
            let summary = chapter
                .narrative
                .as_deref()
                .and_then(|n| split_sentences(n).into_iter().next())
                .unwrap_or_default();
            let _ = writeln!(out, "Chapter {} ({}): {}", i + 1, chapter.role.name(), summary);
        }
        let _ = writeln!(out, "\nRules:");
        let _ = writeln!(out, "- No numbers of any kind.");
        let _ = writeln!(
            out,
            "- Every sentence at most {} words.",
            self.config.max_transition_sentence_words
        );
        let _ = writeln!(
            out,
            "- Never use these words: {}.",
            self.language.prompt_examples().join(", ")
        );
        let _ = writeln!(
            out,
            "\nRespond with JSON only: {{\"opening\": \"..\", \"transitions\": [{} strings, one per chapter break], \"closing\": \"..\"}}",
            chapters.len().saturating_sub(1)
        );
        out
    }

    /// Generate and validate the transition set for `chapters`.
    pub async fn transitions(&self, chapters: &[Block]) -> TransitionOutcome {
        let prompt = self.transition_prompt(chapters);
        let generation = match call_bounded(self.generator, &prompt, self.policy).await {
            Ok(generation) => generation,
            Err(err) => {
                warn!(error = %err, "transition call failed");
                return TransitionOutcome {
                    transitions: None,
                    fallback_reason: Some(RewriteFallbackReason::from(&err)),
                    violations: Vec::new(),
                };
            }
        };

        let parsed = json_object(&generation.text)
            .and_then(|object| serde_json::from_str::<TransitionReply>(object).ok());
        let Some(reply) = parsed else {
            warn!("transition reply was not valid JSON");
            return TransitionOutcome {
                transitions: None,
                fallback_reason: Some(RewriteFallbackReason::ValidationFailed),
                violations: vec![TransitionViolation::Unparseable],
            };
        };
        let set = TransitionSet {
            opening: reply.opening.trim().to_string(),
            between: reply
                .transitions
                .iter()
                .map(|t| t.trim().to_string())
                .collect(),
            closing: reply.closing.trim().to_string(),
        };

        let violations = validate_transitions(&set, chapters.len(), self.config, self.language);
        if !violations.is_empty() {
            warn!(violations = violations.len(), "discarding transition set");
            return TransitionOutcome {
                transitions: None,
                fallback_reason: Some(RewriteFallbackReason::ValidationFailed),
                violations,
            };
        }
        if generation.confidence < self.config.confidence_threshold {
            warn!(confidence = generation.confidence, "discarding low-confidence transitions");
            return TransitionOutcome {
                transitions: None,
                fallback_reason: Some(RewriteFallbackReason::LowConfidence),
                violations,
            };
        }
        TransitionOutcome {
            transitions: Some(set),
            fallback_reason: None,
            violations,
        }
    }

    /// Run whichever augmentations `flags` enable.
    pub async fn augment(
        &self,
        flags: FeatureFlags,
        moments: &[Moment],
        plays: &[Play],
        chapters: &[Block],
    ) -> Augmentation {
        let rewrites = if flags.enable_moment_rewrite {
            self.rewrite_moments(moments, plays).await
        } else {
            Vec::new()
        };
        let transitions = if flags.enable_transitions {
            Some(self.transitions(chapters).await)
        } else {
            None
        };
        let accepted = rewrites.iter().filter(|r| !r.used_fallback).count();
        info!(
            rewrites = rewrites.len(),
            accepted,
            transitions = transitions.as_ref().is_some_and(|t| t.transitions.is_some()),
            tone = self.tone.name(),
            "augmentation finished"
        );
        Augmentation {
            flags,
            tone: self.tone,
            rewrites,
            transitions,
        }
    }
}

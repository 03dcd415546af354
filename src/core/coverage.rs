//! Explicit-play coverage: checks that a narrative names every play it
//! must, and injects deterministic sentences for the ones it does not.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::template::{InjectionTemplates, SlotValues};
use crate::schema::moment::Moment;
use crate::schema::play::{Play, PlayId};

/// Basketball actions recognised in play descriptions, in detection
/// priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKeyword {
    Three,
    FreeThrow,
    Dunk,
    Layup,
    Block,
    Steal,
    Turnover,
    Rebound,
    Foul,
    Assist,
}

impl ActionKeyword {
    pub const ALL: &'static [ActionKeyword] = &[
        Self::Three,
        Self::FreeThrow,
        Self::Dunk,
        Self::Layup,
        Self::Block,
        Self::Steal,
        Self::Turnover,
        Self::Rebound,
        Self::Foul,
        Self::Assist,
    ];

    /// The word a narrative must contain to count as naming the action.
    pub fn word(&self) -> &'static str {
        match self {
            Self::Three => "three",
            Self::FreeThrow => "free throw",
            Self::Dunk => "dunk",
            Self::Layup => "layup",
            Self::Block => "block",
            Self::Steal => "steal",
            Self::Turnover => "turnover",
            Self::Rebound => "rebound",
            Self::Foul => "foul",
            Self::Assist => "assist",
        }
    }

    /// Spellings found in feed descriptions.
    fn markers(&self) -> &'static [&'static str] {
        match self {
            Self::Three => &["three", "3-pt", "3pt", "3-point"],
            Self::FreeThrow => &["free throw"],
            Self::Dunk => &["dunk"],
            Self::Layup => &["layup", "lay-up", "lay up"],
            Self::Block => &["block"],
            Self::Steal => &["steal"],
            Self::Turnover => &["turnover"],
            Self::Rebound => &["rebound"],
            Self::Foul => &["foul"],
            Self::Assist => &["assist"],
        }
    }

    pub fn from_word(word: &str) -> Option<ActionKeyword> {
        let word = word.trim().to_lowercase().replace('_', " ");
        Self::ALL.iter().copied().find(|k| k.word() == word)
    }

    /// Every action mentioned in `description`, in priority order.
    pub fn detect(description: &str) -> Vec<ActionKeyword> {
        let lowered = description.to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .filter(|k| k.markers().iter().any(|m| lowered.contains(m)))
            .collect()
    }

    fn article(&self) -> &'static str {
        match self {
            Self::Assist => "an",
            _ => "a",
        }
    }
}

/// How explicit-play coverage was finally satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoverageResolution {
    InitialPass,
    /// Fixed by the single regeneration attempt.
    RegenerationPass,
    /// Deterministic sentences were appended.
    InjectionRequired,
    /// At least one play had no data to build a sentence from.
    InjectionFailed,
}

/// Tokens that identify a play in narrative text. All lowercase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayIdentifiers {
    pub names: Vec<String>,
    pub keywords: Vec<ActionKeyword>,
    /// The description itself, used only when no name or keyword exists.
    pub phrase: Option<String>,
}

const NAME_SUFFIXES: &[&str] = &["jr", "sr", "ii", "iii", "iv"];

impl PlayIdentifiers {
    pub fn for_play(play: &Play) -> Self {
        let mut names = Vec::new();
        if let Some(player) = play.player() {
            let full = player.to_lowercase();
            let last = full
                .split_whitespace()
                .map(|t| t.trim_matches(|c: char| c == '.' || c == ','))
                .filter(|t| !NAME_SUFFIXES.contains(t))
                .last()
                .map(str::to_string);
            names.push(full.clone());
            if let Some(last) = last.filter(|l| l.chars().count() >= 2 && *l != full) {
                names.push(last);
            }
        }
        let keywords = ActionKeyword::detect(&play.description);
        let phrase = if names.is_empty() && keywords.is_empty() {
            Some(normalized_phrase(&play.description)).filter(|p| !p.is_empty())
        } else {
            None
        };
        Self {
            names,
            keywords,
            phrase,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.keywords.is_empty() && self.phrase.is_none()
    }

    /// True if any identifier appears in `text` (case-insensitive).
    pub fn found_in(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.names.iter().any(|n| lowered.contains(n.as_str()))
            || self.keywords.iter().any(|k| lowered.contains(k.word()))
            || self.phrase.as_ref().is_some_and(|p| lowered.contains(p.as_str()))
    }
}

fn normalized_phrase(description: &str) -> String {
    description
        .trim()
        .trim_end_matches(['.', '!', '?'])
        .trim()
        .to_lowercase()
}

/// Look up a play in an ascending play list.
pub fn find_play(plays: &[Play], id: PlayId) -> Option<&Play> {
    plays
        .binary_search_by_key(&id, Play::id)
        .ok()
        .map(|i| &plays[i])
}

/// Explicit plays the narrative fails to mention, ascending. Plays absent
/// from `plays` cannot be verified and count as missing.
pub fn check_coverage(narrative: &str, explicit: &[PlayId], plays: &[Play]) -> Vec<PlayId> {
    let mut missing: Vec<PlayId> = explicit
        .iter()
        .copied()
        .filter(|id| match find_play(plays, *id) {
            Some(play) => !PlayIdentifiers::for_play(play).found_in(narrative),
            None => true,
        })
        .collect();
    missing.sort();
    missing.dedup();
    missing
}

/// One minimal factual sentence about `play`, guaranteed to contain one
/// of its identifiers. `None` when the play carries nothing to say.
pub fn synthesize_sentence(play: &Play, templates: &InjectionTemplates) -> Option<String> {
    let identifiers = PlayIdentifiers::for_play(play);
    if identifiers.is_empty() {
        return None;
    }

    let description = play.description.trim();
    let values = SlotValues {
        player: play.player(),
        team: play.team(),
        description: Some(description).filter(|d| !d.is_empty()),
    };
    let missed = description.to_lowercase().contains("miss");

    let mut candidates: Vec<String> = Vec::new();
    for keyword in &identifiers.keywords {
        if let Some(action) = templates.action(*keyword) {
            let template = match (&action.missed, missed) {
                (Some(missed_template), true) => missed_template,
                _ => &action.made,
            };
            if let Some(sentence) = template.render(&values) {
                candidates.push(sentence);
            }
        }
        candidates.push(format!(
            "The play included {} {}.",
            keyword.article(),
            keyword.word()
        ));
    }
    if values.player.is_some() {
        if let Some(sentence) = templates.generic.render(&values) {
            candidates.push(sentence);
        }
    }
    if let Some(description) = values.description {
        candidates.push(terminate(description));
    }

    candidates
        .into_iter()
        .map(|s| capitalize(&s))
        .find(|s| identifiers.found_in(s))
}

fn terminate(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.ends_with(['.', '!', '?']) {
        trimmed.to_string()
    } else {
        format!("{}.", trimmed)
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Result of appending sentences for missing plays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Injection {
    pub narrative: String,
    pub injected: Vec<PlayId>,
    pub failed: Vec<PlayId>,
}

/// Append one sentence per missing play, in ascending play order.
pub fn inject_missing(
    narrative: &str,
    missing: &[PlayId],
    plays: &[Play],
    templates: &InjectionTemplates,
) -> Injection {
    let mut ids = missing.to_vec();
    ids.sort();
    ids.dedup();

    let mut text = narrative.trim().to_string();
    let mut injected = Vec::new();
    let mut failed = Vec::new();

    for id in ids {
        let sentence = find_play(plays, id).and_then(|p| synthesize_sentence(p, templates));
        match sentence {
            Some(sentence) => {
                if !text.is_empty() {
                    if !text.ends_with(['.', '!', '?', '"']) {
                        text.push('.');
                    }
                    text.push(' ');
                }
                text.push_str(&sentence);
                injected.push(id);
            }
            None => failed.push(id),
        }
    }

    Injection {
        narrative: text,
        injected,
        failed,
    }
}

/// Final coverage state of one narrative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageOutcome {
    pub narrative: String,
    pub resolution: CoverageResolution,
    pub injected: Vec<PlayId>,
    pub failed: Vec<PlayId>,
}

/// Check coverage and inject whatever is still missing.
/// `after_retry` marks text that came from the regeneration attempt.
pub fn enforce_coverage(
    narrative: &str,
    explicit: &[PlayId],
    plays: &[Play],
    templates: &InjectionTemplates,
    after_retry: bool,
) -> CoverageOutcome {
    let missing = check_coverage(narrative, explicit, plays);
    if missing.is_empty() {
        return CoverageOutcome {
            narrative: narrative.trim().to_string(),
            resolution: if after_retry {
                CoverageResolution::RegenerationPass
            } else {
                CoverageResolution::InitialPass
            },
            injected: Vec::new(),
            failed: Vec::new(),
        };
    }

    let injection = inject_missing(narrative, &missing, plays, templates);
    let resolution = if injection.failed.is_empty() {
        debug!(injected = ?injection.injected, "injected coverage sentences");
        CoverageResolution::InjectionRequired
    } else {
        warn!(failed = ?injection.failed, "coverage injection had no data for plays");
        CoverageResolution::InjectionFailed
    };
    CoverageOutcome {
        narrative: injection.narrative,
        resolution,
        injected: injection.injected,
        failed: injection.failed,
    }
}

/// A narrative built only from templates: one sentence per explicit
/// play, plus the score when that alone would be a single sentence.
pub fn deterministic_narrative(
    moment: &Moment,
    plays: &[Play],
    templates: &InjectionTemplates,
) -> String {
    let mut sentences: Vec<String> = moment
        .explicitly_narrated_play_ids
        .iter()
        .filter_map(|id| find_play(plays, *id))
        .filter_map(|play| synthesize_sentence(play, templates))
        .collect();
    if sentences.len() < 2 {
        sentences.push(format!(
            "The score was {}-{}.",
            moment.score_after.home, moment.score_after.away
        ));
    }
    sentences.join(" ")
}

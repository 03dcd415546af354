//! Structured validation results and the moment invariant rules.
//!
//! Every rule runs independently and appends to one report. A report with
//! any error fails its stage; warnings are surfaced but never block.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::config::EXPLICIT_PLAY_CAP;
use crate::schema::moment::Moment;
use crate::schema::play::{Play, PlayId};

/// Machine-readable issue codes for every validation stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    // Moments
    EmptyPlayIds,
    EmptyNarration,
    NarrationNotSubset,
    TooManyExplicitPlays,
    OverlappingPlayIds,
    OrderingViolation,
    InvalidPlayReference,
    ScoreDecreaseWithin,
    ScoreDecreaseBefore,
    ScoreContinuityBreak,
    // Narratives
    EmptyNarrative,
    ForbiddenLanguage,
    SentenceCount,
    MissingExplicitPlay,
    // Blocks
    BlockCount,
    FirstRoleNotSetup,
    LastRoleNotResolution,
    RoleRepeated,
    MissingBlockNarrative,
    BlockTooShort,
    BlockTooLong,
    WordBudgetExceeded,
    BlockScoreContinuity,
    MomentInMultipleBlocks,
    MomentNotInBlock,
    UnknownMomentIndex,
    NoKeyPlays,
    TooManyKeyPlays,
    KeyPlayNotInBlock,
    // Story
    ChapterCoverage,
    DuplicateChapterId,
    NegativeReadingTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub code: IssueCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub moment_indices: Vec<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub play_ids: Vec<PlayId>,
}

impl ValidationIssue {
    pub fn new(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            moment_indices: Vec::new(),
            play_ids: Vec::new(),
        }
    }

    pub fn with_moments(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.moment_indices.extend(indices);
        self
    }

    pub fn with_plays(mut self, ids: impl IntoIterator<Item = PlayId>) -> Self {
        self.play_ids.extend(ids);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub validated: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            validated: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn error(&mut self, issue: ValidationIssue) {
        self.validated = false;
        self.errors.push(issue);
    }

    pub fn warning(&mut self, issue: ValidationIssue) {
        self.warnings.push(issue);
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.validated &= other.validated;
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    pub fn has_error(&self, code: IssueCode) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }

    pub fn has_warning(&self, code: IssueCode) -> bool {
        self.warnings.iter().any(|w| w.code == code)
    }
}

/// Run all seven moment rules against the source plays.
pub fn validate_moments(moments: &[Moment], plays: &[Play]) -> ValidationReport {
    let mut report = ValidationReport::new();
    check_play_ids_present(moments, &mut report);
    check_narration(moments, &mut report);
    check_no_overlap(moments, &mut report);
    check_ordering(moments, &mut report);
    check_references(moments, plays, &mut report);
    check_score_monotonic(moments, plays, &mut report);
    check_score_continuity(moments, &mut report);

    if !report.validated {
        warn!(errors = report.errors.len(), "moment validation failed");
    }
    report
}

fn check_play_ids_present(moments: &[Moment], report: &mut ValidationReport) {
    for (i, moment) in moments.iter().enumerate() {
        if moment.play_ids.is_empty() {
            report.error(
                ValidationIssue::new(IssueCode::EmptyPlayIds, format!("moment {} has no plays", i))
                    .with_moments([i]),
            );
        }
    }
}

fn check_narration(moments: &[Moment], report: &mut ValidationReport) {
    for (i, moment) in moments.iter().enumerate() {
        if moment.explicitly_narrated_play_ids.is_empty() {
            report.error(
                ValidationIssue::new(
                    IssueCode::EmptyNarration,
                    format!("moment {} has no explicitly narrated plays", i),
                )
                .with_moments([i]),
            );
            continue;
        }
        let count = moment.explicitly_narrated_play_ids.len();
        if count > EXPLICIT_PLAY_CAP {
            report.error(
                ValidationIssue::new(
                    IssueCode::TooManyExplicitPlays,
                    format!(
                        "moment {} names {} explicit plays, more than {}",
                        i, count, EXPLICIT_PLAY_CAP
                    ),
                )
                .with_moments([i])
                .with_plays(moment.explicitly_narrated_play_ids.iter().copied()),
            );
        }
        let own: FxHashSet<PlayId> = moment.play_ids.iter().copied().collect();
        let strays: Vec<PlayId> = moment
            .explicitly_narrated_play_ids
            .iter()
            .copied()
            .filter(|id| !own.contains(id))
            .collect();
        if !strays.is_empty() {
            report.error(
                ValidationIssue::new(
                    IssueCode::NarrationNotSubset,
                    format!("moment {} narrates plays it does not contain", i),
                )
                .with_moments([i])
                .with_plays(strays),
            );
        }
    }
}

fn check_no_overlap(moments: &[Moment], report: &mut ValidationReport) {
    let mut owner: FxHashMap<PlayId, usize> = FxHashMap::default();
    for (i, moment) in moments.iter().enumerate() {
        for &id in &moment.play_ids {
            match owner.get(&id) {
                Some(&first) if first != i => report.error(
                    ValidationIssue::new(
                        IssueCode::OverlappingPlayIds,
                        format!("play {} appears in moments {} and {}", id, first, i),
                    )
                    .with_moments([first, i])
                    .with_plays([id]),
                ),
                Some(_) => {}
                None => {
                    owner.insert(id, i);
                }
            }
        }
    }
}

fn check_ordering(moments: &[Moment], report: &mut ValidationReport) {
    let mut previous: Option<(usize, PlayId)> = None;
    for (i, moment) in moments.iter().enumerate() {
        let Some(first) = moment.first_play() else {
            continue;
        };
        if let Some((prev_index, prev_first)) = previous {
            if first <= prev_first {
                report.error(
                    ValidationIssue::new(
                        IssueCode::OrderingViolation,
                        format!(
                            "moment {} starts at play {}, not after moment {} (play {})",
                            i, first, prev_index, prev_first
                        ),
                    )
                    .with_moments([prev_index, i])
                    .with_plays([prev_first, first]),
                );
            }
        }
        previous = Some((i, first));
    }
}

fn check_references(moments: &[Moment], plays: &[Play], report: &mut ValidationReport) {
    let known: FxHashSet<PlayId> = plays.iter().map(Play::id).collect();
    for (i, moment) in moments.iter().enumerate() {
        let mut unknown: Vec<PlayId> = moment
            .play_ids
            .iter()
            .chain(&moment.explicitly_narrated_play_ids)
            .copied()
            .filter(|id| !known.contains(id))
            .collect();
        unknown.sort();
        unknown.dedup();
        if !unknown.is_empty() {
            report.error(
                ValidationIssue::new(
                    IssueCode::InvalidPlayReference,
                    format!("moment {} references unknown plays", i),
                )
                .with_moments([i])
                .with_plays(unknown),
            );
        }
    }
}

fn check_score_monotonic(moments: &[Moment], plays: &[Play], report: &mut ValidationReport) {
    let by_id: FxHashMap<PlayId, &Play> = plays.iter().map(|p| (p.id(), p)).collect();

    for (i, moment) in moments.iter().enumerate() {
        let mut running = moment.score_before;
        let mut offending = Vec::new();
        for id in &moment.play_ids {
            if let Some(play) = by_id.get(id) {
                if running.decreases_to(&play.score()) {
                    offending.push(*id);
                }
                running = play.score();
            }
        }
        if !offending.is_empty() || moment.score_before.decreases_to(&moment.score_after) {
            report.error(
                ValidationIssue::new(
                    IssueCode::ScoreDecreaseWithin,
                    format!(
                        "score decreases inside moment {} ({} to {})",
                        i, moment.score_before, moment.score_after
                    ),
                )
                .with_moments([i])
                .with_plays(offending),
            );
        }

        if i > 0 {
            let prev = &moments[i - 1];
            if prev.score_after.decreases_to(&moment.score_before) {
                report.error(
                    ValidationIssue::new(
                        IssueCode::ScoreDecreaseBefore,
                        format!(
                            "moment {} starts at {} below moment {} end {}",
                            i,
                            moment.score_before,
                            i - 1,
                            prev.score_after
                        ),
                    )
                    .with_moments([i - 1, i]),
                );
            }
        }
    }
}

fn check_score_continuity(moments: &[Moment], report: &mut ValidationReport) {
    for (i, pair) in moments.windows(2).enumerate() {
        if pair[0].score_after != pair[1].score_before {
            report.error(
                ValidationIssue::new(
                    IssueCode::ScoreContinuityBreak,
                    format!(
                        "moment {} ends at {} but moment {} starts at {}",
                        i,
                        pair[0].score_after,
                        i + 1,
                        pair[1].score_before
                    ),
                )
                .with_moments([i, i + 1]),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::moment::BoundaryReason;
    use crate::schema::play::Score;

    fn play(index: u32, home: u32, away: u32) -> Play {
        Play {
            play_index: PlayId(index),
            period: 1,
            game_clock: "6:00".to_string(),
            play_type: "shot".to_string(),
            team_abbreviation: None,
            player_name: None,
            description: String::new(),
            home_score: home,
            away_score: away,
            raw: serde_json::Value::Null,
        }
    }

    fn moment(ids: &[u32], explicit: &[u32], before: (u32, u32), after: (u32, u32)) -> Moment {
        Moment {
            play_ids: ids.iter().copied().map(PlayId).collect(),
            explicitly_narrated_play_ids: explicit.iter().copied().map(PlayId).collect(),
            score_before: Score::new(before.0, before.1),
            score_after: Score::new(after.0, after.1),
            period: 1,
            start_clock: "6:00".to_string(),
            end_clock: "5:00".to_string(),
            narrative: None,
            boundary_reason: BoundaryReason::Scoring,
        }
    }

    fn plays() -> Vec<Play> {
        vec![play(1, 0, 0), play(2, 2, 0), play(3, 2, 0), play(4, 2, 3)]
    }

    #[test]
    fn valid_sequence_passes() {
        let moments = vec![
            moment(&[1, 2], &[2], (0, 0), (2, 0)),
            moment(&[3, 4], &[4], (2, 0), (2, 3)),
        ];
        let report = validate_moments(&moments, &plays());
        assert!(report.validated, "{:?}", report.errors);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn empty_moment_and_narration() {
        let moments = vec![moment(&[], &[], (0, 0), (0, 0))];
        let report = validate_moments(&moments, &plays());
        assert!(report.has_error(IssueCode::EmptyPlayIds));
        assert!(report.has_error(IssueCode::EmptyNarration));
    }

    #[test]
    fn narration_outside_moment() {
        let moments = vec![moment(&[1, 2], &[3], (0, 0), (2, 0))];
        let report = validate_moments(&moments, &plays());
        let issue = report
            .errors
            .iter()
            .find(|e| e.code == IssueCode::NarrationNotSubset)
            .unwrap();
        assert_eq!(issue.play_ids, vec![PlayId(3)]);
    }

    #[test]
    fn explicit_play_cap_enforced() {
        let moments = vec![
            moment(&[1, 2, 3], &[1, 2, 3], (0, 0), (2, 0)),
            moment(&[4], &[4], (2, 0), (2, 3)),
        ];
        let report = validate_moments(&moments, &plays());
        assert!(report.has_error(IssueCode::TooManyExplicitPlays));
        let issue = report
            .errors
            .iter()
            .find(|e| e.code == IssueCode::TooManyExplicitPlays)
            .unwrap();
        assert_eq!(issue.moment_indices, vec![0]);
        assert!(!report.has_error(IssueCode::NarrationNotSubset));
    }

    #[test]
    fn overlap_and_ordering() {
        let moments = vec![
            moment(&[1, 2], &[2], (0, 0), (2, 0)),
            moment(&[2, 3], &[3], (2, 0), (2, 0)),
            moment(&[1], &[1], (2, 0), (2, 0)),
        ];
        let report = validate_moments(&moments, &plays());
        assert!(report.has_error(IssueCode::OverlappingPlayIds));
        assert!(report.has_error(IssueCode::OrderingViolation));
    }

    #[test]
    fn tied_first_plays_violate_ordering() {
        let moments = vec![
            moment(&[1], &[1], (0, 0), (0, 0)),
            moment(&[1], &[1], (0, 0), (0, 0)),
        ];
        let report = validate_moments(&moments, &plays());
        assert!(report.has_error(IssueCode::OrderingViolation));
    }

    #[test]
    fn unknown_play_reference() {
        let moments = vec![moment(&[1, 99], &[99], (0, 0), (0, 0))];
        let report = validate_moments(&moments, &plays());
        assert!(report.has_error(IssueCode::InvalidPlayReference));
    }

    #[test]
    fn score_decreases_and_breaks() {
        let moments = vec![
            moment(&[1, 2], &[2], (0, 0), (2, 0)),
            moment(&[3], &[3], (1, 0), (2, 0)),
            moment(&[4], &[4], (5, 5), (2, 3)),
        ];
        let report = validate_moments(&moments, &plays());
        assert!(report.has_error(IssueCode::ScoreDecreaseBefore));
        assert!(report.has_error(IssueCode::ScoreDecreaseWithin));
        assert!(report.has_error(IssueCode::ScoreContinuityBreak));
        assert!(!report.validated);
    }

    #[test]
    fn report_serializes_codes() {
        let mut report = ValidationReport::new();
        report.error(ValidationIssue::new(IssueCode::ScoreContinuityBreak, "break"));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["validated"], false);
        assert_eq!(json["errors"][0]["code"], "SCORE_CONTINUITY_BREAK");
    }
}

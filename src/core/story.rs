//! Story assembly: chapters, a compact summary, reading time, and
//! production counters.

use rustc_hash::FxHashSet;
use tracing::info;

use crate::core::render::{NarrativeRecord, NarrativeSource};
use crate::core::sentences::{split_sentences, word_count};
use crate::core::validation::{IssueCode, ValidationIssue, ValidationReport};
use crate::schema::block::Block;
use crate::schema::game::GameInfo;
use crate::schema::play::{Play, PlayId};
use crate::schema::story::{GameStory, StoryMetadata};

pub const WORDS_PER_MINUTE: f64 = 200.0;

/// The first sentence of every chapter, in order.
pub fn compact_story(chapters: &[Block]) -> Option<String> {
    let firsts: Vec<String> = chapters
        .iter()
        .filter_map(|c| c.narrative.as_deref())
        .filter_map(|n| split_sentences(n).into_iter().next())
        .collect();
    if firsts.is_empty() {
        None
    } else {
        Some(firsts.join(" "))
    }
}

pub fn build_story(
    info: &GameInfo,
    plays: &[Play],
    moment_count: usize,
    chapters: Vec<Block>,
    records: &[NarrativeRecord],
) -> GameStory {
    let total_words: usize = chapters
        .iter()
        .filter_map(|c| c.narrative.as_deref())
        .map(word_count)
        .sum();
    let generated = records
        .iter()
        .filter(|r| r.source == NarrativeSource::Generated)
        .count();
    let metadata = StoryMetadata {
        game_id: info.game_id.clone(),
        league: Some(info.league),
        play_count: plays.len(),
        moment_count,
        generated_narratives: generated,
        fallback_narratives: records.len() - generated,
        injected_narratives: records.iter().filter(|r| !r.injected.is_empty()).count(),
        total_words,
    };
    info!(
        game_id = %info.game_id,
        chapters = chapters.len(),
        words = total_words,
        "built story"
    );
    GameStory {
        compact_story: compact_story(&chapters),
        reading_time_estimate_minutes: total_words as f64 / WORDS_PER_MINUTE,
        chapters,
        metadata,
    }
}

/// Chapters must cover every play exactly once and in order, with
/// unique ids and a sensible reading time.
pub fn validate_story(story: &GameStory, plays: &[Play]) -> ValidationReport {
    let mut report = ValidationReport::new();

    let covered: Vec<PlayId> = story
        .chapters
        .iter()
        .flat_map(|c| c.play_ids.iter().copied())
        .collect();
    let expected: Vec<PlayId> = plays.iter().map(Play::id).collect();
    if covered != expected {
        let seen: FxHashSet<PlayId> = covered.iter().copied().collect();
        let missing: Vec<PlayId> = expected
            .iter()
            .copied()
            .filter(|id| !seen.contains(id))
            .collect();
        report.error(
            ValidationIssue::new(
                IssueCode::ChapterCoverage,
                format!(
                    "chapters cover {} play references for {} plays ({} missing)",
                    covered.len(),
                    expected.len(),
                    missing.len()
                ),
            )
            .with_plays(missing),
        );
    }

    let mut ids = FxHashSet::default();
    for chapter in &story.chapters {
        if !ids.insert(chapter.block_id.as_str()) {
            report.error(ValidationIssue::new(
                IssueCode::DuplicateChapterId,
                format!("chapter id {} is used more than once", chapter.block_id),
            ));
        }
    }

    let minutes = story.reading_time_estimate_minutes;
    if minutes.is_nan() || minutes < 0.0 {
        report.error(ValidationIssue::new(
            IssueCode::NegativeReadingTime,
            format!("reading time {} is not a non-negative number", minutes),
        ));
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::coverage::CoverageResolution;
    use crate::core::render::FallbackReason;
    use crate::schema::block::BlockRole;
    use crate::schema::game::League;
    use crate::schema::play::Score;
    use crate::testing::PlayBuilder;

    fn info() -> GameInfo {
        GameInfo {
            game_id: "g9".to_string(),
            league: League::Wnba,
            home_team: "Liberty".to_string(),
            away_team: "Aces".to_string(),
            home_abbreviation: "NYL".to_string(),
            away_abbreviation: "LVA".to_string(),
        }
    }

    fn chapter(id: &str, plays: &[u32], narrative: &str) -> Block {
        Block {
            block_id: id.to_string(),
            moment_indices: vec![0],
            role: BlockRole::Setup,
            score_before: Score::ZERO,
            score_after: Score::ZERO,
            play_ids: plays.iter().copied().map(PlayId).collect(),
            key_play_ids: vec![],
            narrative: Some(narrative.to_string()),
        }
    }

    fn record(source: NarrativeSource, injected: bool) -> NarrativeRecord {
        NarrativeRecord {
            moment_index: 0,
            source,
            coverage: CoverageResolution::InitialPass,
            fallback_reason: match source {
                NarrativeSource::Generated => None,
                NarrativeSource::Deterministic => Some(FallbackReason::LowSignal),
            },
            injected: if injected { vec![PlayId(1)] } else { vec![] },
            warnings: vec![],
        }
    }

    #[test]
    fn story_summary_and_metadata() {
        let plays: Vec<Play> = (1..=4).map(|i| PlayBuilder::new(i).build()).collect();
        let chapters = vec![
            chapter("ch_01", &[1, 2], "Stewart opened the scoring. Then more."),
            chapter("ch_02", &[3, 4], "Wilson answered at the rim. Later text."),
        ];
        let records = vec![
            record(NarrativeSource::Generated, false),
            record(NarrativeSource::Generated, true),
            record(NarrativeSource::Deterministic, false),
        ];
        let story = build_story(&info(), &plays, 3, chapters, &records);

        assert_eq!(
            story.compact_story.as_deref(),
            Some("Stewart opened the scoring. Wilson answered at the rim.")
        );
        assert_eq!(story.metadata.total_words, 13);
        assert!((story.reading_time_estimate_minutes - 13.0 / 200.0).abs() < 1e-9);
        assert_eq!(story.metadata.generated_narratives, 2);
        assert_eq!(story.metadata.fallback_narratives, 1);
        assert_eq!(story.metadata.injected_narratives, 1);
        assert_eq!(story.metadata.league, Some(League::Wnba));
        assert!(validate_story(&story, &plays).validated);
    }

    #[test]
    fn empty_story_has_no_compact_text() {
        let story = build_story(&info(), &[], 0, vec![], &[]);
        assert!(story.compact_story.is_none());
        assert_eq!(story.reading_time_estimate_minutes, 0.0);
    }

    #[test]
    fn coverage_duplicates_and_reading_time() {
        let plays: Vec<Play> = (1..=4).map(|i| PlayBuilder::new(i).build()).collect();
        let mut story = build_story(
            &info(),
            &plays,
            2,
            vec![
                chapter("ch_01", &[1, 2], "One."),
                chapter("ch_01", &[4], "Two."),
            ],
            &[],
        );
        story.reading_time_estimate_minutes = -1.0;
        let report = validate_story(&story, &plays);
        assert!(report.has_error(IssueCode::ChapterCoverage));
        assert!(report.has_error(IssueCode::DuplicateChapterId));
        assert!(report.has_error(IssueCode::NegativeReadingTime));
        let coverage = report
            .errors
            .iter()
            .find(|e| e.code == IssueCode::ChapterCoverage)
            .unwrap();
        assert_eq!(coverage.play_ids, vec![PlayId(3)]);
    }
}

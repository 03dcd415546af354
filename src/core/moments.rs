//! Moment assembly: drives the boundary detector and explicit selector
//! over a game's plays.

use thiserror::Error;
use tracing::{debug, info};

use crate::core::boundary::BoundaryDetector;
use crate::core::config::SegmentationConfig;
use crate::core::explicit::select_explicit_plays;
use crate::schema::moment::Moment;
use crate::schema::play::{Play, PlayId, Score};

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("play index {current} does not follow {previous}")]
    NonIncreasingPlayIndex { previous: PlayId, current: PlayId },
}

/// Split an ordered play list into contiguous, non-overlapping moments
/// that together cover every play.
pub fn assemble_moments(
    plays: &[Play],
    config: &SegmentationConfig,
) -> Result<Vec<Moment>, AssemblyError> {
    for pair in plays.windows(2) {
        if pair[1].play_index <= pair[0].play_index {
            return Err(AssemblyError::NonIncreasingPlayIndex {
                previous: pair[0].play_index,
                current: pair[1].play_index,
            });
        }
    }

    let mut detector = BoundaryDetector::new(config);
    let mut moments = Vec::new();
    let mut start = 0;
    let mut merges = 0usize;

    for i in 0..plays.len() {
        let previous = i.checked_sub(1).map(|p| &plays[p]);
        let decision = detector.observe(&plays[i], previous, plays.get(i + 1));
        if decision.overridden.is_some() {
            merges += 1;
        }
        let Some(reason) = decision.reason.filter(|_| decision.should_close) else {
            continue;
        };

        moments.push(build_moment(plays, start..i + 1, reason));
        debug!(
            moment = moments.len() - 1,
            plays = i + 1 - start,
            reason = reason.code(),
            "closed moment"
        );
        start = i + 1;
    }

    info!(
        plays = plays.len(),
        moments = moments.len(),
        merges,
        "assembled moments"
    );
    Ok(moments)
}

fn build_moment(
    plays: &[Play],
    range: std::ops::Range<usize>,
    reason: crate::schema::moment::BoundaryReason,
) -> Moment {
    let first = &plays[range.start];
    let last = &plays[range.end - 1];
    let score_before = range
        .start
        .checked_sub(1)
        .map(|p| plays[p].score())
        .unwrap_or(Score::ZERO);

    Moment {
        play_ids: plays[range.clone()].iter().map(Play::id).collect(),
        explicitly_narrated_play_ids: select_explicit_plays(plays, range),
        score_before,
        score_after: last.score(),
        period: first.period,
        start_clock: first.game_clock.clone(),
        end_clock: last.game_clock.clone(),
        narrative: None,
        boundary_reason: reason,
    }
}

//! Explicit play selection: the plays a moment's narrative must name.

use std::ops::Range;

use crate::core::classifier::{is_notable, is_scoring};
use crate::core::config::EXPLICIT_PLAY_CAP;
use crate::schema::play::{Play, PlayId};

/// Choose at most two plays from `plays[range]`.
///
/// Scoring is judged against the immediately preceding play in the whole
/// game, not just within the range. Preference order: the two most recent
/// scoring plays; otherwise the two most recent of scoring and notable
/// plays together; otherwise the range's last play. Never empty for a
/// non-empty range, always a subset of the range, ascending.
pub fn select_explicit_plays(plays: &[Play], range: Range<usize>) -> Vec<PlayId> {
    let range = range.start.min(plays.len())..range.end.min(plays.len());
    if range.is_empty() {
        return Vec::new();
    }

    let mut scoring = Vec::new();
    let mut combined = Vec::new();
    for i in range.clone() {
        let previous = i.checked_sub(1).map(|p| &plays[p]);
        let play = &plays[i];
        if is_scoring(play, previous) {
            scoring.push(play.id());
            combined.push(play.id());
        } else if is_notable(play) {
            combined.push(play.id());
        }
    }

    let chosen = if scoring.len() >= EXPLICIT_PLAY_CAP {
        scoring
    } else if !combined.is_empty() {
        combined
    } else {
        vec![plays[range.end - 1].id()]
    };

    let skip = chosen.len().saturating_sub(EXPLICIT_PLAY_CAP);
    chosen.into_iter().skip(skip).collect()
}

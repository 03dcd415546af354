//! Block assembly: groups moments into chapters with a narrative role,
//! key plays, and a deterministic narrative.

use std::cmp::Reverse;
use tracing::{debug, info};

use crate::core::classifier::{is_lead_change, is_notable, is_scoring};
use crate::core::config::BlockConfig;
use crate::core::coverage::{find_play, synthesize_sentence};
use crate::core::sentences::word_count;
use crate::core::template::InjectionTemplates;
use crate::schema::block::{Block, BlockRole};
use crate::schema::game::GameInfo;
use crate::schema::moment::{BoundaryReason, Moment};
use crate::schema::play::{Leader, Play, PlayId, Score};

/// Moments per block the assembler aims for before clamping.
const MOMENTS_PER_BLOCK: usize = 10;

/// How many blocks `moment_count` moments should become.
pub fn target_block_count(moment_count: usize, config: &BlockConfig) -> usize {
    (moment_count / MOMENTS_PER_BLOCK)
        .clamp(config.min_blocks, config.max_blocks)
        .min(moment_count)
}

fn break_weight(reason: BoundaryReason) -> u8 {
    match reason {
        BoundaryReason::PeriodEnd => 2,
        BoundaryReason::LeadChange => 1,
        _ => 0,
    }
}

/// Start indices of blocks 1..target. Each break lands near its evenly
/// spaced ideal position, preferring the end of a period or a lead change.
fn break_points(moments: &[Moment], target: usize) -> Vec<usize> {
    let n = moments.len();
    let mut breaks = Vec::with_capacity(target.saturating_sub(1));
    let window = (n / (target * 2).max(1)).max(1);
    let mut previous = 0;

    for k in 1..target {
        let ideal = k * n / target;
        // Leave at least one moment for every block still to come.
        let lo = previous + 1;
        let hi = n - (target - k);
        let mut start = lo.max(ideal.saturating_sub(window));
        let mut end = hi.min(ideal + window);
        if start > end {
            start = ideal.clamp(lo, hi);
            end = start;
        }
        let chosen = (start..=end)
            .min_by_key(|&b| {
                (
                    Reverse(break_weight(moments[b - 1].boundary_reason)),
                    b.abs_diff(ideal),
                    b,
                )
            })
            .unwrap_or(start);
        breaks.push(chosen);
        previous = chosen;
    }
    breaks
}

fn assign_roles(moments: &[Moment], ranges: &[(usize, usize)]) -> Vec<BlockRole> {
    let count = ranges.len();
    let mut roles = Vec::with_capacity(count);
    let mut used = [0u8; 5];
    let slot = |role: BlockRole| role as usize;

    for (i, &(start, end)) in ranges.iter().enumerate() {
        let role = if i == 0 {
            BlockRole::Setup
        } else if i == count - 1 {
            BlockRole::Resolution
        } else {
            let span = &moments[start..end];
            let before = span.first().map(|m| m.score_before).unwrap_or(Score::ZERO);
            let after = span.last().map(|m| m.score_after).unwrap_or(before);
            let preferred = if count >= 4 && i == count - 2 {
                BlockRole::DecisionPoint
            } else if span
                .iter()
                .any(|m| m.boundary_reason == BoundaryReason::LeadChange)
            {
                BlockRole::MomentumShift
            } else if after.margin() < before.margin() {
                BlockRole::Response
            } else if after.margin() > before.margin() {
                BlockRole::MomentumShift
            } else {
                BlockRole::Response
            };
            [
                preferred,
                BlockRole::Response,
                BlockRole::MomentumShift,
                BlockRole::DecisionPoint,
            ]
            .into_iter()
            .find(|r| used[slot(*r)] < 2)
            .unwrap_or(preferred)
        };
        used[slot(role)] += 1;
        roles.push(role);
    }
    roles
}

fn play_priority(plays: &[Play], id: PlayId) -> u8 {
    let Ok(pos) = plays.binary_search_by_key(&id, Play::id) else {
        return 0;
    };
    let play = &plays[pos];
    let previous = pos.checked_sub(1).map(|p| &plays[p]);
    if is_lead_change(play, previous) {
        3
    } else if is_scoring(play, previous) {
        2
    } else if is_notable(play) {
        1
    } else {
        0
    }
}

/// Up to `max` explicit plays from the block's moments, favouring lead
/// changes, then scoring, then notable plays, then later plays. Ascending.
pub fn select_key_plays(moments: &[Moment], plays: &[Play], max: usize) -> Vec<PlayId> {
    let mut candidates: Vec<PlayId> = moments
        .iter()
        .flat_map(|m| m.explicitly_narrated_play_ids.iter().copied())
        .collect();
    candidates.sort_by_key(|&id| (Reverse(play_priority(plays, id)), Reverse(id)));
    candidates.truncate(max);
    candidates.sort();
    candidates
}

fn leader_sentence(info: &GameInfo, score: Score) -> String {
    match score.leader() {
        Leader::Home => format!("{} led {}-{}.", info.home_team, score.home, score.away),
        Leader::Away => format!("{} led {}-{}.", info.away_team, score.away, score.home),
        Leader::Tied => format!("The teams were level at {}-{}.", score.home, score.away),
    }
}

fn block_narrative(
    span: &[Moment],
    key_plays: &[PlayId],
    plays: &[Play],
    info: &GameInfo,
    config: &BlockConfig,
    templates: &InjectionTemplates,
) -> String {
    let (Some(first), Some(last)) = (span.first(), span.last()) else {
        return String::new();
    };
    let league = info.league;
    let frame = format!(
        "Between {} {} and {} {}, the score moved from {} to {}.",
        league.period_label(first.period),
        first.start_clock,
        league.period_label(last.period),
        last.end_clock,
        first.score_before,
        last.score_after
    );
    let closing = leader_sentence(info, last.score_after);
    let mut budget = config
        .max_words
        .saturating_sub(word_count(&frame) + word_count(&closing));

    let mut parts = vec![frame];
    let mut narrated: Vec<usize> = Vec::new();
    for id in key_plays {
        let Some(index) = span.iter().position(|m| m.contains(*id)) else {
            continue;
        };
        if narrated.contains(&index) {
            continue;
        }
        let moment_text = span[index].narrative_text().trim();
        let words = word_count(moment_text);
        if !moment_text.is_empty() && words <= budget {
            parts.push(moment_text.to_string());
            budget -= words;
            narrated.push(index);
        } else if let Some(sentence) =
            find_play(plays, *id).and_then(|p| synthesize_sentence(p, templates))
        {
            budget = budget.saturating_sub(word_count(&sentence));
            parts.push(sentence);
        }
    }
    parts.push(closing);
    parts.join(" ")
}

/// Group moments into contiguous blocks. Returns no blocks for no moments.
pub fn assemble_blocks(
    moments: &[Moment],
    plays: &[Play],
    info: &GameInfo,
    config: &BlockConfig,
    templates: &InjectionTemplates,
) -> Vec<Block> {
    let n = moments.len();
    if n == 0 {
        return Vec::new();
    }
    let target = target_block_count(n, config).max(1);
    let mut starts = vec![0];
    starts.extend(break_points(moments, target));
    let ranges: Vec<(usize, usize)> = starts
        .iter()
        .enumerate()
        .map(|(i, &s)| (s, starts.get(i + 1).copied().unwrap_or(n)))
        .collect();
    let roles = assign_roles(moments, &ranges);

    let blocks: Vec<Block> = ranges
        .iter()
        .zip(roles)
        .enumerate()
        .map(|(i, (&(start, end), role))| {
            let span = &moments[start..end];
            let key_play_ids = select_key_plays(span, plays, config.max_key_plays);
            let narrative = block_narrative(span, &key_play_ids, plays, info, config, templates);
            debug!(
                block = i,
                moments = end - start,
                role = role.name(),
                words = word_count(&narrative),
                "assembled block"
            );
            Block {
                block_id: format!("ch_{:02}", i + 1),
                moment_indices: (start..end).collect(),
                role,
                score_before: span[0].score_before,
                score_after: span[span.len() - 1].score_after,
                play_ids: span.iter().flat_map(|m| m.play_ids.iter().copied()).collect(),
                key_play_ids,
                narrative: Some(narrative),
            }
        })
        .collect();

    info!(moments = n, blocks = blocks.len(), "assembled blocks");
    blocks
}

//! Block invariant rules.

use rustc_hash::FxHashMap;
use tracing::warn;

use crate::core::config::BlockConfig;
use crate::core::validation::{IssueCode, ValidationIssue, ValidationReport};
use crate::schema::block::{Block, BlockRole};

/// A role may appear at most this many times in one story.
const MAX_ROLE_REPEATS: usize = 2;

pub fn validate_blocks(
    blocks: &[Block],
    moment_count: usize,
    config: &BlockConfig,
) -> ValidationReport {
    let mut report = ValidationReport::new();
    check_count(blocks, config, &mut report);
    check_roles(blocks, &mut report);
    check_narratives(blocks, config, &mut report);
    check_continuity(blocks, &mut report);
    check_moment_coverage(blocks, moment_count, &mut report);
    check_key_plays(blocks, config, &mut report);

    if !report.validated {
        warn!(
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "block validation failed"
        );
    }
    report
}

fn check_count(blocks: &[Block], config: &BlockConfig, report: &mut ValidationReport) {
    if !(config.min_blocks..=config.max_blocks).contains(&blocks.len()) {
        report.error(ValidationIssue::new(
            IssueCode::BlockCount,
            format!(
                "{} blocks, expected {}-{}",
                blocks.len(),
                config.min_blocks,
                config.max_blocks
            ),
        ));
    }
}

fn check_roles(blocks: &[Block], report: &mut ValidationReport) {
    let (Some(first), Some(last)) = (blocks.first(), blocks.last()) else {
        return;
    };
    if first.role != BlockRole::Setup {
        report.error(ValidationIssue::new(
            IssueCode::FirstRoleNotSetup,
            format!("first block must be SETUP, found {}", first.role.name()),
        ));
    }
    if last.role != BlockRole::Resolution {
        report.error(ValidationIssue::new(
            IssueCode::LastRoleNotResolution,
            format!("last block must be RESOLUTION, found {}", last.role.name()),
        ));
    }

    let mut counts: FxHashMap<BlockRole, Vec<usize>> = FxHashMap::default();
    for (i, block) in blocks.iter().enumerate() {
        counts.entry(block.role).or_default().push(i);
    }
    let mut repeated: Vec<(BlockRole, Vec<usize>)> = counts
        .into_iter()
        .filter(|(_, positions)| positions.len() > MAX_ROLE_REPEATS)
        .collect();
    repeated.sort_by_key(|(role, _)| *role);
    for (role, positions) in repeated {
        report.error(ValidationIssue::new(
            IssueCode::RoleRepeated,
            format!(
                "role {} appears {} times, at most {} allowed",
                role.name(),
                positions.len(),
                MAX_ROLE_REPEATS
            ),
        ));
    }
}

fn check_narratives(blocks: &[Block], config: &BlockConfig, report: &mut ValidationReport) {
    let mut total = 0;
    for block in blocks {
        let words = block.word_count();
        total += words;
        if words == 0 {
            report.error(ValidationIssue::new(
                IssueCode::MissingBlockNarrative,
                format!("block {} has no narrative", block.block_id),
            ));
        } else if words < config.min_words {
            report.warning(ValidationIssue::new(
                IssueCode::BlockTooShort,
                format!(
                    "block {} has {} words, minimum {}",
                    block.block_id, words, config.min_words
                ),
            ));
        } else if words > config.max_words {
            report.warning(ValidationIssue::new(
                IssueCode::BlockTooLong,
                format!(
                    "block {} has {} words, maximum {}",
                    block.block_id, words, config.max_words
                ),
            ));
        }
    }
    if total > config.total_word_budget {
        report.warning(ValidationIssue::new(
            IssueCode::WordBudgetExceeded,
            format!(
                "blocks total {} words, budget {}",
                total, config.total_word_budget
            ),
        ));
    }
}

fn check_continuity(blocks: &[Block], report: &mut ValidationReport) {
    for pair in blocks.windows(2) {
        if pair[0].score_after != pair[1].score_before {
            report.error(ValidationIssue::new(
                IssueCode::BlockScoreContinuity,
                format!(
                    "block {} ends at {} but block {} starts at {}",
                    pair[0].block_id, pair[0].score_after, pair[1].block_id, pair[1].score_before
                ),
            ));
        }
    }
}

fn check_moment_coverage(blocks: &[Block], moment_count: usize, report: &mut ValidationReport) {
    let mut owners: Vec<Vec<&str>> = vec![Vec::new(); moment_count];
    for block in blocks {
        for &index in &block.moment_indices {
            match owners.get_mut(index) {
                Some(list) => list.push(&block.block_id),
                None => report.warning(
                    ValidationIssue::new(
                        IssueCode::UnknownMomentIndex,
                        format!(
                            "block {} references moment {} of {}",
                            block.block_id, index, moment_count
                        ),
                    )
                    .with_moments([index]),
                ),
            }
        }
    }
    for (index, list) in owners.iter().enumerate() {
        match list.len() {
            0 => report.error(
                ValidationIssue::new(
                    IssueCode::MomentNotInBlock,
                    format!("moment {} is not in any block", index),
                )
                .with_moments([index]),
            ),
            1 => {}
            _ => report.error(
                ValidationIssue::new(
                    IssueCode::MomentInMultipleBlocks,
                    format!("moment {} is in blocks {}", index, list.join(", ")),
                )
                .with_moments([index]),
            ),
        }
    }
}

fn check_key_plays(blocks: &[Block], config: &BlockConfig, report: &mut ValidationReport) {
    for block in blocks {
        if block.key_play_ids.is_empty() {
            report.warning(ValidationIssue::new(
                IssueCode::NoKeyPlays,
                format!("block {} has no key plays", block.block_id),
            ));
        } else if block.key_play_ids.len() > config.max_key_plays {
            report.warning(ValidationIssue::new(
                IssueCode::TooManyKeyPlays,
                format!(
                    "block {} has {} key plays, maximum {}",
                    block.block_id,
                    block.key_play_ids.len(),
                    config.max_key_plays
                ),
            ));
        }
        let strays: Vec<_> = block
            .key_play_ids
            .iter()
            .copied()
            .filter(|id| !block.play_ids.contains(id))
            .collect();
        if !strays.is_empty() {
            report.error(
                ValidationIssue::new(
                    IssueCode::KeyPlayNotInBlock,
                    format!("block {} key plays are outside the block", block.block_id),
                )
                .with_plays(strays),
            );
        }
    }
}

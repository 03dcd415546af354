/// Property tests: segmentation and block invariants over seeded
/// synthetic games in every league.

use pbp_narrative::core::config::{BlockConfig, SegmentationConfig};
use pbp_narrative::core::moments::assemble_moments;
use pbp_narrative::core::pipeline::RecapPipeline;
use pbp_narrative::core::synthetic::generate_game;
use pbp_narrative::core::validation::validate_moments;
use pbp_narrative::schema::block::BlockRole;
use pbp_narrative::schema::game::League;
use pbp_narrative::schema::play::PlayId;
use proptest::prelude::*;
use std::collections::HashSet;

fn league() -> impl Strategy<Value = League> {
    prop_oneof![
        Just(League::Nba),
        Just(League::Wnba),
        Just(League::Ncaab),
        Just(League::Nhl),
    ]
}

fn caps() -> impl Strategy<Value = SegmentationConfig> {
    (2usize..15, 0usize..20).prop_map(|(soft, extra)| SegmentationConfig {
        soft_play_cap: soft,
        absolute_play_cap: soft + extra,
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn explicit_plays_are_a_small_subset(seed in any::<u64>(), league in league(), config in caps()) {
        let game = generate_game(seed, league);
        let moments = assemble_moments(&game.plays, &config).unwrap();
        for moment in &moments {
            let explicit = &moment.explicitly_narrated_play_ids;
            prop_assert!((1..=2).contains(&explicit.len()));
            prop_assert!(explicit.iter().all(|id| moment.play_ids.contains(id)));
            prop_assert!(moment.play_ids.len() <= config.absolute_play_cap);
        }
    }

    #[test]
    fn moments_partition_the_game(seed in any::<u64>(), league in league(), config in caps()) {
        let game = generate_game(seed, league);
        let moments = assemble_moments(&game.plays, &config).unwrap();

        for pair in moments.windows(2) {
            let left: HashSet<PlayId> = pair[0].play_ids.iter().copied().collect();
            prop_assert!(pair[1].play_ids.iter().all(|id| !left.contains(id)));
            prop_assert_eq!(pair[0].score_after, pair[1].score_before);
        }
        let flattened: Vec<PlayId> = moments.iter().flat_map(|m| m.play_ids.iter().copied()).collect();
        let expected: Vec<PlayId> = game.plays.iter().map(|p| p.play_index).collect();
        prop_assert_eq!(flattened, expected);
        prop_assert!(validate_moments(&moments, &game.plays).validated);
    }

    #[test]
    fn block_arc_is_well_formed(seed in any::<u64>(), league in league()) {
        let game = generate_game(seed, league);
        let recap = RecapPipeline::builder().build().unwrap().run_deterministic(&game).unwrap();
        let chapters = &recap.story.chapters;
        let config = BlockConfig::default();

        prop_assert!(recap.story_report.validated);
        prop_assert!(chapters.len() <= config.max_blocks);
        prop_assert_eq!(chapters.first().map(|c| c.role), Some(BlockRole::Setup));
        prop_assert_eq!(chapters.last().map(|c| c.role), Some(BlockRole::Resolution));
        for pair in chapters.windows(2) {
            prop_assert_eq!(pair[0].score_after, pair[1].score_before);
        }
        let mut seen = HashSet::new();
        for chapter in chapters {
            prop_assert!(chapter.key_play_ids.len() <= config.max_key_plays);
            prop_assert!(chapter.key_play_ids.iter().all(|id| chapter.play_ids.contains(id)));
            for index in &chapter.moment_indices {
                prop_assert!(seen.insert(*index));
            }
        }
        prop_assert_eq!(seen.len(), recap.moments.len());
    }
}

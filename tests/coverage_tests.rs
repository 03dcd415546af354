/// Coverage integration tests: checking, injecting and the idempotence
/// property over synthetic games.

use pbp_narrative::core::coverage::{
    check_coverage, enforce_coverage, inject_missing, CoverageResolution,
};
use pbp_narrative::core::synthetic::generate_game;
use pbp_narrative::core::template::InjectionTemplates;
use pbp_narrative::schema::game::League;
use pbp_narrative::schema::play::{Play, PlayId};
use pbp_narrative::testing::PlayBuilder;
use proptest::prelude::*;

fn jones_layup() -> Vec<Play> {
    (1..=7)
        .map(|i| {
            let builder = PlayBuilder::new(i);
            if i == 7 {
                builder
                    .player("Jones")
                    .describe("Jones makes layup")
                    .score(2, 0)
                    .build()
            } else {
                builder.build()
            }
        })
        .collect()
}

#[test]
fn missing_play_is_injected() {
    let plays = jones_layup();
    let templates = InjectionTemplates::default();
    let narrative = "The team scored.";

    let missing = check_coverage(narrative, &[PlayId(7)], &plays);
    assert_eq!(missing, vec![PlayId(7)]);

    let injection = inject_missing(narrative, &missing, &plays, &templates);
    assert!(injection.narrative.starts_with("The team scored."));
    assert!(injection.narrative.contains("Jones"));
    assert!(injection.narrative.contains("layup"));
    assert!(check_coverage(&injection.narrative, &[PlayId(7)], &plays).is_empty());
}

#[test]
fn covered_narrative_is_left_alone() {
    let plays = jones_layup();
    let outcome = enforce_coverage(
        "Jones scored at the rim. The home side led 2-0.",
        &[PlayId(7)],
        &plays,
        &InjectionTemplates::default(),
        false,
    );
    assert_eq!(outcome.resolution, CoverageResolution::InitialPass);
    assert!(outcome.injected.is_empty());
    assert_eq!(outcome.narrative, "Jones scored at the rim. The home side led 2-0.");
}

#[test]
fn custom_templates_shape_injected_sentence() {
    let plays = jones_layup();
    let templates = InjectionTemplates::parse_ron(
        r#"(actions: {"layup": Action(made: "{subject} finished a layup at the rim.")})"#,
    )
    .unwrap();
    let injection = inject_missing("", &[PlayId(7)], &plays, &templates);
    assert_eq!(injection.narrative, "Jones finished a layup at the rim.");
}

#[test]
fn unknown_play_cannot_be_injected() {
    let plays = jones_layup();
    let outcome = enforce_coverage(
        "Nothing here.",
        &[PlayId(99)],
        &plays,
        &InjectionTemplates::default(),
        false,
    );
    assert_eq!(outcome.resolution, CoverageResolution::InjectionFailed);
    assert_eq!(outcome.failed, vec![PlayId(99)]);
}

proptest! {
    #[test]
    fn injection_always_restores_coverage(
        seed in 0u64..500,
        picks in prop::collection::vec(any::<prop::sample::Index>(), 0..6),
        narrative in "[a-z ]{0,40}",
    ) {
        let game = generate_game(seed, League::Nba);
        let explicit: Vec<PlayId> = picks
            .iter()
            .map(|ix| game.plays[ix.index(game.plays.len())].play_index)
            .collect();
        let templates = InjectionTemplates::default();

        let missing = check_coverage(&narrative, &explicit, &game.plays);
        let injection = inject_missing(&narrative, &missing, &game.plays, &templates);
        prop_assert!(injection.failed.is_empty());
        prop_assert!(check_coverage(&injection.narrative, &explicit, &game.plays).is_empty());

        // A second pass has nothing left to add.
        let again = enforce_coverage(&injection.narrative, &explicit, &game.plays, &templates, false);
        prop_assert_eq!(again.resolution, CoverageResolution::InitialPass);
        prop_assert_eq!(again.narrative, injection.narrative.trim().to_string());
    }
}

//! Feature flags for the augmentation layer, resolved per game, then per
//! league, then globally. Everything defaults to off.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::schema::game::League;

/// Fully resolved switches for one game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    pub enable_moment_rewrite: bool,
    pub enable_transitions: bool,
    pub enable_tone_profiles: bool,
}

/// A partial set of switches. `None` defers to the next level down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagOverrides {
    pub enable_moment_rewrite: Option<bool>,
    pub enable_transitions: Option<bool>,
    pub enable_tone_profiles: Option<bool>,
}

impl FlagOverrides {
    pub fn all(enabled: bool) -> Self {
        Self {
            enable_moment_rewrite: Some(enabled),
            enable_transitions: Some(enabled),
            enable_tone_profiles: Some(enabled),
        }
    }

    /// Fill unset switches from `fallback`.
    fn or(self, fallback: FlagOverrides) -> FlagOverrides {
        FlagOverrides {
            enable_moment_rewrite: self.enable_moment_rewrite.or(fallback.enable_moment_rewrite),
            enable_transitions: self.enable_transitions.or(fallback.enable_transitions),
            enable_tone_profiles: self.enable_tone_profiles.or(fallback.enable_tone_profiles),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagResolver {
    pub global: FlagOverrides,
    pub leagues: HashMap<League, FlagOverrides>,
    pub games: HashMap<String, FlagOverrides>,
}

impl FlagResolver {
    pub fn with_global(mut self, overrides: FlagOverrides) -> Self {
        self.global = overrides;
        self
    }

    pub fn with_league(mut self, league: League, overrides: FlagOverrides) -> Self {
        self.leagues.insert(league, overrides);
        self
    }

    pub fn with_game(mut self, game_id: impl Into<String>, overrides: FlagOverrides) -> Self {
        self.games.insert(game_id.into(), overrides);
        self
    }

    /// The most specific setting wins: game, then league, then global.
    pub fn resolve(&self, game_id: &str, league: League) -> FeatureFlags {
        let game = self.games.get(game_id).copied().unwrap_or_default();
        let league_level = self.leagues.get(&league).copied().unwrap_or_default();
        let merged = game.or(league_level).or(self.global);
        let flags = FeatureFlags {
            enable_moment_rewrite: merged.enable_moment_rewrite.unwrap_or(false),
            enable_transitions: merged.enable_transitions.unwrap_or(false),
            enable_tone_profiles: merged.enable_tone_profiles.unwrap_or(false),
        };
        debug!(game_id, league = league.code(), ?flags, "resolved feature flags");
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn everything_off_by_default() {
        let flags = FlagResolver::default().resolve("g1", League::Nba);
        assert_eq!(flags, FeatureFlags::default());
        assert!(!flags.enable_moment_rewrite);
    }

    #[test]
    fn game_beats_league_beats_global() {
        let resolver = FlagResolver::default()
            .with_global(FlagOverrides::all(true))
            .with_league(
                League::Wnba,
                FlagOverrides {
                    enable_transitions: Some(false),
                    ..FlagOverrides::default()
                },
            )
            .with_game(
                "g7",
                FlagOverrides {
                    enable_transitions: Some(true),
                    enable_moment_rewrite: Some(false),
                    ..FlagOverrides::default()
                },
            );

        let nba = resolver.resolve("g1", League::Nba);
        assert!(nba.enable_transitions && nba.enable_moment_rewrite && nba.enable_tone_profiles);

        let wnba = resolver.resolve("g2", League::Wnba);
        assert!(!wnba.enable_transitions);
        assert!(wnba.enable_moment_rewrite);

        let game = resolver.resolve("g7", League::Wnba);
        assert!(game.enable_transitions);
        assert!(!game.enable_moment_rewrite);
        assert!(game.enable_tone_profiles);
    }

    #[test]
    fn parses_from_ron() {
        let resolver: FlagResolver = ron::from_str(
            r#"(
                global: (enable_transitions: Some(true)),
                leagues: { Nhl: (enable_transitions: Some(false)) },
            )"#,
        )
        .unwrap();
        assert!(resolver.resolve("x", League::Nba).enable_transitions);
        assert!(!resolver.resolve("x", League::Nhl).enable_transitions);
    }
}

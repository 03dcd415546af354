//! Play classification: stateless predicates over one play and its
//! predecessor.

use crate::schema::play::{Leader, Play};

/// Play types that stop the game clock or the flow of play.
const STOPPAGE_TYPES: &[&str] = &[
    "timeout",
    "official_timeout",
    "tv_timeout",
    "instant_replay",
    "review",
    "ejection",
    "injury",
    "delay",
];

const STOPPAGE_KEYWORDS: &[&str] = &["timeout", "instant replay", "official review", "ejected"];

const TURNOVER_TYPES: &[&str] = &["turnover", "steal", "offensive_foul", "violation"];

const TURNOVER_KEYWORDS: &[&str] = &[
    "turnover",
    "bad pass",
    "lost ball",
    "traveling",
    "offensive foul",
    "shot clock violation",
    "out of bounds",
    "steal",
];

/// Play types worth naming even when nothing was scored.
const NOTABLE_TYPES: &[&str] = &[
    "block",
    "steal",
    "turnover",
    "offensive_rebound",
    "flagrant_foul",
    "technical_foul",
    "ejection",
];

const NOTABLE_KEYWORDS: &[&str] = &["block", "steal", "turnover", "flagrant", "technical foul"];

fn normalized_type(play: &Play) -> String {
    play.play_type.trim().to_lowercase().replace([' ', '-'], "_")
}

fn type_or_keyword(play: &Play, types: &[&str], keywords: &[&str]) -> bool {
    let play_type = normalized_type(play);
    if types.contains(&play_type.as_str()) {
        return true;
    }
    let description = play.description.to_lowercase();
    keywords.iter().any(|k| description.contains(k))
}

/// The score moved on this play. The very first play counts as scoring
/// when it already carries points.
pub fn is_scoring(play: &Play, previous: Option<&Play>) -> bool {
    match previous {
        Some(prev) => play.score() != prev.score(),
        None => play.score().total() > 0,
    }
}

/// The leader switched directly between home and away. Moving into or
/// out of a tie does not count.
pub fn is_lead_change(play: &Play, previous: Option<&Play>) -> bool {
    let Some(prev) = previous else {
        return false;
    };
    matches!(
        (prev.score().leader(), play.score().leader()),
        (Leader::Home, Leader::Away) | (Leader::Away, Leader::Home)
    )
}

pub fn is_turnover(play: &Play) -> bool {
    type_or_keyword(play, TURNOVER_TYPES, TURNOVER_KEYWORDS)
}

pub fn is_stoppage(play: &Play) -> bool {
    type_or_keyword(play, STOPPAGE_TYPES, STOPPAGE_KEYWORDS)
}

pub fn is_notable(play: &Play) -> bool {
    type_or_keyword(play, NOTABLE_TYPES, NOTABLE_KEYWORDS)
}

pub fn is_period_boundary(play: &Play, previous: Option<&Play>) -> bool {
    previous.is_some_and(|prev| prev.period != play.period)
}

/// Scoring or notable: a play any narrative would want to name.
pub fn is_narration_worthy(play: &Play, previous: Option<&Play>) -> bool {
    is_scoring(play, previous) || is_notable(play)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::play::PlayId;

    fn play(play_type: &str, description: &str, home: u32, away: u32) -> Play {
        Play {
            play_index: PlayId(1),
            period: 1,
            game_clock: "10:00".to_string(),
            play_type: play_type.to_string(),
            team_abbreviation: None,
            player_name: None,
            description: description.to_string(),
            home_score: home,
            away_score: away,
            raw: serde_json::Value::Null,
        }
    }

    #[test]
    fn first_play_with_points_is_scoring() {
        assert!(is_scoring(&play("shot", "", 0, 2), None));
        assert!(!is_scoring(&play("jumpball", "", 0, 0), None));
    }

    #[test]
    fn scoring_is_a_score_delta() {
        let prev = play("shot", "", 10, 8);
        assert!(is_scoring(&play("shot", "", 12, 8), Some(&prev)));
        assert!(!is_scoring(&play("rebound", "", 10, 8), Some(&prev)));
    }

    #[test]
    fn tie_transitions_are_not_lead_changes() {
        let home_lead = play("shot", "", 10, 8);
        let tied = play("shot", "", 10, 10);
        let away_lead = play("shot", "", 10, 12);
        assert!(!is_lead_change(&tied, Some(&home_lead)));
        assert!(!is_lead_change(&away_lead, Some(&tied)));
        assert!(is_lead_change(&play("shot", "", 10, 11), Some(&home_lead)));
        assert!(!is_lead_change(&home_lead, None));
    }

    #[test]
    fn turnover_by_type_and_keyword() {
        assert!(is_turnover(&play("turnover", "", 0, 0)));
        assert!(is_turnover(&play("other", "Smith bad pass", 0, 0)));
        assert!(!is_turnover(&play("shot", "Smith makes jumper", 0, 0)));
    }

    #[test]
    fn stoppage_by_type_and_keyword() {
        assert!(is_stoppage(&play("Timeout", "", 0, 0)));
        assert!(is_stoppage(&play("event", "Knicks full timeout", 0, 0)));
        assert!(!is_stoppage(&play("rebound", "Hart rebound", 0, 0)));
    }

    #[test]
    fn notable_plays() {
        assert!(is_notable(&play("block", "", 0, 0)));
        assert!(is_notable(&play("Offensive Rebound", "", 0, 0)));
        assert!(!is_notable(&play("substitution", "Smith enters", 0, 0)));
    }

    #[test]
    fn period_boundary() {
        let q1 = play("shot", "", 0, 0);
        let mut q2 = play("shot", "", 0, 0);
        q2.period = 2;
        assert!(is_period_boundary(&q2, Some(&q1)));
        assert!(!is_period_boundary(&q1, Some(&q1)));
        assert!(!is_period_boundary(&q1, None));
    }
}

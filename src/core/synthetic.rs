//! Seeded synthetic games for previews and property tests. The same seed
//! and league always produce the same game.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::schema::game::{GameInfo, GameInput, League, PeriodFormat};
use crate::schema::play::{Play, PlayId, Score};

struct Roster {
    name: &'static str,
    abbreviation: &'static str,
    players: [&'static str; 5],
}

const HOME: Roster = Roster {
    name: "Harbor City Gulls",
    abbreviation: "HCG",
    players: [
        "Marcus Hale",
        "Devin Ortiz",
        "Theo Lambert",
        "Andre Coles",
        "Nico Varga",
    ],
};

const AWAY: Roster = Roster {
    name: "Ridgeview Foxes",
    abbreviation: "RVF",
    players: [
        "Jamal Pierce",
        "Owen Fitch",
        "Luka Brandt",
        "Isaiah Monroe",
        "Caleb Reyes",
    ],
};

/// Regulation periods, seconds per regulation period, seconds per extra
/// period, and plays per regulation period.
fn shape(league: League) -> (u32, u32, u32, u32) {
    match (league, league.period_format()) {
        (League::Wnba, _) => (4, 600, 300, 36),
        (_, PeriodFormat::Quarters) => (4, 720, 300, 42),
        (_, PeriodFormat::Halves) => (2, 1200, 300, 70),
        (_, PeriodFormat::Hockey) => (3, 1200, 300, 30),
    }
}

fn last_name(full: &str) -> &str {
    full.rsplit(' ').next().unwrap_or(full)
}

fn clock(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

struct GameBuilder {
    rng: StdRng,
    league: League,
    plays: Vec<Play>,
    score: Score,
}

impl GameBuilder {
    fn push(
        &mut self,
        period: u32,
        seconds: u32,
        play_type: &str,
        roster: Option<&Roster>,
        player: Option<&str>,
        description: String,
    ) {
        let index = self.plays.len() as u32 + 1;
        self.plays.push(Play {
            play_index: PlayId(index),
            period,
            game_clock: clock(seconds),
            play_type: play_type.to_string(),
            team_abbreviation: roster.map(|r| r.abbreviation.to_string()),
            player_name: player.map(str::to_string),
            description,
            home_score: self.score.home,
            away_score: self.score.away,
            raw: serde_json::Value::Null,
        });
    }

    fn credit(&mut self, home: bool, points: u32) {
        if home {
            self.score.home += points;
        } else {
            self.score.away += points;
        }
    }

    /// One random event for the side with the ball.
    fn event(&mut self, period: u32, seconds: u32) {
        let home = self.rng.gen_bool(0.5);
        let (offense, defense) = if home { (&HOME, &AWAY) } else { (&AWAY, &HOME) };
        let shooter = offense.players[self.rng.gen_range(0..5)];
        let defender = defense.players[self.rng.gen_range(0..5)];
        let roll = self.rng.gen_range(0..100);

        if self.league == League::Nhl {
            match roll {
                0..=6 => {
                    self.credit(home, 1);
                    let text = format!("{} scores goal", last_name(shooter));
                    self.push(period, seconds, "goal", Some(offense), Some(shooter), text);
                }
                7..=44 => {
                    let text = format!("{} shot saved", last_name(shooter));
                    self.push(period, seconds, "shot", Some(offense), Some(shooter), text);
                }
                45..=64 => {
                    let text = format!("{} blocked shot", last_name(defender));
                    self.push(period, seconds, "block", Some(defense), Some(defender), text);
                }
                65..=79 => {
                    let text = format!("{} giveaway turnover", last_name(shooter));
                    self.push(period, seconds, "turnover", Some(offense), Some(shooter), text);
                }
                80..=94 => {
                    let text = format!("{} minor penalty, tripping foul", last_name(defender));
                    self.push(period, seconds, "penalty", Some(defense), Some(defender), text);
                }
                _ => {
                    let text = format!("{} timeout", offense.name);
                    self.push(period, seconds, "timeout", Some(offense), None, text);
                }
            }
            return;
        }

        match roll {
            0..=11 => {
                self.credit(home, 2);
                let text = format!("{} makes driving layup", last_name(shooter));
                self.push(period, seconds, "layup", Some(offense), Some(shooter), text);
            }
            12..=19 => {
                self.credit(home, 2);
                let text = format!("{} makes 14-foot jump shot", last_name(shooter));
                self.push(period, seconds, "jump_shot", Some(offense), Some(shooter), text);
            }
            20..=22 => {
                self.credit(home, 2);
                let text = format!("{} makes dunk", last_name(shooter));
                self.push(period, seconds, "dunk", Some(offense), Some(shooter), text);
            }
            23..=31 => {
                self.credit(home, 3);
                let text = format!("{} makes 3-pt jump shot", last_name(shooter));
                self.push(period, seconds, "three_pointer", Some(offense), Some(shooter), text);
            }
            32..=47 => {
                let text = format!("{} misses 3-pt jump shot", last_name(shooter));
                self.push(period, seconds, "jump_shot", Some(offense), Some(shooter), text);
            }
            48..=60 => {
                let text = format!("{} defensive rebound", last_name(defender));
                self.push(period, seconds, "rebound", Some(defense), Some(defender), text);
            }
            61..=67 => {
                let text = format!("{} bad pass turnover", last_name(shooter));
                self.push(period, seconds, "turnover", Some(offense), Some(shooter), text);
            }
            68..=71 => {
                let text = format!("{} steal", last_name(defender));
                self.push(period, seconds, "steal", Some(defense), Some(defender), text);
            }
            72..=74 => {
                let text = format!("{} block", last_name(defender));
                self.push(period, seconds, "block", Some(defense), Some(defender), text);
            }
            75..=84 => {
                let text = format!("{} personal foul", last_name(defender));
                self.push(period, seconds, "foul", Some(defense), Some(defender), text);
            }
            85..=94 => {
                let made = self.rng.gen_bool(0.75);
                if made {
                    self.credit(home, 1);
                }
                let verb = if made { "makes" } else { "misses" };
                let text = format!("{} {} free throw 1 of 1", last_name(shooter), verb);
                self.push(period, seconds, "free_throw", Some(offense), Some(shooter), text);
            }
            _ => {
                let text = format!("{} timeout", offense.name);
                self.push(period, seconds, "timeout", Some(offense), None, text);
            }
        }
    }

    fn period(&mut self, period: u32, length: u32, plays: u32) {
        let step = (length / plays.max(1)).max(1);
        for k in 0..plays {
            let seconds = length.saturating_sub(step * (k + 1));
            self.event(period, seconds);
        }
    }

    /// Break a tie at the end of the final extra period with one score.
    fn decide(&mut self, period: u32) {
        let home = self.rng.gen_bool(0.5);
        let roster = if home { &HOME } else { &AWAY };
        let shooter = roster.players[self.rng.gen_range(0..5)];
        if self.league == League::Nhl {
            self.credit(home, 1);
            let text = format!("{} scores shootout goal", last_name(shooter));
            self.push(period, 0, "goal", Some(roster), Some(shooter), text);
        } else {
            self.credit(home, 2);
            let text = format!("{} makes driving layup", last_name(shooter));
            self.push(period, 0, "layup", Some(roster), Some(shooter), text);
        }
    }
}

/// Maximum extra periods before a tie is forced open.
const MAX_EXTRA_PERIODS: u32 = 3;

/// Build a complete, ordered game. Scores never decrease and play indices
/// start at 1 and rise by one.
pub fn generate_game(seed: u64, league: League) -> GameInput {
    let (regulation, length, extra_length, per_period) = shape(league);
    let mut builder = GameBuilder {
        rng: StdRng::seed_from_u64(seed),
        league,
        plays: Vec::new(),
        score: Score::ZERO,
    };

    for period in 1..=regulation {
        builder.period(period, length, per_period);
    }
    let mut period = regulation;
    while builder.score.home == builder.score.away {
        period += 1;
        if period - regulation > MAX_EXTRA_PERIODS {
            builder.decide(period - 1);
            break;
        }
        builder.period(period, extra_length, per_period / 3);
    }

    GameInput {
        info: GameInfo {
            game_id: format!("synthetic-{}-{}", league.code().to_lowercase(), seed),
            league,
            home_team: HOME.name.to_string(),
            away_team: AWAY.name.to_string(),
            home_abbreviation: HOME.abbreviation.to_string(),
            away_abbreviation: AWAY.abbreviation.to_string(),
        },
        plays: builder.plays,
        box_score: None,
    }
}

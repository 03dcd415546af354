/// Preview: interactive shell for inspecting recaps of synthetic games.
///
/// Usage: preview [--seed <n>] [--league <nba|wnba|ncaab|nhl>] [--config <file.ron>]
///
/// Commands:
///   moments          list moments with boundary reasons and narratives
///   moment <i>       show one moment's plays
///   blocks           list chapters with roles and key plays
///   story            print the full recap
///   json             dump the story as JSON
///   seed <n>         regenerate the game with a new seed
///   league <code>    regenerate the game for another league
///   help             list commands
///   quit             exit

use pbp_narrative::core::coverage::find_play;
use pbp_narrative::core::pipeline::{GameRecap, RecapPipeline};
use pbp_narrative::core::synthetic::generate_game;
use pbp_narrative::schema::game::{GameInput, League};
use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return;
    }

    let mut seed: u64 = 42;
    let mut league = League::Nba;
    let mut config_path = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--seed" if i + 1 < args.len() => {
                i += 1;
                seed = args[i].parse().unwrap_or(42);
            }
            "--league" if i + 1 < args.len() => {
                i += 1;
                league = parse_league(&args[i]).unwrap_or_else(|| {
                    eprintln!("Unknown league: {}", args[i]);
                    std::process::exit(1);
                });
            }
            "--config" if i + 1 < args.len() => {
                i += 1;
                config_path = Some(args[i].clone());
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let mut builder = RecapPipeline::builder();
    if let Some(ref path) = config_path {
        builder = builder.config_path(path);
    }
    let pipeline = match builder.build() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    let mut session = match Session::load(&pipeline, seed, league) {
        Some(s) => s,
        None => std::process::exit(1),
    };
    session.summary();
    println!("Type 'help' for commands.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("preview> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(cmd) = parts.first() else {
            continue;
        };

        match cmd.to_lowercase().as_str() {
            "quit" | "exit" | "q" => break,
            "help" | "h" | "?" => print_help(),
            "moments" => session.moments(),
            "moment" => match parts.get(1).and_then(|s| s.parse::<usize>().ok()) {
                Some(index) => session.moment(index),
                None => println!("Usage: moment <index>"),
            },
            "blocks" => session.blocks(),
            "story" => session.story(),
            "json" => match serde_json::to_string_pretty(&session.recap.story) {
                Ok(text) => println!("{}", text),
                Err(e) => println!("ERROR: {}", e),
            },
            "seed" => match parts.get(1).and_then(|s| s.parse::<u64>().ok()) {
                Some(seed) => {
                    if let Some(next) = Session::load(&pipeline, seed, session.league) {
                        session = next;
                        session.summary();
                    }
                }
                None => println!("Usage: seed <n>"),
            },
            "league" => match parts.get(1).and_then(|s| parse_league(s)) {
                Some(league) => {
                    if let Some(next) = Session::load(&pipeline, session.seed, league) {
                        session = next;
                        session.summary();
                    }
                }
                None => println!("Usage: league <nba|wnba|ncaab|nhl>"),
            },
            other => println!("Unknown command: {}. Type 'help'.", other),
        }
    }
}

struct Session {
    seed: u64,
    league: League,
    game: GameInput,
    recap: GameRecap,
}

impl Session {
    fn load(pipeline: &RecapPipeline, seed: u64, league: League) -> Option<Session> {
        let game = generate_game(seed, league);
        match pipeline.run_deterministic(&game) {
            Ok(recap) => Some(Session {
                seed,
                league,
                game,
                recap,
            }),
            Err(e) => {
                println!("ERROR: {}", e);
                None
            }
        }
    }

    fn summary(&self) {
        let info = &self.game.info;
        let meta = &self.recap.story.metadata;
        println!(
            "{} {} at {} (seed {})",
            info.league.code(),
            info.away_team,
            info.home_team,
            self.seed
        );
        println!(
            "{} plays, {} moments, {} chapters, {} words",
            meta.play_count,
            meta.moment_count,
            self.recap.story.chapters.len(),
            meta.total_words
        );
        let block = &self.recap.block_report;
        println!(
            "block checks: {} errors, {} warnings",
            block.errors.len(),
            block.warnings.len()
        );
    }

    fn moments(&self) {
        let league = self.game.info.league;
        for (i, moment) in self.recap.moments.iter().enumerate() {
            println!(
                "{:>3} {} {}-{} {:>2} plays {} -> {} [{}]",
                i,
                league.period_label(moment.period),
                moment.start_clock,
                moment.end_clock,
                moment.play_ids.len(),
                moment.score_before,
                moment.score_after,
                moment.boundary_reason.code()
            );
            if let Some(text) = self.recap.moment_text(i) {
                println!("      {}", text);
            }
        }
    }

    fn moment(&self, index: usize) {
        let Some(moment) = self.recap.moments.get(index) else {
            println!("No moment {}; there are {}.", index, self.recap.moments.len());
            return;
        };
        for id in &moment.play_ids {
            let Some(play) = find_play(&self.game.plays, *id) else {
                continue;
            };
            let marker = if moment.explicitly_narrated_play_ids.contains(id) {
                "*"
            } else {
                " "
            };
            println!(
                "{} [{}] {} {}: {} ({}-{})",
                marker,
                id,
                play.game_clock,
                play.team_abbreviation.as_deref().unwrap_or("--"),
                play.description,
                play.home_score,
                play.away_score
            );
        }
        if let Some(record) = self.recap.narratives.get(index) {
            println!(
                "source: {:?}, coverage: {:?}, fallback: {:?}",
                record.source, record.coverage, record.fallback_reason
            );
        }
    }

    fn blocks(&self) {
        for chapter in &self.recap.story.chapters {
            let keys: Vec<String> = chapter.key_play_ids.iter().map(|id| id.to_string()).collect();
            println!(
                "{} {:<15} moments {:?} {} -> {} key plays [{}] ({} words)",
                chapter.block_id,
                chapter.role.name(),
                chapter.moment_indices,
                chapter.score_before,
                chapter.score_after,
                keys.join(", "),
                chapter.word_count()
            );
        }
    }

    fn story(&self) {
        if let Some(ref compact) = self.recap.story.compact_story {
            println!("{}\n", compact);
        }
        for chapter in &self.recap.story.chapters {
            println!("{} ({})", chapter.block_id, chapter.role.name());
            println!("{}\n", chapter.narrative.as_deref().unwrap_or(""));
        }
        println!(
            "Reading time: {:.1} min",
            self.recap.story.reading_time_estimate_minutes
        );
    }
}

fn parse_league(s: &str) -> Option<League> {
    match s.to_lowercase().as_str() {
        "nba" => Some(League::Nba),
        "wnba" => Some(League::Wnba),
        "ncaab" => Some(League::Ncaab),
        "nhl" => Some(League::Nhl),
        _ => None,
    }
}

fn print_usage() {
    println!("Usage: preview [--seed <n>] [--league <nba|wnba|ncaab|nhl>] [--config <file.ron>]");
}

fn print_help() {
    println!("Commands:");
    println!("  moments          list moments with boundary reasons and narratives");
    println!("  moment <i>       show one moment's plays");
    println!("  blocks           list chapters with roles and key plays");
    println!("  story            print the full recap");
    println!("  json             dump the story as JSON");
    println!("  seed <n>         regenerate the game with a new seed");
    println!("  league <code>    regenerate the game for another league");
    println!("  quit             exit");
}

/// Recap Lint: runs the deterministic pipeline over game files and reports
/// every validation issue.
///
/// Usage: recap_lint <game.json | dir> [--config <file.ron>] [--templates <file.ron>] [--json]
///
/// Exits 1 if any game fails moment validation or has block or story errors.

use pbp_narrative::core::pipeline::{GameRecap, PipelineError, RecapPipeline};
use pbp_narrative::core::validation::{ValidationIssue, ValidationReport};
use pbp_narrative::schema::game::GameInput;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!(
            "Usage: recap_lint <game.json | dir> [--config <file.ron>] [--templates <file.ron>] [--json]"
        );
        process::exit(0);
    }

    let input = PathBuf::from(&args[1]);
    let mut config_path = None;
    let mut templates_path = None;
    let mut as_json = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                i += 1;
                config_path = Some(args[i].clone());
            }
            "--templates" if i + 1 < args.len() => {
                i += 1;
                templates_path = Some(args[i].clone());
            }
            "--json" => as_json = true,
            other => {
                eprintln!("Unknown argument: {}", other);
                process::exit(2);
            }
        }
        i += 1;
    }

    let mut builder = RecapPipeline::builder();
    if let Some(ref path) = config_path {
        builder = builder.config_path(path);
    }
    if let Some(ref path) = templates_path {
        builder = builder.templates_path(path);
    }
    let pipeline = match builder.build() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            process::exit(1);
        }
    };

    let files = if input.is_dir() {
        let mut files = Vec::new();
        collect_game_files(&input, &mut files);
        files.sort();
        files
    } else if input.is_file() {
        vec![input.clone()]
    } else {
        eprintln!("ERROR: Path '{}' does not exist", input.display());
        process::exit(1);
    };

    let mut failed = 0;
    for path in &files {
        if !lint_file(&pipeline, path, as_json) {
            failed += 1;
        }
    }

    println!("\nSummary: {} games, {} failed", files.len(), failed);
    process::exit(if failed == 0 { 0 } else { 1 });
}

fn collect_game_files(dir: &Path, out: &mut Vec<PathBuf>) {
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                collect_game_files(&path, out);
            } else if path.extension().and_then(|s| s.to_str()) == Some("json") {
                out.push(path);
            }
        }
    }
}

/// Lint one file. Returns false when the game has errors.
fn lint_file(pipeline: &RecapPipeline, path: &Path, as_json: bool) -> bool {
    println!("\n=== {} ===", path.display());

    let game: GameInput = match std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|s| serde_json::from_str(&s).map_err(|e| e.to_string()))
    {
        Ok(game) => game,
        Err(e) => {
            println!("ERROR: could not load game: {}", e);
            return false;
        }
    };

    match pipeline.run_deterministic(&game) {
        Ok(recap) => {
            if as_json {
                print_json(&recap);
            } else {
                print_recap(&recap);
            }
            recap.is_clean()
        }
        Err(PipelineError::MomentValidation(report)) => {
            println!("Moment validation failed; game aborted.");
            print_report("moments", &report);
            false
        }
        Err(e) => {
            println!("ERROR: {}", e);
            false
        }
    }
}

fn print_recap(recap: &GameRecap) {
    let meta = &recap.story.metadata;
    println!(
        "{} plays, {} moments, {} chapters, {} words ({:.1} min)",
        meta.play_count,
        meta.moment_count,
        recap.story.chapters.len(),
        meta.total_words,
        recap.story.reading_time_estimate_minutes
    );
    println!("{} moment narratives carry injected sentences", meta.injected_narratives);
    print_report("moments", &recap.moment_report);
    print_report("blocks", &recap.block_report);
    print_report("story", &recap.story_report);
}

fn print_json(recap: &GameRecap) {
    let value = serde_json::json!({
        "game_id": recap.story.metadata.game_id,
        "moments": recap.moment_report,
        "blocks": recap.block_report,
        "story": recap.story_report,
    });
    match serde_json::to_string_pretty(&value) {
        Ok(text) => println!("{}", text),
        Err(e) => println!("ERROR: {}", e),
    }
}

fn print_report(stage: &str, report: &ValidationReport) {
    if report.errors.is_empty() && report.warnings.is_empty() {
        println!("[{}] all checks passed", stage);
        return;
    }
    for warning in &report.warnings {
        println!("[{}] WARNING {}", stage, describe(warning));
    }
    for error in &report.errors {
        println!("[{}] ERROR {}", stage, describe(error));
    }
}

fn describe(issue: &ValidationIssue) -> String {
    let code = serde_json::to_value(issue.code)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| format!("{:?}", issue.code));
    let mut out = format!("{}: {}", code, issue.message);
    if !issue.moment_indices.is_empty() {
        out.push_str(&format!(" (moments {:?})", issue.moment_indices));
    }
    if !issue.play_ids.is_empty() {
        let ids: Vec<String> = issue.play_ids.iter().map(|id| id.to_string()).collect();
        out.push_str(&format!(" (plays {})", ids.join(", ")));
    }
    out
}

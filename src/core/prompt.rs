//! Prompt construction and response parsing for moment narration.
//!
//! Prompts are a pure function of their inputs: the same moments, plays,
//! and settings always produce byte-identical text.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::ops::Range;

use crate::core::config::RenderConfig;
use crate::core::coverage::find_play;
use crate::core::language::ForbiddenLanguage;
use crate::core::render::RenderError;
use crate::schema::game::GameInfo;
use crate::schema::moment::Moment;
use crate::schema::play::Play;

const RETRY_WARNING: &str =
    "WARNING: The previous response failed validation. Follow every rule below exactly.";

/// Shared inputs for every prompt of one game.
pub struct PromptContext<'a> {
    pub info: &'a GameInfo,
    pub plays: &'a [Play],
    pub config: &'a RenderConfig,
    pub language: &'a ForbiddenLanguage,
    pub aliases: BTreeMap<String, String>,
}

impl<'a> PromptContext<'a> {
    pub fn new(
        info: &'a GameInfo,
        plays: &'a [Play],
        config: &'a RenderConfig,
        language: &'a ForbiddenLanguage,
    ) -> Self {
        Self {
            info,
            plays,
            config,
            language,
            aliases: build_alias_table(plays),
        }
    }
}

/// `Full Name → Last` for every multi-word player name in the game.
pub fn build_alias_table(plays: &[Play]) -> BTreeMap<String, String> {
    let mut aliases = BTreeMap::new();
    for name in plays.iter().filter_map(Play::player) {
        let tokens: Vec<&str> = name
            .split_whitespace()
            .filter(|t| {
                !matches!(
                    t.trim_end_matches('.').to_lowercase().as_str(),
                    "jr" | "sr" | "ii" | "iii" | "iv"
                )
            })
            .collect();
        if tokens.len() >= 2 {
            if let Some(last) = tokens.last() {
                aliases.insert(name.to_string(), last.to_string());
            }
        }
    }
    aliases
}

/// Truncate to `max_chars` characters, marking the cut with `...`.
pub fn truncate_description(description: &str, max_chars: usize) -> String {
    let trimmed = description.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = trimmed.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Split `count` items into consecutive ranges of at most `size`.
pub fn chunk_ranges(count: usize, size: usize) -> Vec<Range<usize>> {
    let size = size.max(1);
    (0..count)
        .step_by(size)
        .map(|start| start..(start + size).min(count))
        .collect()
}

fn write_header(out: &mut String, ctx: &PromptContext<'_>, is_retry: bool) {
    let info = ctx.info;
    if is_retry {
        let _ = writeln!(out, "{}\n", RETRY_WARNING);
    }
    let _ = writeln!(
        out,
        "Write factual recap text for {} at {} ({}).",
        info.away_team,
        info.home_team,
        info.league.code()
    );
    let _ = writeln!(
        out,
        "Home: {} ({}). Away: {} ({}). Scores are listed home-away.",
        info.home_team, info.home_abbreviation, info.away_team, info.away_abbreviation
    );
    if !ctx.aliases.is_empty() {
        let table: Vec<String> = ctx
            .aliases
            .iter()
            .map(|(full, last)| format!("{} = {}", full, last))
            .collect();
        let _ = writeln!(out, "Player aliases: {}", table.join("; "));
    }
    let _ = writeln!(out, "\nRules:");
    let _ = writeln!(
        out,
        "- Write {}-{} sentences per moment.",
        ctx.config.min_sentences, ctx.config.max_sentences
    );
    let _ = writeln!(
        out,
        "- Mention every play marked with * by the player's name or the action."
    );
    let _ = writeln!(
        out,
        "- Use only the facts listed. Do not invent statistics, players, or events."
    );
    let _ = writeln!(
        out,
        "- Never use these words or anything like them: {}.",
        ctx.language.prompt_examples().join(", ")
    );
    let _ = writeln!(
        out,
        "- No opinions, crowd references, hindsight, speculation, or guesses about intent."
    );
}

fn write_moment(out: &mut String, ctx: &PromptContext<'_>, index: usize, moment: &Moment) {
    let period = ctx.info.league.period_label(moment.period);
    let _ = writeln!(
        out,
        "\nMoment {} | {} {}-{} | Score {} -> {}",
        index, period, moment.start_clock, moment.end_clock, moment.score_before, moment.score_after
    );
    for id in &moment.play_ids {
        let Some(play) = find_play(ctx.plays, *id) else {
            continue;
        };
        let marker = if moment.explicitly_narrated_play_ids.contains(id) {
            "*"
        } else {
            " "
        };
        let team = play.team().unwrap_or("--");
        let _ = writeln!(
            out,
            "{} [{}] {} {}: {}",
            marker,
            id,
            play.game_clock,
            team,
            truncate_description(&play.description, ctx.config.description_max_chars)
        );
    }
}

/// Prompt for one moment; the reply is plain narrative text.
pub fn build_moment_prompt(
    ctx: &PromptContext<'_>,
    index: usize,
    moment: &Moment,
    is_retry: bool,
) -> String {
    let mut out = String::new();
    write_header(&mut out, ctx, is_retry);
    write_moment(&mut out, ctx, index, moment);
    let _ = writeln!(
        out,
        "\nRespond with the narrative text only, no labels or formatting."
    );
    out
}

/// Prompt for several moments; the reply is JSON keyed by moment index.
pub fn build_batch_prompt(
    ctx: &PromptContext<'_>,
    moments: &[(usize, &Moment)],
    is_retry: bool,
) -> String {
    let mut out = String::new();
    write_header(&mut out, ctx, is_retry);
    for (index, moment) in moments {
        write_moment(&mut out, ctx, *index, moment);
    }
    let _ = writeln!(
        out,
        "\nRespond with JSON only: {{\"moments\": [{{\"index\": <moment number>, \"narrative\": \"<text>\"}}]}}"
    );
    out
}

#[derive(Debug, Deserialize)]
struct BatchReply {
    moments: Vec<BatchItem>,
}

#[derive(Debug, Deserialize)]
struct BatchItem {
    index: usize,
    narrative: String,
}

fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// The outermost `{...}` in a reply, ignoring code fences and chatter.
pub(crate) fn json_object(text: &str) -> Option<&str> {
    let body = strip_fences(text);
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    (end > start).then(|| &body[start..=end])
}

/// Parse a batch reply into `moment index → narrative`. Code fences and
/// chatter around the JSON object are tolerated.
pub fn parse_batch_response(text: &str) -> Result<BTreeMap<usize, String>, RenderError> {
    let Some(object) = json_object(text) else {
        return Err(RenderError::MalformedResponse(
            "no JSON object in reply".to_string(),
        ));
    };
    let reply: BatchReply = serde_json::from_str(object)?;
    Ok(reply
        .moments
        .into_iter()
        .map(|item| (item.index, item.narrative.trim().to_string()))
        .collect())
}

/// Clean a plain-text reply: fences and wrapping quotes removed.
pub fn parse_single_response(text: &str) -> String {
    let body = strip_fences(text);
    body.strip_prefix('"')
        .and_then(|b| b.strip_suffix('"'))
        .unwrap_or(body)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::game::League;
    use crate::schema::moment::BoundaryReason;
    use crate::schema::play::{PlayId, Score};
    use crate::testing::PlayBuilder;

    fn info() -> GameInfo {
        GameInfo {
            game_id: "g1".to_string(),
            league: League::Nba,
            home_team: "New York Knicks".to_string(),
            away_team: "Boston Celtics".to_string(),
            home_abbreviation: "NYK".to_string(),
            away_abbreviation: "BOS".to_string(),
        }
    }

    fn plays() -> Vec<Play> {
        vec![
            PlayBuilder::new(1)
                .period(2)
                .clock("7:45")
                .team("NYK")
                .player("Jalen Brunson")
                .describe("Brunson makes 3-pt jump shot")
                .score(3, 0)
                .build(),
            PlayBuilder::new(2)
                .period(2)
                .clock("7:20")
                .team("BOS")
                .player("Jaylen Brown")
                .describe("Brown defensive rebound")
                .score(3, 0)
                .build(),
        ]
    }

    fn moment() -> Moment {
        Moment {
            play_ids: vec![PlayId(1), PlayId(2)],
            explicitly_narrated_play_ids: vec![PlayId(1)],
            score_before: Score::ZERO,
            score_after: Score::new(3, 0),
            period: 2,
            start_clock: "7:45".to_string(),
            end_clock: "7:20".to_string(),
            narrative: None,
            boundary_reason: BoundaryReason::Scoring,
        }
    }

    #[test]
    fn moment_prompt_contents() {
        let info = info();
        let plays = plays();
        let config = RenderConfig::default();
        let ctx = PromptContext::new(&info, &plays, &config, ForbiddenLanguage::standard());
        let prompt = build_moment_prompt(&ctx, 4, &moment(), false);

        assert!(prompt.contains("Boston Celtics at New York Knicks (NBA)"));
        assert!(prompt.contains("Moment 4 | Q2 7:45-7:20 | Score 0-0 -> 3-0"));
        assert!(prompt.contains("* [1] 7:45 NYK: Brunson makes 3-pt jump shot"));
        assert!(prompt.contains("  [2] 7:20 BOS: Brown defensive rebound"));
        assert!(prompt.contains("Jalen Brunson = Brunson"));
        assert!(prompt.contains("2-4 sentences"));
        assert!(prompt.contains("momentum"));
        assert!(!prompt.contains("WARNING"));
    }

    #[test]
    fn retry_prompt_only_adds_warning() {
        let info = info();
        let plays = plays();
        let config = RenderConfig::default();
        let ctx = PromptContext::new(&info, &plays, &config, ForbiddenLanguage::standard());
        let first = build_moment_prompt(&ctx, 0, &moment(), false);
        let retry = build_moment_prompt(&ctx, 0, &moment(), true);
        assert!(retry.starts_with(RETRY_WARNING));
        assert!(retry.ends_with(&first));
    }

    #[test]
    fn prompts_are_deterministic() {
        let info = info();
        let plays = plays();
        let config = RenderConfig::default();
        let ctx = PromptContext::new(&info, &plays, &config, ForbiddenLanguage::standard());
        let m = moment();
        let a = build_batch_prompt(&ctx, &[(0, &m), (1, &m)], false);
        let b = build_batch_prompt(&ctx, &[(0, &m), (1, &m)], false);
        assert_eq!(a, b);
        assert!(a.contains("\"moments\""));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let long = "é".repeat(150);
        let cut = truncate_description(&long, 100);
        assert_eq!(cut.chars().count(), 100);
        assert!(cut.ends_with("..."));
        assert_eq!(truncate_description("short", 100), "short");
    }

    #[test]
    fn chunking() {
        assert_eq!(chunk_ranges(0, 50), Vec::<Range<usize>>::new());
        assert_eq!(chunk_ranges(120, 50), vec![0..50, 50..100, 100..120]);
        assert_eq!(chunk_ranges(3, 0), vec![0..1, 1..2, 2..3]);
    }

    #[test]
    fn alias_table_skips_suffixes_and_single_names() {
        let plays = vec![
            PlayBuilder::new(1).player("Gary Payton Jr.").build(),
            PlayBuilder::new(2).player("Nene").build(),
        ];
        let aliases = build_alias_table(&plays);
        assert_eq!(aliases.get("Gary Payton Jr."), Some(&"Payton".to_string()));
        assert!(!aliases.contains_key("Nene"));
    }

    #[test]
    fn parse_batch_with_fences() {
        let reply = "```json\n{\"moments\": [{\"index\": 3, \"narrative\": \" Brunson hit a three. \"}]}\n```";
        let parsed = parse_batch_response(reply).unwrap();
        assert_eq!(parsed.get(&3).map(String::as_str), Some("Brunson hit a three."));
    }

    #[test]
    fn parse_batch_rejects_garbage() {
        assert!(matches!(
            parse_batch_response("sorry, I can't"),
            Err(RenderError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_batch_response("{\"moments\": 3}"),
            Err(RenderError::Json(_))
        ));
    }

    #[test]
    fn parse_single_strips_quotes() {
        assert_eq!(parse_single_response("\"Brunson scored.\"\n"), "Brunson scored.");
        assert_eq!(parse_single_response("```\nText here.\n```"), "Text here.");
    }
}

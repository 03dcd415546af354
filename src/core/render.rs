//! Moment narration. Generated text is validated, retried once, checked
//! for coverage, and replaced by deterministic text whenever it cannot be
//! trusted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::classifier::is_narration_worthy;
use crate::core::config::RenderConfig;
use crate::core::coverage::{
    check_coverage, deterministic_narrative, enforce_coverage, CoverageResolution,
};
use crate::core::language::ForbiddenLanguage;
use crate::core::llm::{call_bounded, CallPolicy, GenerationError, TextGenerator};
use crate::core::prompt::{
    build_batch_prompt, build_moment_prompt, chunk_ranges, parse_batch_response,
    parse_single_response, PromptContext,
};
use crate::core::sentences::count_sentences;
use crate::core::template::InjectionTemplates;
use crate::core::validation::{IssueCode, ValidationIssue, ValidationReport};
use crate::schema::game::GameInfo;
use crate::schema::moment::Moment;
use crate::schema::play::{Play, PlayId};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("malformed generator response: {0}")]
    MalformedResponse(String),
    #[error("response JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{} narrative(s) failed the final language check", .0.errors.len())]
    NarrativeGate(ValidationReport),
}

/// Whether a fallback was expected or signals a defect upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FallbackKind {
    Valid,
    Invalid,
}

/// Why a moment received deterministic text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FallbackReason {
    /// Nothing scored or notable happened; never sent to the generator.
    LowSignal,
    NoGenerator,
    GenerationFailed,
    Timeout,
    MalformedResponse,
    MissingFromBatch,
    ForbiddenLanguage,
    EmptyText,
}

impl FallbackReason {
    pub fn kind(&self) -> FallbackKind {
        match self {
            Self::LowSignal | Self::NoGenerator => FallbackKind::Valid,
            Self::GenerationFailed
            | Self::Timeout
            | Self::MalformedResponse
            | Self::MissingFromBatch
            | Self::ForbiddenLanguage
            | Self::EmptyText => FallbackKind::Invalid,
        }
    }

    /// Worth one more generation attempt with the retry warning.
    fn retryable(&self) -> bool {
        matches!(
            self,
            Self::MalformedResponse | Self::MissingFromBatch | Self::ForbiddenLanguage | Self::EmptyText
        )
    }
}

impl From<&GenerationError> for FallbackReason {
    fn from(err: &GenerationError) -> Self {
        match err {
            GenerationError::Failed(_) => Self::GenerationFailed,
            GenerationError::Timeout(_) => Self::Timeout,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NarrativeSource {
    Generated,
    Deterministic,
}

/// How one moment's narrative came to be.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeRecord {
    pub moment_index: usize,
    pub source: NarrativeSource,
    pub coverage: CoverageResolution,
    pub fallback_reason: Option<FallbackReason>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub injected: Vec<PlayId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ValidationIssue>,
}

/// Check one narrative. Empty text and forbidden language are errors;
/// sentence count and missing explicit plays are warnings.
pub fn validate_narrative(
    moment_index: usize,
    text: &str,
    moment: &Moment,
    plays: &[Play],
    config: &RenderConfig,
    language: &ForbiddenLanguage,
) -> ValidationReport {
    let mut report = ValidationReport::new();
    if text.trim().is_empty() {
        report.error(
            ValidationIssue::new(
                IssueCode::EmptyNarrative,
                format!("moment {} narrative is empty", moment_index),
            )
            .with_moments([moment_index]),
        );
        return report;
    }

    let violations = language.find(text);
    if !violations.is_empty() {
        let matched: Vec<&str> = violations.iter().map(|v| v.matched.as_str()).collect();
        report.error(
            ValidationIssue::new(
                IssueCode::ForbiddenLanguage,
                format!(
                    "moment {} narrative uses forbidden language: {}",
                    moment_index,
                    matched.join(", ")
                ),
            )
            .with_moments([moment_index]),
        );
    }

    let sentences = count_sentences(text);
    if sentences < config.min_sentences || sentences > config.max_sentences {
        report.warning(
            ValidationIssue::new(
                IssueCode::SentenceCount,
                format!(
                    "moment {} narrative has {} sentences, expected {}-{}",
                    moment_index, sentences, config.min_sentences, config.max_sentences
                ),
            )
            .with_moments([moment_index]),
        );
    }

    let missing = check_coverage(text, &moment.explicitly_narrated_play_ids, plays);
    if !missing.is_empty() {
        report.warning(
            ValidationIssue::new(
                IssueCode::MissingExplicitPlay,
                format!("moment {} narrative omits explicit plays", moment_index),
            )
            .with_moments([moment_index])
            .with_plays(missing),
        );
    }
    report
}

fn hard_failure(report: &ValidationReport) -> Option<FallbackReason> {
    if report.has_error(IssueCode::EmptyNarrative) {
        Some(FallbackReason::EmptyText)
    } else if report.has_error(IssueCode::ForbiddenLanguage) {
        Some(FallbackReason::ForbiddenLanguage)
    } else {
        None
    }
}

/// True when no play in the moment scored or was notable.
pub fn is_low_signal(moment: &Moment, plays: &[Play]) -> bool {
    !moment.play_ids.iter().any(|id| {
        match plays.binary_search_by_key(id, Play::id) {
            Ok(pos) => is_narration_worthy(&plays[pos], pos.checked_sub(1).map(|p| &plays[p])),
            Err(_) => false,
        }
    })
}

type ChunkResult = BTreeMap<usize, Result<String, FallbackReason>>;

/// Renders narratives for every moment of one game.
pub struct Renderer<'a> {
    info: &'a GameInfo,
    plays: &'a [Play],
    config: &'a RenderConfig,
    templates: &'a InjectionTemplates,
    language: &'a ForbiddenLanguage,
    generator: Option<&'a dyn TextGenerator>,
}

impl<'a> Renderer<'a> {
    pub fn new(
        info: &'a GameInfo,
        plays: &'a [Play],
        config: &'a RenderConfig,
        templates: &'a InjectionTemplates,
    ) -> Self {
        Self {
            info,
            plays,
            config,
            templates,
            language: ForbiddenLanguage::standard(),
            generator: None,
        }
    }

    pub fn with_generator(mut self, generator: &'a dyn TextGenerator) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_language(mut self, language: &'a ForbiddenLanguage) -> Self {
        self.language = language;
        self
    }

    fn policy(&self) -> CallPolicy {
        CallPolicy {
            timeout: Duration::from_millis(self.config.call_timeout_ms),
            retries: self.config.call_retries,
        }
    }

    /// Deterministic text for every moment, without touching a generator.
    pub fn render_deterministic(
        &self,
        moments: &mut [Moment],
    ) -> Result<Vec<NarrativeRecord>, RenderError> {
        let records = moments
            .iter_mut()
            .enumerate()
            .map(|(i, moment)| {
                let reason = if is_low_signal(moment, self.plays) {
                    FallbackReason::LowSignal
                } else {
                    FallbackReason::NoGenerator
                };
                self.fallback(i, moment, reason)
            })
            .collect();
        self.final_gate(moments)?;
        Ok(records)
    }

    /// Render every moment, generating text where a generator is attached.
    pub async fn render(
        &self,
        moments: &mut [Moment],
    ) -> Result<Vec<NarrativeRecord>, RenderError> {
        let Some(generator) = self.generator else {
            return self.render_deterministic(moments);
        };

        let mut records: Vec<Option<NarrativeRecord>> = vec![None; moments.len()];
        let mut pending = Vec::new();
        for (i, moment) in moments.iter_mut().enumerate() {
            if is_low_signal(moment, self.plays) {
                records[i] = Some(self.fallback(i, moment, FallbackReason::LowSignal));
            } else {
                pending.push(i);
            }
        }

        let ctx = PromptContext::new(self.info, self.plays, self.config, self.language);
        let first = self
            .generate_all(generator, &ctx, moments, &pending, false)
            .await;

        // Accepted text per moment, with whether it came from the retry.
        let mut accepted: BTreeMap<usize, (String, bool)> = BTreeMap::new();
        // First-attempt text with only soft issues, used if the retry is worse.
        let mut kept: BTreeMap<usize, String> = BTreeMap::new();
        let mut failures: BTreeMap<usize, FallbackReason> = BTreeMap::new();
        let mut retry = Vec::new();

        for (i, result) in first {
            match result {
                Ok(text) => {
                    let report =
                        validate_narrative(i, &text, &moments[i], self.plays, self.config, self.language);
                    if report.errors.is_empty() && report.warnings.is_empty() {
                        accepted.insert(i, (text, false));
                        continue;
                    }
                    match hard_failure(&report) {
                        Some(reason) => {
                            failures.insert(i, reason);
                        }
                        None => {
                            kept.insert(i, text);
                        }
                    }
                    retry.push(i);
                }
                Err(reason) => {
                    failures.insert(i, reason);
                    if reason.retryable() {
                        retry.push(i);
                    }
                }
            }
        }

        if !retry.is_empty() {
            info!(moments = retry.len(), "re-sending moments that failed validation");
            let second = self
                .generate_all(generator, &ctx, moments, &retry, true)
                .await;
            for (i, result) in second {
                match result {
                    Ok(text) => {
                        let report = validate_narrative(
                            i,
                            &text,
                            &moments[i],
                            self.plays,
                            self.config,
                            self.language,
                        );
                        match hard_failure(&report) {
                            None => {
                                kept.remove(&i);
                                accepted.insert(i, (text, true));
                                continue;
                            }
                            Some(reason) => {
                                failures.insert(i, reason);
                            }
                        }
                    }
                    Err(reason) => {
                        failures.insert(i, reason);
                    }
                }
                if let Some(text) = kept.remove(&i) {
                    accepted.insert(i, (text, false));
                }
            }
        }

        for i in pending {
            let moment = &mut moments[i];
            records[i] = Some(match accepted.remove(&i) {
                Some((text, after_retry)) => self.accept(i, moment, &text, after_retry),
                None => {
                    let reason = failures
                        .get(&i)
                        .copied()
                        .unwrap_or(FallbackReason::GenerationFailed);
                    self.fallback(i, moment, reason)
                }
            });
        }

        self.final_gate(moments)?;
        Ok(records.into_iter().flatten().collect())
    }

    async fn generate_all(
        &self,
        generator: &dyn TextGenerator,
        ctx: &PromptContext<'_>,
        moments: &[Moment],
        indices: &[usize],
        is_retry: bool,
    ) -> ChunkResult {
        let mut results = ChunkResult::new();
        for range in chunk_ranges(indices.len(), self.config.batch_size) {
            results.extend(
                self.generate_chunk(generator, ctx, moments, &indices[range], is_retry)
                    .await,
            );
        }
        results
    }

    async fn generate_chunk(
        &self,
        generator: &dyn TextGenerator,
        ctx: &PromptContext<'_>,
        moments: &[Moment],
        indices: &[usize],
        is_retry: bool,
    ) -> ChunkResult {
        if let [index] = indices {
            let prompt = build_moment_prompt(ctx, *index, &moments[*index], is_retry);
            let result = match call_bounded(generator, &prompt, self.policy()).await {
                Ok(generation) => Ok(parse_single_response(&generation.text)),
                Err(err) => Err(FallbackReason::from(&err)),
            };
            return ChunkResult::from([(*index, result)]);
        }

        let batch: Vec<(usize, &Moment)> = indices.iter().map(|&i| (i, &moments[i])).collect();
        let prompt = build_batch_prompt(ctx, &batch, is_retry);
        debug!(moments = indices.len(), is_retry, "sending batch prompt");

        let failed_all = |reason: FallbackReason| -> ChunkResult {
            indices.iter().map(|&i| (i, Err(reason))).collect()
        };
        let generation = match call_bounded(generator, &prompt, self.policy()).await {
            Ok(generation) => generation,
            Err(err) => return failed_all(FallbackReason::from(&err)),
        };
        match parse_batch_response(&generation.text) {
            Ok(mut parsed) => indices
                .iter()
                .map(|&i| (i, parsed.remove(&i).ok_or(FallbackReason::MissingFromBatch)))
                .collect(),
            Err(err) => {
                warn!(error = %err, is_retry, "could not parse batch response");
                failed_all(FallbackReason::MalformedResponse)
            }
        }
    }

    fn accept(
        &self,
        index: usize,
        moment: &mut Moment,
        text: &str,
        after_retry: bool,
    ) -> NarrativeRecord {
        let outcome = enforce_coverage(
            text,
            &moment.explicitly_narrated_play_ids,
            self.plays,
            self.templates,
            after_retry,
        );
        let report = validate_narrative(
            index,
            &outcome.narrative,
            moment,
            self.plays,
            self.config,
            self.language,
        );
        moment.narrative = Some(outcome.narrative);
        NarrativeRecord {
            moment_index: index,
            source: NarrativeSource::Generated,
            coverage: outcome.resolution,
            fallback_reason: None,
            injected: outcome.injected,
            warnings: report.warnings,
        }
    }

    fn fallback(&self, index: usize, moment: &mut Moment, reason: FallbackReason) -> NarrativeRecord {
        match reason.kind() {
            FallbackKind::Valid => debug!(moment = index, ?reason, "deterministic narrative"),
            FallbackKind::Invalid => warn!(moment = index, ?reason, "falling back to deterministic narrative"),
        }
        let text = deterministic_narrative(moment, self.plays, self.templates);
        let outcome = enforce_coverage(
            &text,
            &moment.explicitly_narrated_play_ids,
            self.plays,
            self.templates,
            false,
        );
        moment.narrative = Some(outcome.narrative);
        NarrativeRecord {
            moment_index: index,
            source: NarrativeSource::Deterministic,
            coverage: outcome.resolution,
            fallback_reason: Some(reason),
            injected: outcome.injected,
            warnings: Vec::new(),
        }
    }

    /// No narrative leaves the renderer empty or with forbidden language.
    fn final_gate(&self, moments: &[Moment]) -> Result<(), RenderError> {
        let mut report = ValidationReport::new();
        for (i, moment) in moments.iter().enumerate() {
            let text = moment.narrative_text();
            if text.trim().is_empty() {
                report.error(
                    ValidationIssue::new(IssueCode::EmptyNarrative, format!("moment {} has no narrative", i))
                        .with_moments([i]),
                );
            } else if let Some(violation) = self.language.find(text).first() {
                report.error(
                    ValidationIssue::new(
                        IssueCode::ForbiddenLanguage,
                        format!("moment {} narrative contains '{}'", i, violation.matched),
                    )
                    .with_moments([i]),
                );
            }
        }
        if report.validated {
            Ok(())
        } else {
            warn!(errors = report.errors.len(), "narratives failed the final language check");
            Err(RenderError::NarrativeGate(report))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::game::League;
    use crate::schema::moment::BoundaryReason;
    use crate::schema::play::Score;
    use crate::testing::{MockGenerator, MockReply, PlayBuilder};

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
                .kind("layup")
                .team("NYK")
                .player("Jalen Brunson")
                .describe("Brunson makes driving layup")
                .score(2, 0)
                .build(),
            PlayBuilder::new(2)
                .kind("jump_shot")
                .team("BOS")
                .player("Jayson Tatum")
                .describe("Tatum makes 3-pt jump shot")
                .score(2, 3)
                .build(),
            PlayBuilder::new(3)
                .kind("timeout")
                .team("NYK")
                .describe("Knicks full timeout")
                .score(2, 3)
                .build(),
        ]
    }

    fn moment(id: u32, before: (u32, u32), after: (u32, u32)) -> Moment {
        Moment {
            play_ids: vec![PlayId(id)],
            explicitly_narrated_play_ids: vec![PlayId(id)],
            score_before: Score::new(before.0, before.1),
            score_after: Score::new(after.0, after.1),
            period: 1,
            start_clock: "12:00".to_string(),
            end_clock: "12:00".to_string(),
            narrative: None,
            boundary_reason: BoundaryReason::Scoring,
        }
    }

    fn moments() -> Vec<Moment> {
        vec![
            moment(1, (0, 0), (2, 0)),
            moment(2, (2, 0), (2, 3)),
            moment(3, (2, 3), (2, 3)),
        ]
    }

    const GOOD_0: &str = "Jalen Brunson scored on a drive. New York led 2-0.";
    const GOOD_1: &str = "Jayson Tatum hit a three. Boston led 3-2.";

    fn batch_reply(first: &str, second: &str) -> MockReply {
        let json = serde_json::json!({
            "moments": [
                {"index": 0, "narrative": first},
                {"index": 1, "narrative": second},
            ]
        });
        MockReply::Text(json.to_string(), 0.9)
    }

    #[test]
    fn narrative_validation_severity() {
        let plays = plays();
        let m = moment(1, (0, 0), (2, 0));
        let config = RenderConfig::default();
        let language = ForbiddenLanguage::standard();

        let empty = validate_narrative(0, "  ", &m, &plays, &config, language);
        assert!(empty.has_error(IssueCode::EmptyNarrative));

        let forbidden =
            validate_narrative(0, "Brunson took over. He scored.", &m, &plays, &config, language);
        assert!(forbidden.has_error(IssueCode::ForbiddenLanguage));

        let soft = validate_narrative(0, "New York scored.", &m, &plays, &config, language);
        assert!(soft.validated);
        assert!(soft.has_warning(IssueCode::SentenceCount));
        assert!(soft.has_warning(IssueCode::MissingExplicitPlay));
    }

    #[test]
    fn fallback_kinds() {
        assert_eq!(FallbackReason::LowSignal.kind(), FallbackKind::Valid);
        assert_eq!(FallbackReason::NoGenerator.kind(), FallbackKind::Valid);
        assert_eq!(FallbackReason::Timeout.kind(), FallbackKind::Invalid);
        assert_eq!(FallbackReason::ForbiddenLanguage.kind(), FallbackKind::Invalid);
    }

    #[test]
    fn low_signal_detection() {
        let plays = plays();
        assert!(!is_low_signal(&moment(1, (0, 0), (2, 0)), &plays));
        assert!(is_low_signal(&moment(3, (2, 3), (2, 3)), &plays));
    }

    #[test]
    fn deterministic_render_without_generator() {
        let info = info();
        let plays = plays();
        let config = RenderConfig::default();
        let templates = InjectionTemplates::default();
        let mut moments = moments();
        let records = Renderer::new(&info, &plays, &config, &templates)
            .render_deterministic(&mut moments)
            .unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].fallback_reason, Some(FallbackReason::NoGenerator));
        assert_eq!(records[2].fallback_reason, Some(FallbackReason::LowSignal));
        assert_eq!(
            moments[0].narrative.as_deref(),
            Some("Jalen Brunson scored on a layup. The score was 2-0.")
        );
        assert!(moments.iter().all(|m| m.narrative.is_some()));
    }

    #[tokio::test]
    async fn batch_first_pass() {
        let info = info();
        let plays = plays();
        let config = RenderConfig::default();
        let templates = InjectionTemplates::default();
        let generator = MockGenerator::new(vec![batch_reply(GOOD_0, GOOD_1)]);
        let mut moments = moments();
        let records = Renderer::new(&info, &plays, &config, &templates)
            .with_generator(&generator)
            .render(&mut moments)
            .await
            .unwrap();

        assert_eq!(generator.calls(), 1);
        assert_eq!(records[0].source, NarrativeSource::Generated);
        assert_eq!(records[0].coverage, CoverageResolution::InitialPass);
        assert_eq!(records[1].coverage, CoverageResolution::InitialPass);
        assert_eq!(records[2].fallback_reason, Some(FallbackReason::LowSignal));
        assert_eq!(moments[1].narrative.as_deref(), Some(GOOD_1));
        assert!(!generator.prompts()[0].contains("Moment 2"));
    }

    #[tokio::test]
    async fn forbidden_language_fixed_on_retry() {
        let info = info();
        let plays = plays();
        let config = RenderConfig::default();
        let templates = InjectionTemplates::default();
        let generator = MockGenerator::new(vec![
            batch_reply(GOOD_0, "Jayson Tatum hit a clutch three. Boston led 3-2."),
            MockReply::Text(GOOD_1.to_string(), 0.9),
        ]);
        let mut moments = moments();
        let records = Renderer::new(&info, &plays, &config, &templates)
            .with_generator(&generator)
            .render(&mut moments)
            .await
            .unwrap();

        let prompts = generator.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].starts_with("WARNING"));
        assert!(prompts[1].contains("Moment 1 |"));
        assert!(!prompts[1].contains("Moment 0 |"));
        assert_eq!(records[1].coverage, CoverageResolution::RegenerationPass);
        assert_eq!(moments[1].narrative.as_deref(), Some(GOOD_1));
    }

    #[tokio::test]
    async fn persistent_forbidden_language_falls_back() {
        let info = info();
        let plays = plays();
        let config = RenderConfig::default();
        let templates = InjectionTemplates::default();
        let bad = "Jayson Tatum hit a clutch three. Boston led 3-2.";
        let generator = MockGenerator::new(vec![
            batch_reply(GOOD_0, bad),
            MockReply::Text(bad.to_string(), 0.9),
        ]);
        let mut moments = moments();
        let records = Renderer::new(&info, &plays, &config, &templates)
            .with_generator(&generator)
            .render(&mut moments)
            .await
            .unwrap();

        assert_eq!(records[1].source, NarrativeSource::Deterministic);
        assert_eq!(records[1].fallback_reason, Some(FallbackReason::ForbiddenLanguage));
        assert_eq!(
            moments[1].narrative.as_deref(),
            Some("Jayson Tatum hit a three. The score was 2-3.")
        );
    }

    #[tokio::test]
    async fn soft_first_attempt_survives_bad_retry() {
        let info = info();
        let plays = plays();
        let config = RenderConfig::default();
        let templates = InjectionTemplates::default();
        let short = "Jayson Tatum hit a three.";
        let generator = MockGenerator::new(vec![
            batch_reply(GOOD_0, short),
            MockReply::Text("Tatum was dominant. Boston led.".to_string(), 0.9),
        ]);
        let mut moments = moments();
        let records = Renderer::new(&info, &plays, &config, &templates)
            .with_generator(&generator)
            .render(&mut moments)
            .await
            .unwrap();

        assert_eq!(records[1].source, NarrativeSource::Generated);
        assert_eq!(records[1].coverage, CoverageResolution::InitialPass);
        assert_eq!(records[1].warnings[0].code, IssueCode::SentenceCount);
        assert_eq!(moments[1].narrative.as_deref(), Some(short));
    }

    #[tokio::test]
    async fn missing_coverage_is_injected_after_retry() {
        let info = info();
        let plays = plays();
        let config = RenderConfig::default();
        let templates = InjectionTemplates::default();
        let vague = "Boston answered. The visitors led 3-2.";
        let generator = MockGenerator::new(vec![
            batch_reply(GOOD_0, vague),
            MockReply::Text(vague.to_string(), 0.9),
        ]);
        let mut moments = moments();
        let records = Renderer::new(&info, &plays, &config, &templates)
            .with_generator(&generator)
            .render(&mut moments)
            .await
            .unwrap();

        assert_eq!(records[1].coverage, CoverageResolution::InjectionRequired);
        assert_eq!(records[1].injected, vec![PlayId(2)]);
        assert_eq!(
            moments[1].narrative.as_deref(),
            Some("Boston answered. The visitors led 3-2. Jayson Tatum hit a three.")
        );
    }

    #[tokio::test]
    async fn malformed_batch_retried_then_falls_back() {
        let info = info();
        let plays = plays();
        let config = RenderConfig::default();
        let templates = InjectionTemplates::default();
        let generator = MockGenerator::new(vec![
            MockReply::Text("not json".to_string(), 0.9),
            MockReply::Text("still not json".to_string(), 0.9),
        ]);
        let mut moments = moments();
        let records = Renderer::new(&info, &plays, &config, &templates)
            .with_generator(&generator)
            .render(&mut moments)
            .await
            .unwrap();

        assert_eq!(generator.calls(), 2);
        assert_eq!(records[0].fallback_reason, Some(FallbackReason::MalformedResponse));
        assert_eq!(records[1].fallback_reason, Some(FallbackReason::MalformedResponse));
    }

    #[tokio::test]
    async fn transport_failure_is_not_rerendered() {
        let info = info();
        let plays = plays();
        let config = RenderConfig::default();
        let templates = InjectionTemplates::default();
        let generator = MockGenerator::new(vec![
            MockReply::Fail("503".to_string()),
            MockReply::Fail("503".to_string()),
        ]);
        let mut moments = moments();
        let records = Renderer::new(&info, &plays, &config, &templates)
            .with_generator(&generator)
            .render(&mut moments)
            .await
            .unwrap();

        assert_eq!(generator.calls(), 2);
        assert_eq!(records[0].fallback_reason, Some(FallbackReason::GenerationFailed));
        assert_eq!(records[0].fallback_reason.map(|r| r.kind()), Some(FallbackKind::Invalid));
    }

    #[tokio::test]
    async fn missing_from_batch_is_retried_alone() {
        let info = info();
        let plays = plays();
        let config = RenderConfig::default();
        let templates = InjectionTemplates::default();
        let partial = serde_json::json!({"moments": [{"index": 0, "narrative": GOOD_0}]});
        let generator = MockGenerator::new(vec![
            MockReply::Text(partial.to_string(), 0.9),
            MockReply::Text(GOOD_1.to_string(), 0.9),
        ]);
        let mut moments = moments();
        let records = Renderer::new(&info, &plays, &config, &templates)
            .with_generator(&generator)
            .render(&mut moments)
            .await
            .unwrap();

        assert_eq!(records[1].source, NarrativeSource::Generated);
        assert_eq!(moments[1].narrative.as_deref(), Some(GOOD_1));
    }

    #[test]
    fn final_gate_rejects_forbidden_fallback_text() {
        let info = info();
        let plays = vec![PlayBuilder::new(1)
            .kind("review")
            .describe("crowd noise delay")
            .score(0, 0)
            .build()];
        let config = RenderConfig::default();
        let templates = InjectionTemplates::default();
        let mut moments = vec![moment(1, (0, 0), (0, 0))];
        let err = Renderer::new(&info, &plays, &config, &templates)
            .render_deterministic(&mut moments)
            .unwrap_err();
        match err {
            RenderError::NarrativeGate(report) => {
                assert!(report.has_error(IssueCode::ForbiddenLanguage));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

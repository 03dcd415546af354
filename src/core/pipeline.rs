//! The recap pipeline: plays → moments → narratives → blocks → story,
//! with the optional guardrail augmentation on top.
//!
//! Every stage consumes the previous stage's complete output. Moment
//! validation is a fail-closed gate; block and story reports are returned
//! with the recap.

use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::core::block_validation::validate_blocks;
use crate::core::blocks::assemble_blocks;
use crate::core::config::{ConfigError, PipelineConfig};
use crate::core::guardrail::{Augmentation, Augmenter};
use crate::core::language::ForbiddenLanguage;
use crate::core::llm::{CallPolicy, TextGenerator};
use crate::core::moments::{assemble_moments, AssemblyError};
use crate::core::render::{NarrativeRecord, RenderError, Renderer};
use crate::core::story::{build_story, validate_story};
use crate::core::template::{InjectionTemplates, TemplateError};
use crate::core::validation::{validate_moments, ValidationReport};
use crate::schema::block::Block;
use crate::schema::game::{BoxScore, GameInput};
use crate::schema::moment::Moment;
use crate::schema::story::GameStory;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("assembly error: {0}")]
    Assembly(#[from] AssemblyError),
    #[error("render error: {0}")]
    Render(#[from] RenderError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("template error: {0}")]
    Template(#[from] TemplateError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("moment validation failed with {} errors", .0.errors.len())]
    MomentValidation(ValidationReport),
}

/// Everything one run produces for one game.
#[derive(Debug, Clone)]
pub struct GameRecap {
    pub moments: Vec<Moment>,
    pub story: GameStory,
    pub moment_report: ValidationReport,
    pub block_report: ValidationReport,
    pub story_report: ValidationReport,
    pub narratives: Vec<NarrativeRecord>,
    pub augmentation: Augmentation,
}

impl GameRecap {
    /// The text to show for a moment: an accepted rewrite if there is one,
    /// otherwise the rendered narrative.
    pub fn moment_text(&self, index: usize) -> Option<&str> {
        let rewrite = self
            .augmentation
            .rewrites
            .iter()
            .find(|r| r.moment_index == index && !r.used_fallback);
        match rewrite {
            Some(r) => Some(r.rewritten_summary.as_str()),
            None => self.moments.get(index).and_then(|m| m.narrative.as_deref()),
        }
    }

    /// True when both the block and story reports passed.
    pub fn is_clean(&self) -> bool {
        self.block_report.validated && self.story_report.validated
    }
}

/// The recap pipeline. Built via `RecapPipeline::builder()`.
pub struct RecapPipeline {
    config: PipelineConfig,
    templates: InjectionTemplates,
    language: Option<ForbiddenLanguage>,
}

/// Builder for constructing a `RecapPipeline`.
#[derive(Default)]
pub struct RecapPipelineBuilder {
    config_path: Option<String>,
    templates_path: Option<String>,
    /// Directly provided config (for testing without files).
    config: Option<PipelineConfig>,
    /// Directly provided templates (for testing without files).
    templates: Option<InjectionTemplates>,
    language: Option<ForbiddenLanguage>,
}

impl RecapPipeline {
    pub fn builder() -> RecapPipelineBuilder {
        RecapPipelineBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn language(&self) -> &ForbiddenLanguage {
        self.language
            .as_ref()
            .unwrap_or_else(|| ForbiddenLanguage::standard())
    }

    fn policy(&self) -> CallPolicy {
        CallPolicy {
            timeout: Duration::from_millis(self.config.render.call_timeout_ms),
            retries: self.config.render.call_retries,
        }
    }

    /// Segment and gate. Any moment error aborts the game.
    fn segment(&self, game: &GameInput) -> Result<(Vec<Moment>, ValidationReport), PipelineError> {
        let moments = assemble_moments(&game.plays, &self.config.segmentation)?;
        let report = validate_moments(&moments, &game.plays);
        if !report.validated {
            warn!(
                game_id = %game.info.game_id,
                errors = report.errors.len(),
                "moment validation failed, aborting game"
            );
            return Err(PipelineError::MomentValidation(report));
        }
        Ok((moments, report))
    }

    /// Run with deterministic narratives only. Never calls a generator.
    pub fn run_deterministic(&self, game: &GameInput) -> Result<GameRecap, PipelineError> {
        let (mut moments, moment_report) = self.segment(game)?;
        let narratives = Renderer::new(
            &game.info,
            &game.plays,
            &self.config.render,
            &self.templates,
        )
        .with_language(self.language())
        .render_deterministic(&mut moments)?;

        let chapters = assemble_blocks(
            &moments,
            &game.plays,
            &game.info,
            &self.config.blocks,
            &self.templates,
        );
        let flags = self.config.flags.resolve(&game.info.game_id, game.info.league);
        let augmentation = Augmentation::disabled(flags);
        Ok(self.assemble_recap(game, moments, moment_report, narratives, chapters, augmentation))
    }

    /// Run the full pipeline. Without a generator this matches
    /// `run_deterministic`; with one, narratives are generated and the
    /// enabled augmentations run.
    pub async fn run(
        &self,
        game: &GameInput,
        generator: Option<&dyn TextGenerator>,
    ) -> Result<GameRecap, PipelineError> {
        let Some(generator) = generator else {
            return self.run_deterministic(game);
        };

        let (mut moments, moment_report) = self.segment(game)?;
        let narratives = Renderer::new(
            &game.info,
            &game.plays,
            &self.config.render,
            &self.templates,
        )
        .with_language(self.language())
        .with_generator(generator)
        .render(&mut moments)
        .await?;

        let chapters = assemble_blocks(
            &moments,
            &game.plays,
            &game.info,
            &self.config.blocks,
            &self.templates,
        );
        let flags = self.config.flags.resolve(&game.info.game_id, game.info.league);
        let augmentation = if flags.enable_moment_rewrite || flags.enable_transitions {
            let box_score = game
                .box_score
                .clone()
                .unwrap_or_else(|| BoxScore::from_plays(&game.plays));
            Augmenter::new(&game.info, &box_score, &self.config.guardrail, generator)
                .with_policy(self.policy())
                .with_tone(self.config.tone.effective(&flags))
                .with_language(self.language())
                .augment(flags, &moments, &game.plays, &chapters)
                .await
        } else {
            Augmentation::disabled(flags)
        };

        Ok(self.assemble_recap(game, moments, moment_report, narratives, chapters, augmentation))
    }

    fn assemble_recap(
        &self,
        game: &GameInput,
        moments: Vec<Moment>,
        moment_report: ValidationReport,
        narratives: Vec<NarrativeRecord>,
        chapters: Vec<Block>,
        augmentation: Augmentation,
    ) -> GameRecap {
        let block_report = validate_blocks(&chapters, moments.len(), &self.config.blocks);
        let story = build_story(&game.info, &game.plays, moments.len(), chapters, &narratives);
        let story_report = validate_story(&story, &game.plays);
        info!(
            game_id = %game.info.game_id,
            moments = moments.len(),
            chapters = story.chapters.len(),
            block_errors = block_report.errors.len(),
            block_warnings = block_report.warnings.len(),
            story_errors = story_report.errors.len(),
            "recap finished"
        );
        GameRecap {
            moments,
            story,
            moment_report,
            block_report,
            story_report,
            narratives,
            augmentation,
        }
    }
}

impl RecapPipelineBuilder {
    /// Load a `PipelineConfig` from a RON file at build time.
    pub fn config_path(mut self, path: &str) -> Self {
        self.config_path = Some(path.to_string());
        self
    }

    /// Load `InjectionTemplates` from a RON file at build time.
    pub fn templates_path(mut self, path: &str) -> Self {
        self.templates_path = Some(path.to_string());
        self
    }

    /// Provide config directly (for testing without files).
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Provide templates directly (for testing without files).
    pub fn with_templates(mut self, templates: InjectionTemplates) -> Self {
        self.templates = Some(templates);
        self
    }

    pub fn with_language(mut self, language: ForbiddenLanguage) -> Self {
        self.language = Some(language);
        self
    }

    /// A file path wins over a directly provided value. A missing file is
    /// an error.
    pub fn build(self) -> Result<RecapPipeline, PipelineError> {
        let config = match self.config_path {
            Some(ref path) => PipelineConfig::load_from_ron(Path::new(path))?,
            None => self.config.unwrap_or_default(),
        };
        config.check()?;

        let templates = match self.templates_path {
            Some(ref path) => InjectionTemplates::load_from_ron(Path::new(path))?,
            None => self.templates.unwrap_or_default(),
        };

        Ok(RecapPipeline {
            config,
            templates,
            language: self.language,
        })
    }
}

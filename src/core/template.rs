//! Sentence templates for deterministic narration: types, parsing,
//! loading, and rendering.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;

use crate::core::coverage::ActionKeyword;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template parse error: {0}")]
    Parse(String),
    #[error("unknown action keyword: {0}")]
    UnknownAction(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// A value a template can interpolate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Slot {
    /// Player name, falling back to the team abbreviation.
    Subject,
    Player,
    Team,
    Description,
}

/// A segment of a parsed template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TemplateSegment {
    Literal(String),
    Slot(Slot),
}

/// A parsed template: a sequence of segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub segments: Vec<TemplateSegment>,
}

/// Values available when rendering a template for one play.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlotValues<'a> {
    pub player: Option<&'a str>,
    pub team: Option<&'a str>,
    pub description: Option<&'a str>,
}

impl SlotValues<'_> {
    fn get(&self, slot: Slot) -> Option<&str> {
        match slot {
            Slot::Subject => self.player.or(self.team),
            Slot::Player => self.player,
            Slot::Team => self.team,
            Slot::Description => self.description,
        }
    }
}

impl Template {
    /// Parse a template string.
    ///
    /// Syntax:
    /// - `{subject}`, `{player}`, `{team}`, `{description}` → `Slot`
    /// - `{{` / `}}` → literal braces
    /// - Everything else → `Literal`
    pub fn parse(input: &str) -> Result<Template, TemplateError> {
        let mut segments = Vec::new();
        let mut literal_buf = String::new();
        let chars: Vec<char> = input.chars().collect();
        let len = chars.len();
        let mut i = 0;

        while i < len {
            match chars[i] {
                '{' if i + 1 < len && chars[i + 1] == '{' => {
                    literal_buf.push('{');
                    i += 2;
                }
                '{' => {
                    if !literal_buf.is_empty() {
                        segments.push(TemplateSegment::Literal(std::mem::take(&mut literal_buf)));
                    }
                    let start = i + 1;
                    let mut end = start;
                    while end < len && chars[end] != '}' {
                        if chars[end] == '{' {
                            return Err(TemplateError::Parse(
                                "nested braces are not allowed".to_string(),
                            ));
                        }
                        end += 1;
                    }
                    if end == len {
                        return Err(TemplateError::Parse("unclosed brace".to_string()));
                    }
                    let name: String = chars[start..end].iter().collect();
                    segments.push(TemplateSegment::Slot(Self::parse_slot(&name)?));
                    i = end + 1;
                }
                '}' if i + 1 < len && chars[i + 1] == '}' => {
                    literal_buf.push('}');
                    i += 2;
                }
                '}' => {
                    return Err(TemplateError::Parse(
                        "unmatched closing brace".to_string(),
                    ));
                }
                c => {
                    literal_buf.push(c);
                    i += 1;
                }
            }
        }

        if !literal_buf.is_empty() {
            segments.push(TemplateSegment::Literal(literal_buf));
        }
        Ok(Template { segments })
    }

    fn parse_slot(name: &str) -> Result<Slot, TemplateError> {
        match name.trim() {
            "subject" => Ok(Slot::Subject),
            "player" => Ok(Slot::Player),
            "team" => Ok(Slot::Team),
            "description" => Ok(Slot::Description),
            "" => Err(TemplateError::Parse("empty braces".to_string())),
            other => Err(TemplateError::Parse(format!("unknown slot '{}'", other))),
        }
    }

    /// Render, or `None` when a referenced slot has no value.
    pub fn render(&self, values: &SlotValues<'_>) -> Option<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                TemplateSegment::Literal(text) => out.push_str(text),
                TemplateSegment::Slot(slot) => out.push_str(values.get(*slot)?),
            }
        }
        Some(out)
    }
}

/// Made/missed sentence pair for one action keyword.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionTemplate {
    pub made: Template,
    pub missed: Option<Template>,
}

/// The sentence patterns used for coverage injection and deterministic
/// fallback narratives.
#[derive(Debug, Clone, PartialEq)]
pub struct InjectionTemplates {
    pub actions: HashMap<ActionKeyword, ActionTemplate>,
    pub generic: Template,
}

// RON deserialization helpers. The file format keys actions by their
// keyword text and carries raw template strings.

#[derive(Debug, Deserialize)]
#[serde(rename = "Action")]
struct RonAction {
    made: String,
    #[serde(default)]
    missed: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RonTemplates {
    #[serde(default)]
    actions: BTreeMap<String, RonAction>,
    #[serde(default)]
    generic: Option<String>,
}

const BUILT_IN: &[(ActionKeyword, &str, Option<&str>)] = &[
    (ActionKeyword::Three, "{subject} hit a three.", Some("{subject} missed a three.")),
    (
        ActionKeyword::FreeThrow,
        "{subject} made a free throw.",
        Some("{subject} missed a free throw."),
    ),
    (ActionKeyword::Dunk, "{subject} finished with a dunk.", Some("{subject} missed a dunk.")),
    (ActionKeyword::Layup, "{subject} scored on a layup.", Some("{subject} missed a layup.")),
    (ActionKeyword::Block, "{subject} came up with a block.", None),
    (ActionKeyword::Steal, "{subject} came up with a steal.", None),
    (ActionKeyword::Turnover, "{subject} committed a turnover.", None),
    (ActionKeyword::Rebound, "{subject} grabbed a rebound.", None),
    (ActionKeyword::Foul, "{subject} was called for a foul.", None),
    (ActionKeyword::Assist, "{subject} picked up an assist.", None),
];

const GENERIC: &str = "{subject} was involved in the play.";

impl Default for InjectionTemplates {
    fn default() -> Self {
        let mut actions = HashMap::new();
        for (keyword, made, missed) in BUILT_IN {
            // Built-in strings are well-formed; a failure here is a typo in BUILT_IN.
            if let (Ok(made), Ok(missed)) = (
                Template::parse(made),
                missed.map(Template::parse).transpose(),
            ) {
                actions.insert(*keyword, ActionTemplate { made, missed });
            }
        }
        let generic = Template::parse(GENERIC).unwrap_or(Template {
            segments: vec![
                TemplateSegment::Slot(Slot::Subject),
                TemplateSegment::Literal(" was involved in the play.".to_string()),
            ],
        });
        Self { actions, generic }
    }
}

impl InjectionTemplates {
    pub fn load_from_ron(path: &Path) -> Result<InjectionTemplates, TemplateError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse templates from RON. Entries override the built-in set; actions
    /// not mentioned keep their defaults.
    pub fn parse_ron(input: &str) -> Result<InjectionTemplates, TemplateError> {
        let raw: RonTemplates = ron::from_str(input)?;
        let mut templates = InjectionTemplates::default();

        for (word, action) in raw.actions {
            let keyword = ActionKeyword::from_word(&word)
                .ok_or_else(|| TemplateError::UnknownAction(word.clone()))?;
            templates.actions.insert(
                keyword,
                ActionTemplate {
                    made: Template::parse(&action.made)?,
                    missed: action.missed.as_deref().map(Template::parse).transpose()?,
                },
            );
        }
        if let Some(generic) = raw.generic {
            templates.generic = Template::parse(&generic)?;
        }
        Ok(templates)
    }

    pub fn action(&self, keyword: ActionKeyword) -> Option<&ActionTemplate> {
        self.actions.get(&keyword)
    }
}

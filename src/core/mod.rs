pub mod block_validation;
pub mod blocks;
pub mod boundary;
pub mod classifier;
pub mod config;
pub mod coverage;
pub mod explicit;
pub mod flags;
pub mod guardrail;
pub mod language;
pub mod llm;
pub mod moments;
pub mod pipeline;
pub mod prompt;
pub mod render;
pub mod sentences;
pub mod story;
pub mod synthetic;
pub mod template;
pub mod tone;
pub mod validation;

//! The text-generation seam. The pipeline never depends on a concrete
//! model; it calls a `TextGenerator` through `call_bounded`, which adds a
//! timeout and one bounded retry.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("text generation failed: {0}")]
    Failed(String),
    #[error("text generation timed out after {0:?}")]
    Timeout(Duration),
}

/// Text plus the generator's self-reported confidence in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    pub confidence: f32,
}

impl Generation {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// A single prompt-in, text-out call.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Generation, GenerationError>;

    fn name(&self) -> &str {
        "generator"
    }
}

/// Timeout and retry budget for one logical call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    pub timeout: Duration,
    pub retries: u32,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retries: 1,
        }
    }
}

/// Call `generator`, treating a timeout exactly like any other failure.
/// Confidence is clamped into `[0, 1]`; NaN becomes 0.
pub async fn call_bounded(
    generator: &dyn TextGenerator,
    prompt: &str,
    policy: CallPolicy,
) -> Result<Generation, GenerationError> {
    let mut attempt = 0;
    loop {
        let result = match tokio::time::timeout(policy.timeout, generator.generate(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout(policy.timeout)),
        };
        match result {
            Ok(mut generation) => {
                generation.confidence = if generation.confidence.is_nan() {
                    0.0
                } else {
                    generation.confidence.clamp(0.0, 1.0)
                };
                debug!(
                    generator = generator.name(),
                    attempt,
                    confidence = generation.confidence,
                    "generation succeeded"
                );
                return Ok(generation);
            }
            Err(err) if attempt < policy.retries => {
                warn!(generator = generator.name(), attempt, error = %err, "generation failed, retrying");
                attempt += 1;
            }
            Err(err) => {
                warn!(generator = generator.name(), attempt, error = %err, "generation failed");
                return Err(err);
            }
        }
    }
}

//! Public request/response shapes, independent of any transport.

use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;

const DEFAULT_MAX_TOKENS: NonZeroU32 = match NonZeroU32::new(1000) {
    Some(n) => n,
    None => unreachable!(),
};

fn default_max_tokens() -> NonZeroU32 {
    DEFAULT_MAX_TOKENS
}

fn default_temperature() -> f64 {
    0.7
}

/// A single generation request.
///
/// Cache identity is exactly `(prompt, context, max_tokens, temperature)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub context: String,
    /// Upper bound on generated tokens. Zero is rejected on decode.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: NonZeroU32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            context: context.into(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: NonZeroU32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Successful pipeline outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub response: String,
    pub cached: bool,
}

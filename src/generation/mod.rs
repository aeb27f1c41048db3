//! Generation backend abstraction.
//!
//! The pipeline treats generation as an opaque async call. Retries, timeouts
//! and cancellation belong to the [`Generator`] implementation, not to the
//! orchestrator.

mod http;

pub use http::HttpGenerator;

use crate::types::GenerationRequest;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation backend unavailable: {0}")]
    Backend(String),

    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("generation backend returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed generation response: {0}")]
    Decode(String),
}

/// Produces text for a request.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;

    fn name(&self) -> &str {
        "generator"
    }
}

fn default_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_model() -> String {
    "mistralai/Mistral-7B-Instruct-v0.1".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

/// Connection settings for the HTTP generation backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Base URL; requests go to `{url}/generate`.
    #[serde(default = "default_url")]
    pub url: String,
    /// Model served by the backend; used for logging.
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// The text sent to the model: context, a blank line, then the prompt.
pub fn compose_input(request: &GenerationRequest) -> String {
    if request.context.is_empty() {
        request.prompt.clone()
    } else {
        format!("{}\n\n{}", request.context, request.prompt)
    }
}

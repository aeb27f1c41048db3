//! HTTP text-generation backend client.

use super::{compose_input, GenerationConfig, GenerationError, Generator};
use crate::error::{Error, ErrorContext};
use crate::types::GenerationRequest;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Calls `POST {url}/generate` on a text-generation server.
///
/// Request body: `{"inputs", "parameters": {"max_new_tokens", "temperature"}}`.
/// Both the single-object and the list form of `generated_text` responses
/// are accepted.
#[derive(Debug, Clone)]
pub struct HttpGenerator {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct GeneratedText {
    generated_text: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GenerateResponse {
    Single(GeneratedText),
    Batch(Vec<GeneratedText>),
}

impl HttpGenerator {
    pub fn new(config: &GenerationConfig) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| {
                Error::configuration_with_context(
                    "failed to build generation HTTP client",
                    ErrorContext::new()
                        .with_details(e.to_string())
                        .with_source("http_generator"),
                )
            })?;
        Ok(Self {
            client,
            endpoint: format!("{}/generate", config.url.trim_end_matches('/')),
            model: config.model.clone(),
            timeout: config.timeout(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn map_transport(&self, e: reqwest::Error) -> GenerationError {
        if e.is_timeout() {
            GenerationError::Timeout(self.timeout)
        } else {
            GenerationError::Backend(e.to_string())
        }
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let body = json!({
            "inputs": compose_input(request),
            "parameters": {
                "max_new_tokens": request.max_tokens,
                "temperature": request.temperature,
                "return_full_text": false,
            }
        });

        debug!(endpoint = %self.endpoint, model = %self.model, "calling generation backend");
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = resp.bytes().await.map_err(|e| self.map_transport(e))?;
        let parsed: GenerateResponse =
            serde_json::from_slice(&bytes).map_err(|e| GenerationError::Decode(e.to_string()))?;
        match parsed {
            GenerateResponse::Single(g) => Ok(g.generated_text),
            GenerateResponse::Batch(list) => list
                .into_iter()
                .next()
                .map(|g| g.generated_text)
                .ok_or_else(|| GenerationError::Decode("empty generation list".into())),
        }
    }

    fn name(&self) -> &str {
        &self.model
    }
}

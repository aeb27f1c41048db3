//! Validation rule configuration

use crate::error::{Error, ErrorContext};
use crate::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};

fn default_min_length() -> usize {
    10
}

fn default_max_length() -> usize {
    4000
}

fn default_toxicity_threshold() -> f64 {
    0.8
}

/// Serializable rule configuration, as found in the service config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_min_length")]
    pub min_length: usize,
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    /// Each pattern must match somewhere in the response.
    #[serde(default)]
    pub required_patterns: Vec<String>,
    /// No pattern may match anywhere in the response.
    #[serde(default)]
    pub forbidden_patterns: Vec<String>,
    /// Reserved for an external toxicity scorer; carried but not enforced here.
    #[serde(default = "default_toxicity_threshold")]
    pub toxicity_threshold: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_length: default_min_length(),
            max_length: default_max_length(),
            required_patterns: Vec::new(),
            forbidden_patterns: Vec::new(),
            toxicity_threshold: default_toxicity_threshold(),
        }
    }
}

/// Compiled, immutable rule set.
#[derive(Debug, Clone)]
pub struct ValidationRules {
    min_length: usize,
    max_length: usize,
    required: Vec<Regex>,
    forbidden: Vec<Regex>,
    toxicity_threshold: f64,
}

impl ValidationRules {
    pub fn builder() -> ValidationRulesBuilder {
        ValidationRulesBuilder::new()
    }

    /// Compile a configuration. Fails on inverted length bounds or an invalid pattern.
    pub fn from_config(config: &ValidationConfig) -> Result<Self> {
        if config.min_length > config.max_length {
            return Err(Error::configuration_with_context(
                "min_length must not exceed max_length",
                ErrorContext::new()
                    .with_field_path("validation.min_length")
                    .with_details(format!(
                        "min_length={}, max_length={}",
                        config.min_length, config.max_length
                    ))
                    .with_source("validation_rules"),
            ));
        }

        Ok(Self {
            min_length: config.min_length,
            max_length: config.max_length,
            required: compile_all(&config.required_patterns, "validation.required_patterns")?,
            forbidden: compile_all(&config.forbidden_patterns, "validation.forbidden_patterns")?,
            toxicity_threshold: config.toxicity_threshold,
        })
    }

    pub fn min_length(&self) -> usize {
        self.min_length
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Required patterns, in configured order
    pub fn required_patterns(&self) -> impl Iterator<Item = &Regex> {
        self.required.iter()
    }

    /// Forbidden patterns, in configured order
    pub fn forbidden_patterns(&self) -> impl Iterator<Item = &Regex> {
        self.forbidden.iter()
    }

    pub fn toxicity_threshold(&self) -> f64 {
        self.toxicity_threshold
    }
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            min_length: default_min_length(),
            max_length: default_max_length(),
            required: Vec::new(),
            forbidden: Vec::new(),
            toxicity_threshold: default_toxicity_threshold(),
        }
    }
}

fn compile_all(patterns: &[String], field: &str) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .enumerate()
        .map(|(i, p)| {
            Regex::new(p).map_err(|e| {
                Error::configuration_with_context(
                    format!("invalid pattern '{}'", p),
                    ErrorContext::new()
                        .with_field_path(format!("{}[{}]", field, i))
                        .with_details(e.to_string())
                        .with_source("validation_rules"),
                )
            })
        })
        .collect()
}

/// Builder for [`ValidationRules`]
#[derive(Debug, Clone, Default)]
pub struct ValidationRulesBuilder {
    config: ValidationConfig,
}

impl ValidationRulesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min_length(mut self, min: usize) -> Self {
        self.config.min_length = min;
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        self.config.max_length = max;
        self
    }

    pub fn require_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.required_patterns.push(pattern.into());
        self
    }

    pub fn forbid_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.forbidden_patterns.push(pattern.into());
        self
    }

    pub fn toxicity_threshold(mut self, threshold: f64) -> Self {
        self.config.toxicity_threshold = threshold;
        self
    }

    pub fn build(self) -> Result<ValidationRules> {
        ValidationRules::from_config(&self.config)
    }
}

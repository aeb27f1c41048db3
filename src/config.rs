//! Service configuration.
//!
//! Built once at startup: an optional YAML file, then environment overrides,
//! then [`ServiceConfig::validate`]. The resulting value is passed explicitly to
//! the components that need it.
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `VALID_API_KEYS` | `auth.api_keys` (comma-separated) |
//! | `REDIS_URL` | `cache.url` |
//! | `CACHE_TTL_SECONDS` | `cache.ttl_seconds` |
//! | `MODEL_NAME` | `generation.model` |
//! | `GENERATION_URL` | `generation.url` |
//! | `BIND_ADDR` | `server.bind_addr` |

use crate::auth::AuthConfig;
use crate::cache::CacheConfig;
use crate::error::{Error, ErrorContext};
use crate::generation::GenerationConfig;
use crate::validation::{ValidationConfig, ValidationRules};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

fn default_service_name() -> String {
    "model-service".to_string()
}

fn default_cache_url() -> String {
    "memory://".to_string()
}

fn default_ttl_seconds() -> u64 {
    3600
}

fn default_max_entries() -> usize {
    10_000
}

fn default_timeout_ms() -> u64 {
    500
}

fn default_max_entry_size() -> usize {
    10 * 1024 * 1024
}

fn default_key_prefix() -> String {
    "model_response".to_string()
}

fn default_enabled() -> bool {
    true
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

/// Cache section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Store connection string: `memory://`, `redis://host:port/db` or `none`.
    #[serde(default = "default_cache_url")]
    pub url: String,
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
    /// Entry bound for the in-memory store.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_max_entry_size")]
    pub max_entry_size: usize,
    /// Per-call deadline for the store; slower calls are treated as a miss.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Namespace tag in front of every cache key.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            url: default_cache_url(),
            ttl_seconds: default_ttl_seconds(),
            max_entries: default_max_entries(),
            max_entry_size: default_max_entry_size(),
            timeout_ms: default_timeout_ms(),
            enabled: default_enabled(),
            key_prefix: default_key_prefix(),
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn to_cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .with_ttl(self.ttl())
            .with_enabled(self.enabled)
            .with_max_entry_size(self.max_entry_size)
            .with_op_timeout(Duration::from_millis(self.timeout_ms))
    }
}

/// Transport section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

/// Complete service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub server: ServerSettings,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            auth: AuthConfig::default(),
            cache: CacheSettings::default(),
            validation: ValidationConfig::default(),
            generation: GenerationConfig::default(),
            server: ServerSettings::default(),
        }
    }
}

impl ServiceConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    /// File (if given) → process environment → validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env_from(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(keys) = lookup("VALID_API_KEYS") {
            self.auth = AuthConfig::from_comma_separated(&keys);
        }
        if let Some(url) = lookup("REDIS_URL") {
            self.cache.url = url;
        }
        if let Some(ttl) = lookup("CACHE_TTL_SECONDS") {
            self.cache.ttl_seconds = ttl.trim().parse().map_err(|_| {
                Error::configuration_with_context(
                    "CACHE_TTL_SECONDS must be a whole number of seconds",
                    ErrorContext::new()
                        .with_field_path("cache.ttl_seconds")
                        .with_details(ttl.clone())
                        .with_source("environment"),
                )
            })?;
        }
        if let Some(model) = lookup("MODEL_NAME") {
            self.generation.model = model;
        }
        if let Some(url) = lookup("GENERATION_URL") {
            self.generation.url = url;
        }
        if let Some(addr) = lookup("BIND_ADDR") {
            self.server.bind_addr = addr;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        ValidationRules::from_config(&self.validation)?;

        if self.cache.ttl_seconds == 0 {
            return Err(field_error("cache.ttl_seconds", "ttl must be positive", "0"));
        }
        if self.cache.max_entries == 0 {
            return Err(field_error("cache.max_entries", "max_entries must be positive", "0"));
        }
        if self.cache.timeout_ms == 0 {
            return Err(field_error("cache.timeout_ms", "timeout must be positive", "0"));
        }
        if let Err(e) = url::Url::parse(&self.generation.url) {
            return Err(field_error(
                "generation.url",
                "invalid generation backend url",
                e.to_string(),
            ));
        }
        if let Err(e) = self.server.bind_addr.parse::<SocketAddr>() {
            return Err(field_error(
                "server.bind_addr",
                "invalid bind address",
                e.to_string(),
            ));
        }
        Ok(())
    }
}

fn field_error(field: &str, message: &str, details: impl Into<String>) -> Error {
    Error::configuration_with_context(
        message,
        ErrorContext::new()
            .with_field_path(field)
            .with_details(details)
            .with_source("config_loader"),
    )
}

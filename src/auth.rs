//! API-key authentication.
//!
//! The allow-set is an explicit [`AuthConfig`] built once at startup and handed
//! to [`ApiKeyAuthenticator`]; nothing is read from the environment lazily.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing API key")]
    MissingCredential,
    #[error("invalid API key")]
    InvalidCredential,
}

/// An authenticated caller.
///
/// Identified by a short fingerprint of its key so logs never carry the key itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal {
    pub id: String,
}

impl Principal {
    fn from_key(key: &str) -> Self {
        let digest = Sha256::digest(key.as_bytes());
        let hex = format!("{:x}", digest);
        Self {
            id: format!("key:{}", &hex[..12]),
        }
    }
}

/// Verifies a caller credential.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, credential: Option<&str>) -> Result<Principal, AuthError>;
}

/// Allowed API keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub api_keys: Vec<String>,
}

impl AuthConfig {
    /// Parse a comma-separated key list, trimming whitespace and dropping empty entries.
    pub fn from_comma_separated(raw: &str) -> Self {
        Self {
            api_keys: raw
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from)
                .collect(),
        }
    }
}

/// Authenticates against a fixed allow-set. An empty allow-set admits nobody.
#[derive(Debug, Clone)]
pub struct ApiKeyAuthenticator {
    keys: HashSet<String>,
}

impl ApiKeyAuthenticator {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            keys: config
                .api_keys
                .iter()
                .map(|k| k.trim())
                .filter(|k| !k.is_empty())
                .map(String::from)
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Authenticator for ApiKeyAuthenticator {
    fn authenticate(&self, credential: Option<&str>) -> Result<Principal, AuthError> {
        let key = credential
            .filter(|k| !k.is_empty())
            .ok_or(AuthError::MissingCredential)?;
        if self.keys.contains(key) {
            Ok(Principal::from_key(key))
        } else {
            Err(AuthError::InvalidCredential)
        }
    }
}

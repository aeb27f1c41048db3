//! Cache key derivation.

use crate::types::GenerationRequest;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Opaque, fixed-length cache key: `<namespace>:v<scheme>:<sha256 hex>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    key: String,
}

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Scalar generation parameter participating in a cache key.
///
/// Nested values are not representable, which keeps the canonical form flat.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    /// Canonical form: `-0.0` folds into `0.0`. Non-finite floats have no JSON
    /// form and would all collide on `null`, so callers must not pass them.
    fn canonical(self) -> Self {
        match self {
            ParamValue::Float(v) => {
                debug_assert!(v.is_finite(), "non-finite float in cache key params");
                ParamValue::Float(if v == 0.0 { 0.0 } else { v })
            }
            other => other,
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        ParamValue::Int(i64::from(v))
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

/// Derives deterministic cache keys.
///
/// The canonical object `{prompt, context, **params}` is serialized as JSON with
/// lexicographically sorted keys (floats use the shortest round-trip decimal
/// form, independent of locale), hashed with SHA-256 and prefixed with the
/// namespace and the scheme version. Bump [`KeyDeriver::SCHEME_VERSION`] whenever
/// the canonical form changes so old entries stop matching instead of being
/// served under new semantics.
#[derive(Debug, Clone)]
pub struct KeyDeriver {
    namespace: String,
}

impl KeyDeriver {
    pub const DEFAULT_NAMESPACE: &'static str = "model_response";
    pub const SCHEME_VERSION: u8 = 1;

    pub fn new() -> Self {
        Self {
            namespace: Self::DEFAULT_NAMESPACE.to_string(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Derive a key from prompt, context and scalar params.
    ///
    /// `prompt` and `context` are reserved names; params must not use them.
    pub fn derive<I, K, V>(&self, prompt: &str, context: &str, params: I) -> CacheKey
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ParamValue>,
    {
        let mut canonical: BTreeMap<String, ParamValue> = params
            .into_iter()
            .map(|(k, v)| (k.into(), v.into().canonical()))
            .collect();
        debug_assert!(
            !canonical.contains_key("prompt") && !canonical.contains_key("context"),
            "`prompt` and `context` are reserved cache key fields"
        );
        canonical.insert("prompt".into(), ParamValue::Str(prompt.to_string()));
        canonical.insert("context".into(), ParamValue::Str(context.to_string()));

        // BTreeMap serializes in key order; a flat map of scalars cannot fail.
        let serialized = serde_json::to_vec(&canonical).unwrap_or_default();
        let digest = Sha256::digest(&serialized);
        CacheKey::new(format!(
            "{}:v{}:{:x}",
            self.namespace,
            Self::SCHEME_VERSION,
            digest
        ))
    }

    /// Derive the key for a request from its cache-relevant fields only.
    pub fn derive_request(&self, request: &GenerationRequest) -> CacheKey {
        self.derive(
            &request.prompt,
            &request.context,
            [
                ("max_tokens", ParamValue::from(request.max_tokens.get())),
                ("temperature", ParamValue::from(request.temperature)),
            ],
        )
    }
}

impl Default for KeyDeriver {
    fn default() -> Self {
        Self::new()
    }
}

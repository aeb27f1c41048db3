//! 响应缓存模块：确定性缓存键、可插拔存储与失败开放的响应缓存。
//!
//! # Response Caching Module
//!
//! Caches validated generation results so identical requests skip the backend.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`KeyDeriver`] | Deterministic SHA-256 cache keys from (prompt, context, params) |
//! | [`ResponseCache`] | Fail-open get/set over a store, with TTL and statistics |
//! | [`CacheStore`] | Trait for key-value stores with per-entry TTL |
//! | [`MemoryStore`] | In-process LRU store with clock-driven expiry |
//! | [`NullStore`] | No-op store for disabling caching |
//! | `RedisStore` | Redis-compatible shared store (`redis` feature) |
//!
//! ## Failure policy
//!
//! The cache is never a source of correctness. Store failures are logged at
//! warn level and degrade to a miss on read and a no-op on write.
//!
//! ## Example
//!
//! ```rust
//! use ai_lib_serve::cache::{CacheConfig, KeyDeriver, MemoryStore, ResponseCache};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let cache = ResponseCache::new(CacheConfig::default(), Arc::new(MemoryStore::new(1000)));
//! let key = KeyDeriver::new().derive("Summarize X", "", [("max_tokens", 50u32)]);
//! cache.set(&key, "A brief valid summary.").await;
//! assert_eq!(cache.get(&key).await.as_deref(), Some("A brief valid summary."));
//! # }
//! ```

mod backend;
mod clock;
mod key;
mod manager;
#[cfg(feature = "redis")]
mod redis_store;

pub use backend::{CacheStore, MemoryStore, NullStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use key::{CacheKey, KeyDeriver, ParamValue};
pub use manager::{CacheConfig, CacheStats, ResponseCache};
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;

use std::sync::Arc;
use thiserror::Error;

/// Cache store failures. Never surfaced to request callers.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid cache store url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("cache store scheme '{0}' is not supported by this build")]
    UnsupportedScheme(String),
}

/// Open a store from a connection string.
///
/// | Connection string | Store |
/// |-------------------|-------|
/// | `""`, `none` | [`NullStore`] |
/// | `memory://` | [`MemoryStore`] bounded to `max_entries` |
/// | `redis://…`, `rediss://…` | `RedisStore` (requires the `redis` feature) |
pub fn open_store(url: &str, max_entries: usize) -> Result<Arc<dyn CacheStore>, CacheError> {
    let trimmed = url.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        return Ok(Arc::new(NullStore::new()));
    }

    let parsed = url::Url::parse(trimmed).map_err(|e| CacheError::InvalidUrl {
        url: trimmed.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "memory" => Ok(Arc::new(MemoryStore::new(max_entries))),
        #[cfg(feature = "redis")]
        "redis" | "rediss" => Ok(Arc::new(RedisStore::new(trimmed)?)),
        other => Err(CacheError::UnsupportedScheme(other.to_string())),
    }
}

//! Fail-open response cache.

use super::backend::CacheStore;
use super::key::CacheKey;
use super::CacheError;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub default_ttl: Duration,
    pub enabled: bool,
    /// Responses larger than this (bytes) are not cached.
    pub max_entry_size: usize,
    /// Upper bound on a single store call; a slower store counts as unavailable.
    pub op_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(3600),
            enabled: true,
            max_entry_size: 10 * 1024 * 1024,
            op_timeout: Duration::from_millis(500),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_max_entry_size(mut self, bytes: usize) -> Self {
        self.max_entry_size = bytes;
        self
    }

    pub fn with_op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub errors: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct AtomicStats {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    errors: AtomicU64,
}

impl AtomicStats {
    fn to_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Response cache over a [`CacheStore`].
///
/// Neither operation can fail: a store error on `get` is reported as a miss
/// and a store error on `set` is dropped, both logged at warn level. Every
/// store call is bounded by [`CacheConfig::op_timeout`] and an elapsed call
/// is handled like any other store error. There is
/// no cross-request locking; concurrent writers to one key race and the last
/// write wins.
pub struct ResponseCache {
    config: CacheConfig,
    store: Arc<dyn CacheStore>,
    stats: AtomicStats,
}

impl ResponseCache {
    pub fn new(config: CacheConfig, store: Arc<dyn CacheStore>) -> Self {
        Self {
            config,
            store,
            stats: AtomicStats::default(),
        }
    }

    async fn bounded<T>(
        &self,
        op: impl Future<Output = Result<T, CacheError>>,
    ) -> Result<T, CacheError> {
        match tokio::time::timeout(self.config.op_timeout, op).await {
            Ok(res) => res,
            Err(_) => Err(CacheError::Unavailable(format!(
                "store did not respond within {:?}",
                self.config.op_timeout
            ))),
        }
    }

    /// Cached text for `key`, or `None` when absent, expired, or the store is unavailable.
    pub async fn get(&self, key: &CacheKey) -> Option<String> {
        if !self.config.enabled {
            return None;
        }
        match self.bounded(self.store.get(key)).await {
            Ok(Some(data)) => match String::from_utf8(data) {
                Ok(text) => {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(store = self.store.name(), "cache hit");
                    Some(text)
                }
                Err(_) => {
                    self.stats.errors.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        store = self.store.name(),
                        "cached value is not valid UTF-8; treating as miss"
                    );
                    None
                }
            },
            Ok(None) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                debug!(store = self.store.name(), "cache miss");
                None
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                warn!(store = self.store.name(), error = %e, "cache read failed; treating as miss");
                None
            }
        }
    }

    /// Store `value` under `key` with the configured default ttl.
    pub async fn set(&self, key: &CacheKey, value: &str) {
        self.set_with_ttl(key, value, self.config.default_ttl).await
    }

    /// Best-effort write; replaces any existing entry and restarts its ttl.
    pub async fn set_with_ttl(&self, key: &CacheKey, value: &str, ttl: Duration) {
        if !self.config.enabled || ttl.is_zero() {
            return;
        }
        if value.len() > self.config.max_entry_size {
            debug!(
                size = value.len(),
                max = self.config.max_entry_size,
                "response exceeds max cache entry size; not cached"
            );
            return;
        }
        match self
            .bounded(self.store.set_with_ttl(key, value.as_bytes(), ttl))
            .await
        {
            Ok(()) => {
                self.stats.sets.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                warn!(store = self.store.name(), error = %e, "cache write failed; response not cached");
            }
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.config.default_ttl
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.to_stats()
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }
}

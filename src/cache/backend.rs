//! Cache store implementations.

use super::clock::{Clock, SystemClock};
use super::key::CacheKey;
use super::CacheError;
use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Key-value store with per-entry time-to-live.
///
/// Implementations enforce expiry themselves: a `get` after the ttl has
/// elapsed must report absent. A `set_with_ttl` on an existing key replaces
/// the value and restarts its ttl.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError>;
    async fn set_with_ttl(&self, key: &CacheKey, value: &[u8], ttl: Duration)
        -> Result<(), CacheError>;
    fn name(&self) -> &'static str;
}

struct StoreEntry {
    data: Vec<u8>,
    stored_at: Instant,
    ttl: Duration,
}

impl StoreEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) >= self.ttl
    }
}

struct Entries {
    lru: LruCache<String, StoreEntry>,
    /// Never later than the earliest expiry among `lru`.
    next_expiry: Option<Instant>,
}

impl Entries {
    fn purge_expired(&mut self, now: Instant) {
        if self.next_expiry.map_or(true, |at| now < at) {
            return;
        }
        let expired: Vec<String> = self
            .lru
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for k in expired {
            self.lru.pop(&k);
        }
        self.next_expiry = self
            .lru
            .iter()
            .filter_map(|(_, e)| e.stored_at.checked_add(e.ttl))
            .min();
    }
}

/// In-process store bounded to `max_entries`, evicting the least recently
/// used entry once full. Expired entries are dropped on read and purged
/// before any eviction; the purge scan only runs once something can have
/// expired.
pub struct MemoryStore {
    entries: Mutex<Entries>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(max_entries: usize) -> Self {
        Self::with_clock(max_entries, Arc::new(SystemClock))
    }

    pub fn with_clock(max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        let cap = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(Entries {
                lru: LruCache::new(cap),
                next_expiry: None,
            }),
            clock,
        }
    }

    /// Number of unexpired entries.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        match self.entries.lock() {
            Ok(entries) => entries.lru.iter().filter(|(_, e)| !e.is_expired(now)).count(),
            Err(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, Entries>, CacheError> {
        self.entries
            .lock()
            .map_err(|_| CacheError::Unavailable("memory store lock poisoned".into()))
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        let now = self.clock.now();
        let mut entries = self.lock()?;
        let expired = match entries.lru.get(key.as_str()) {
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.data.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.lru.pop(key.as_str());
        }
        Ok(None)
    }

    async fn set_with_ttl(
        &self,
        key: &CacheKey,
        value: &[u8],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let now = self.clock.now();
        let mut entries = self.lock()?;
        if entries.lru.len() >= entries.lru.cap().get() && !entries.lru.contains(key.as_str()) {
            entries.purge_expired(now);
        }
        if let Some(at) = now.checked_add(ttl) {
            entries.next_expiry = Some(entries.next_expiry.map_or(at, |cur| cur.min(at)));
        }
        entries.lru.put(
            key.as_str().to_string(),
            StoreEntry {
                data: value.to_vec(),
                stored_at: now,
                ttl,
            },
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Store that never holds anything; disables caching.
pub struct NullStore;

impl NullStore {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NullStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for NullStore {
    async fn get(&self, _: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(None)
    }

    async fn set_with_ttl(&self, _: &CacheKey, _: &[u8], _: Duration) -> Result<(), CacheError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

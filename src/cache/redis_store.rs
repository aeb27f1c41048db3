//! Redis-compatible cache store.

use super::backend::CacheStore;
use super::key::CacheKey;
use super::CacheError;
use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;

/// Shared store backed by Redis (or Valkey). Expiry uses `SET … EX`.
///
/// Connections are opened per operation, so a restarted server is picked up
/// without intervention. Calls carry no deadline of their own;
/// [`ResponseCache`](super::ResponseCache) bounds each one.
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
}

impl RedisStore {
    /// Parse the connection string. No connection is made until first use.
    pub fn new(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(|e| CacheError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, CacheError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CacheError::Unavailable(format!("connection failed: {e}")))
    }
}

/// `EX` has second granularity and rejects 0, so partial seconds round up.
fn expiry_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    secs.max(1)
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.connection().await?;
        conn.get(key.as_str())
            .await
            .map_err(|e| CacheError::Unavailable(format!("GET failed: {e}")))
    }

    async fn set_with_ttl(
        &self,
        key: &CacheKey,
        value: &[u8],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let _: () = conn
            .set_ex(key.as_str(), value, expiry_secs(ttl))
            .await
            .map_err(|e| CacheError::Unavailable(format!("SET failed: {e}")))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_url() {
        assert!(matches!(
            RedisStore::new("http://not-redis"),
            Err(CacheError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_expiry_rounds_partial_seconds_up() {
        assert_eq!(expiry_secs(Duration::from_millis(1900)), 2);
        assert_eq!(expiry_secs(Duration::from_millis(200)), 1);
        assert_eq!(expiry_secs(Duration::from_secs(3)), 3);
        assert_eq!(expiry_secs(Duration::ZERO), 1);
    }

    #[tokio::test]
    async fn test_unreachable_server_reports_unavailable() {
        // Port 1 is reserved and refuses connections.
        let store = RedisStore::new("redis://127.0.0.1:1/").unwrap();
        let res = store.get(&CacheKey::new("k")).await;
        assert!(matches!(res, Err(CacheError::Unavailable(_))));
    }
}

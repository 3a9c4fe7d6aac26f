//! Redis access for the showcase services
//!
//! Redis is optional. When configured it backs the distributed vote lock:
//! ownership tokens are written with `SET NX PX` and only removed by the
//! holder that wrote them.

use anyhow::Result;
use redis::{Client, Script};
use tracing::info;

/// Delete `KEYS[1]` only while it still holds `ARGV[1]`
const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Configuration for Redis connection
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379"); unset disables Redis
    pub url: Option<String>,
}

impl RedisConfig {
    /// Create a new RedisConfig from environment variables
    ///
    /// # Environment Variables
    /// - `REDIS_URL`: Redis connection URL (optional)
    pub fn from_env() -> Result<Self> {
        let url = std::env::var("REDIS_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        Ok(RedisConfig { url })
    }
}

/// Shared Redis client handing out multiplexed connections
#[derive(Clone)]
pub struct RedisPool {
    client: Client,
}

impl RedisPool {
    /// Initialize a new Redis client for `url`
    pub async fn new(url: &str) -> Result<Self> {
        let client = Client::open(url)?;
        info!("Redis client initialized with URL: {}", url);
        Ok(RedisPool { client })
    }

    /// Get a connection from the pool
    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        let conn = self.client.get_multiplexed_async_connection().await?;
        Ok(conn)
    }

    /// Write `owner` under `key` unless the key exists; expires after `ttl_ms`
    pub async fn try_lock(&self, key: &str, owner: &str, ttl_ms: u64) -> Result<bool> {
        let mut conn = self.get_connection().await?;
        let acquired: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(owner)
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await?;
        Ok(acquired.is_some())
    }

    /// Remove `key` if it is still held by `owner`; returns whether it was removed
    pub async fn unlock(&self, key: &str, owner: &str) -> Result<bool> {
        let mut conn = self.get_connection().await?;
        let removed: i64 = Script::new(RELEASE_SCRIPT)
            .key(key)
            .arg(owner)
            .invoke_async(&mut conn)
            .await?;
        Ok(removed == 1)
    }

    /// Check if Redis is reachable
    pub async fn health_check(&self) -> Result<bool> {
        let mut conn = self.get_connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong == "PONG")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const REDIS_URL: &str = "redis://localhost:6379";

    #[test]
    #[serial]
    fn blank_redis_url_disables_redis() {
        // SAFETY: serialized with the other env-mutating tests
        unsafe { std::env::set_var("REDIS_URL", "  ") };
        assert!(RedisConfig::from_env().unwrap().url.is_none());
        unsafe { std::env::remove_var("REDIS_URL") };
        assert!(RedisConfig::from_env().unwrap().url.is_none());
    }

    #[tokio::test]
    #[ignore = "requires a running Redis"]
    async fn test_redis_connection() -> Result<()> {
        let pool = RedisPool::new(REDIS_URL).await?;
        assert!(pool.health_check().await?);
        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires a running Redis"]
    async fn test_lock_is_exclusive_and_owned() -> Result<()> {
        let pool = RedisPool::new(REDIS_URL).await?;
        let key = "test_lock";

        assert!(pool.try_lock(key, "first", 5_000).await?);
        assert!(!pool.try_lock(key, "second", 5_000).await?);

        // Only the holder may release
        assert!(!pool.unlock(key, "second").await?);
        assert!(pool.unlock(key, "first").await?);
        assert!(pool.try_lock(key, "second", 5_000).await?);
        pool.unlock(key, "second").await?;

        Ok(())
    }
}

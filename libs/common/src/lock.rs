//! Keyed mutual exclusion
//!
//! Serializes check-then-act sequences (the vote toggle) per key. The local
//! implementation covers a single process; the Redis implementation covers
//! every instance sharing the same Redis.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::RedisPool;

/// Lock failures
#[derive(Error, Debug)]
pub enum LockError {
    #[error("timed out waiting for lock {key}")]
    Timeout { key: String },

    #[error("lock backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Proof of holding a key; the local slot is freed when dropped
#[derive(Debug)]
pub struct LockGuard {
    key: String,
    owner: Uuid,
    local: Option<OwnedMutexGuard<()>>,
}

impl LockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Exclusive access per key
#[async_trait]
pub trait KeyedLock: Send + Sync {
    /// Wait until `key` is free and take it
    async fn acquire(&self, key: &str) -> Result<LockGuard, LockError>;

    /// Give `guard` back; also released on expiry or drop
    async fn release(&self, guard: LockGuard) -> Result<(), LockError>;
}

/// Configuration for keyed locks
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// Lifetime of a Redis lock in milliseconds
    pub ttl_ms: u64,
    /// How long to wait for a lock in milliseconds
    pub wait_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 5_000,
            wait_ms: 2_000,
        }
    }
}

impl LockConfig {
    /// Create a new LockConfig from environment variables
    ///
    /// # Environment Variables
    /// - `VOTE_LOCK_TTL_MS`: Lock lifetime (default: 5000)
    /// - `VOTE_LOCK_WAIT_MS`: Maximum wait for a lock (default: 2000)
    pub fn from_env() -> Result<Self> {
        let ttl_ms = std::env::var("VOTE_LOCK_TTL_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .unwrap_or(5_000);
        let wait_ms = std::env::var("VOTE_LOCK_WAIT_MS")
            .unwrap_or_else(|_| "2000".to_string())
            .parse()
            .unwrap_or(2_000);

        Ok(LockConfig { ttl_ms, wait_ms })
    }
}

/// In-process keyed lock
#[derive(Debug, Clone)]
pub struct LocalLock {
    slots: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
    wait: Duration,
}

impl LocalLock {
    pub fn new(config: &LockConfig) -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            wait: Duration::from_millis(config.wait_ms),
        }
    }

    /// Number of keys currently tracked
    pub async fn tracked(&self) -> usize {
        self.slots.lock().await.len()
    }
}

#[async_trait]
impl KeyedLock for LocalLock {
    async fn acquire(&self, key: &str) -> Result<LockGuard, LockError> {
        let slot = {
            let mut slots = self.slots.lock().await;
            // Sweep slots left behind by guards dropped without a release
            slots.retain(|held, slot| held == key || Arc::strong_count(slot) > 1);
            slots.entry(key.to_string()).or_default().clone()
        };

        let guard = tokio::time::timeout(self.wait, slot.lock_owned())
            .await
            .map_err(|_| LockError::Timeout {
                key: key.to_string(),
            })?;

        Ok(LockGuard {
            key: key.to_string(),
            owner: Uuid::new_v4(),
            local: Some(guard),
        })
    }

    async fn release(&self, mut guard: LockGuard) -> Result<(), LockError> {
        drop(guard.local.take());

        // Forget the slot once nobody holds or awaits it
        let mut slots = self.slots.lock().await;
        if slots
            .get(&guard.key)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(&guard.key);
        }
        Ok(())
    }
}

/// Keyed lock shared through Redis
#[derive(Clone)]
pub struct RedisLock {
    pool: RedisPool,
    ttl_ms: u64,
    wait: Duration,
}

impl RedisLock {
    const RETRY_DELAY: Duration = Duration::from_millis(25);

    pub fn new(pool: RedisPool, config: &LockConfig) -> Self {
        Self {
            pool,
            ttl_ms: config.ttl_ms,
            wait: Duration::from_millis(config.wait_ms),
        }
    }
}

#[async_trait]
impl KeyedLock for RedisLock {
    async fn acquire(&self, key: &str) -> Result<LockGuard, LockError> {
        let owner = Uuid::new_v4();
        let deadline = Instant::now() + self.wait;
        let redis_key = format!("lock:{key}");

        loop {
            if self
                .pool
                .try_lock(&redis_key, &owner.to_string(), self.ttl_ms)
                .await?
            {
                debug!("Acquired lock {}", key);
                return Ok(LockGuard {
                    key: key.to_string(),
                    owner,
                    local: None,
                });
            }
            if Instant::now() >= deadline {
                return Err(LockError::Timeout {
                    key: key.to_string(),
                });
            }
            tokio::time::sleep(Self::RETRY_DELAY).await;
        }
    }

    async fn release(&self, guard: LockGuard) -> Result<(), LockError> {
        let redis_key = format!("lock:{}", guard.key);
        if !self.pool.unlock(&redis_key, &guard.owner.to_string()).await? {
            warn!("Lock {} expired before release", guard.key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(wait_ms: u64) -> LocalLock {
        LocalLock::new(&LockConfig {
            ttl_ms: 5_000,
            wait_ms,
        })
    }

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let lock = local(50);
        let held = lock.acquire("vote:u1:p1").await.unwrap();

        let err = lock.acquire("vote:u1:p1").await.unwrap_err();
        assert!(matches!(err, LockError::Timeout { .. }));

        lock.release(held).await.unwrap();
        let again = lock.acquire("vote:u1:p1").await.unwrap();
        lock.release(again).await.unwrap();
    }

    #[tokio::test]
    async fn different_keys_do_not_contend() {
        let lock = local(50);
        let first = lock.acquire("vote:u1:p1").await.unwrap();
        let second = lock.acquire("vote:u1:p2").await.unwrap();
        assert_eq!(second.key(), "vote:u1:p2");
        lock.release(first).await.unwrap();
        lock.release(second).await.unwrap();
    }

    #[tokio::test]
    async fn released_keys_are_forgotten() {
        let lock = local(50);
        let guard = lock.acquire("vote:u1:p1").await.unwrap();
        assert_eq!(lock.tracked().await, 1);
        lock.release(guard).await.unwrap();
        assert_eq!(lock.tracked().await, 0);
    }

    #[tokio::test]
    async fn abandoned_keys_are_swept_on_next_acquire() {
        let lock = local(50);
        drop(lock.acquire("vote:u1:p1").await.unwrap());

        let cancelled = tokio::time::timeout(Duration::from_millis(20), async {
            let _guard = lock.acquire("vote:u2:p1").await.unwrap();
            std::future::pending::<()>().await;
        })
        .await;
        assert!(cancelled.is_err());
        assert_eq!(lock.tracked().await, 2);

        let guard = lock.acquire("vote:u3:p1").await.unwrap();
        assert_eq!(lock.tracked().await, 1);
        lock.release(guard).await.unwrap();
        assert_eq!(lock.tracked().await, 0);
    }

    #[tokio::test]
    async fn dropping_a_guard_frees_the_key() {
        let lock = local(50);
        drop(lock.acquire("vote:u1:p1").await.unwrap());
        assert!(lock.acquire("vote:u1:p1").await.is_ok());
    }

    #[tokio::test]
    async fn waiters_proceed_in_turn() {
        let lock = local(1_000);
        let counter = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for n in 0..4 {
            let lock = lock.clone();
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                let guard = lock.acquire("shared").await.unwrap();
                counter.lock().await.push(n);
                tokio::time::sleep(Duration::from_millis(5)).await;
                lock.release(guard).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(counter.lock().await.len(), 4);
    }
}

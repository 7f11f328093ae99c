//! Cache storage backends.
//!
//! Values are opaque serialized snapshots. Every write carries its own TTL and
//! an expired entry is indistinguishable from an absent one.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use thiserror::Error;
use tokio::time::Instant;

use super::config::CacheConfig;
use super::keys::CacheKey;
use super::lock::rw_write;

const SOURCE: &str = "cache::store";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Backend(String),
    #[error("cached value for `{key}` could not be decoded: {message}")]
    Decode { key: String, message: String },
}

impl CacheError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &CacheKey, value: String, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &CacheKey) -> Result<(), CacheError>;
}

struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-process LRU store. Expiry is checked lazily on read.
pub struct MemoryCacheStore {
    entries: RwLock<LruCache<CacheKey, Entry>>,
}

impl MemoryCacheStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.memory_capacity_non_zero())),
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheError> {
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Ok(Some(entry.value.clone()));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &CacheKey, value: String, ttl: Duration) -> Result<(), CacheError> {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        rw_write(&self.entries, SOURCE, "set").put(*key, entry);
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<(), CacheError> {
        rw_write(&self.entries, SOURCE, "delete").pop(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(capacity: usize) -> MemoryCacheStore {
        MemoryCacheStore::new(&CacheConfig {
            memory_capacity: capacity,
            ..Default::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let store = store(8);
        let key = CacheKey::course(1);
        store
            .set(&key, "{}".to_string(), Duration::from_secs(300))
            .await
            .expect("set");

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(store.get(&key).await.expect("get").is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(store.get(&key).await.expect("get").is_none());
        assert!(
            store.entries.read().expect("lock").is_empty(),
            "expired entry is evicted on read"
        );
    }

    #[tokio::test]
    async fn rewrite_refreshes_value() {
        let store = store(8);
        let key = CacheKey::student(3);
        store
            .set(&key, "old".to_string(), Duration::from_secs(60))
            .await
            .expect("set");
        store
            .set(&key, "new".to_string(), Duration::from_secs(60))
            .await
            .expect("set");
        assert_eq!(store.get(&key).await.expect("get").as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn least_recently_used_entry_is_evicted() {
        let store = store(1);
        let ttl = Duration::from_secs(60);
        store
            .set(&CacheKey::course(1), "a".to_string(), ttl)
            .await
            .expect("set");
        store
            .set(&CacheKey::course(2), "b".to_string(), ttl)
            .await
            .expect("set");

        assert!(store.get(&CacheKey::course(1)).await.expect("get").is_none());
        assert!(store.get(&CacheKey::course(2)).await.expect("get").is_some());
    }

    #[tokio::test]
    async fn delete_is_unconditional() {
        let store = store(4);
        let key = CacheKey::course(9);
        store.delete(&key).await.expect("delete of absent key");
        store
            .set(&key, "x".to_string(), Duration::from_secs(5))
            .await
            .expect("set");
        store.delete(&key).await.expect("delete");
        assert!(store.get(&key).await.expect("get").is_none());
    }
}

//! Cache-aside reads and write-through invalidation.
//!
//! A read consults the store first and falls back to the supplied loader on a
//! miss. Only found records are written back; absence is never cached. Writers
//! call [`CacheAside::invalidate`] after their commit. Backend failures degrade
//! to misses and never fail the caller.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use metrics::counter;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use super::keys::CacheKey;
use super::store::{CacheError, CacheStore};

const SOURCE: &str = "cache::aside";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
    pub errors: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
    errors: AtomicU64,
}

pub struct CacheAside {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    counters: Counters,
}

impl CacheAside {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            counters: Counters::default(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
            errors: self.counters.errors.load(Ordering::Relaxed),
        }
    }

    /// Return the cached snapshot for `key`, or load, populate and return it.
    pub async fn read<T, E, F, Fut>(&self, key: CacheKey, load: F) -> Result<Option<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        if let Some(value) = self.lookup(&key).await {
            return Ok(Some(value));
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        counter!("registrar_cache_miss_total", "kind" => key.kind.as_str()).increment(1);

        let Some(value) = load().await? else {
            return Ok(None);
        };

        self.populate(&key, &value).await;
        Ok(Some(value))
    }

    /// Drop any entry for `key`.
    pub async fn invalidate(&self, key: CacheKey) {
        self.counters.invalidations.fetch_add(1, Ordering::Relaxed);
        counter!("registrar_cache_invalidate_total", "kind" => key.kind.as_str()).increment(1);

        if let Err(err) = self.store.delete(&key).await {
            self.record_error(&key, "invalidate", &err);
        }
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let raw = match self.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                self.record_error(key, "get", &err);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                counter!("registrar_cache_hit_total", "kind" => key.kind.as_str()).increment(1);
                debug!(target = SOURCE, key = %key, "cache hit");
                Some(value)
            }
            Err(err) => {
                let err = CacheError::Decode {
                    key: key.to_string(),
                    message: err.to_string(),
                };
                self.record_error(key, "decode", &err);
                if let Err(err) = self.store.delete(key).await {
                    self.record_error(key, "delete_undecodable", &err);
                }
                None
            }
        }
    }

    async fn populate<T: Serialize>(&self, key: &CacheKey, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(err) => {
                let err = CacheError::Decode {
                    key: key.to_string(),
                    message: err.to_string(),
                };
                self.record_error(key, "encode", &err);
                return;
            }
        };

        if let Err(err) = self.store.set(key, raw, self.ttl).await {
            self.record_error(key, "set", &err);
        }
    }

    fn record_error(&self, key: &CacheKey, op: &'static str, err: &CacheError) {
        self.counters.errors.fetch_add(1, Ordering::Relaxed);
        counter!("registrar_cache_error_total", "kind" => key.kind.as_str()).increment(1);
        warn!(
            target = SOURCE,
            key = %key,
            op,
            error = %err,
            "cache backend operation failed"
        );
    }
}

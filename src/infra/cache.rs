//! Cache backend wiring and the Redis store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::info;

use crate::cache::{
    CacheAside, CacheBackend, CacheConfig, CacheError, CacheKey, CacheStore, MemoryCacheStore,
};

use super::error::InfraError;

const KEY_PREFIX: &str = "registrar";

/// Shared Redis store; entries expire server-side via `SET .. EX`.
#[derive(Clone)]
pub struct RedisCacheStore {
    connection: ConnectionManager,
}

impl RedisCacheStore {
    pub async fn connect(url: &str) -> Result<Self, InfraError> {
        let client = Client::open(url)
            .map_err(|err| InfraError::cache(format!("invalid redis url: {err}")))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|err| InfraError::cache(format!("failed to connect to redis: {err}")))?;
        Ok(Self { connection })
    }

    fn redis_key(key: &CacheKey) -> String {
        format!("{KEY_PREFIX}:{key}")
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheError> {
        let mut connection = self.connection.clone();
        connection
            .get(Self::redis_key(key))
            .await
            .map_err(CacheError::backend)
    }

    async fn set(&self, key: &CacheKey, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut connection = self.connection.clone();
        let seconds = ttl.as_secs().max(1);
        let _: () = connection
            .set_ex(Self::redis_key(key), value, seconds)
            .await
            .map_err(CacheError::backend)?;
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<(), CacheError> {
        let mut connection = self.connection.clone();
        let _: () = connection
            .del(Self::redis_key(key))
            .await
            .map_err(CacheError::backend)?;
        Ok(())
    }
}

/// Build the cache-aside front for the configured backend.
pub async fn build_cache(config: &CacheConfig) -> Result<Arc<CacheAside>, InfraError> {
    let store: Arc<dyn CacheStore> = match config.backend {
        CacheBackend::Memory => Arc::new(MemoryCacheStore::new(config)),
        CacheBackend::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .ok_or_else(|| InfraError::configuration("cache.redis_url is not set"))?;
            Arc::new(RedisCacheStore::connect(url).await?)
        }
    };

    info!(
        target = "infra::cache",
        backend = ?config.backend,
        ttl_secs = config.ttl.as_secs(),
        "cache initialized"
    );
    Ok(Arc::new(CacheAside::new(store, config.ttl)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redis_keys_are_namespaced() {
        assert_eq!(
            RedisCacheStore::redis_key(&CacheKey::course(7)),
            "registrar:course:7"
        );
        assert_eq!(
            RedisCacheStore::redis_key(&CacheKey::student(3)),
            "registrar:student:3"
        );
    }

    #[tokio::test]
    async fn memory_backend_needs_no_connection() {
        let cache = build_cache(&CacheConfig::default()).await.expect("cache");
        assert_eq!(cache.ttl(), Duration::from_secs(300));
    }

    #[tokio::test]
    async fn redis_backend_without_url_is_a_configuration_error() {
        let config = CacheConfig {
            backend: CacheBackend::Redis,
            ..Default::default()
        };
        assert!(matches!(
            build_cache(&config).await,
            Err(InfraError::Configuration { .. })
        ));
    }
}

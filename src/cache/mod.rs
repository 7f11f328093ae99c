//! Registrar cache system
//!
//! Cache-aside lookups for course and student snapshots:
//!
//! - **Keys**: `course:{id}` and `student:{id}`
//! - **Backends**: in-process LRU ([`MemoryCacheStore`]) or Redis
//!   (`infra::cache::RedisCacheStore`)
//! - **Consistency**: entries live for the configured TTL (300 s by default) and
//!   are deleted by every write to the underlying record
//!
//! ```toml
//! [cache]
//! backend = "redis"
//! redis_url = "redis://127.0.0.1:6379"
//! ttl_seconds = 300
//! ```

mod aside;
mod config;
mod keys;
mod lock;
mod store;

pub use aside::{CacheAside, CacheStats};
pub use config::{CacheBackend, CacheConfig};
pub use keys::{CacheKey, EntityKind};
pub use store::{CacheError, CacheStore, MemoryCacheStore};

//! Shared key/value store backends
//!
//! Everything the gateway shares across processes (cached payloads, lock
//! keys, rate counters) goes through [`KeyValueStore`]. Redis backs it in
//! production; [`MemoryStore`] serves single-process deployments and tests.

mod memory;
mod redis_store;

use std::time::Duration;

use async_trait::async_trait;
use market_core::MarketResult;

pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;

/// TTL-aware string store
///
/// Every write is a last-writer-wins overwrite. A zero `ttl` means the key
/// does not expire.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> MarketResult<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> MarketResult<()>;

    /// Create `key` only if it is absent; returns whether it was created
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> MarketResult<bool>;

    async fn delete(&self, key: &str) -> MarketResult<()>;

    async fn exists(&self, key: &str) -> MarketResult<bool>;

    /// Atomically increment a counter, giving it `window` as expiry if it has none
    ///
    /// Returns the post-increment count and the time left on the key.
    async fn incr_with_expiry(&self, key: &str, window: Duration) -> MarketResult<(u64, Duration)>;
}

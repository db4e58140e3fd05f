//! Read-through helper shared by the repositories

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use market_core::MarketResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache_store::CacheStore;
use crate::coalescer::RequestCoalescer;

/// Cache-aside reads, optionally coalesced
///
/// With a coalescer, concurrent misses for one key in this process share a
/// single upstream fetch. Cancelling `cancel` abandons the waits a read may
/// block on.
#[derive(Clone)]
pub struct CacheAside {
    cache: CacheStore,
    coalescer: Option<Arc<RequestCoalescer>>,
    cancel: CancellationToken,
}

impl CacheAside {
    pub fn new(
        cache: CacheStore,
        coalescer: Option<Arc<RequestCoalescer>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            cache,
            coalescer,
            cancel,
        }
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn is_coalescing(&self) -> bool {
        self.coalescer.is_some()
    }

    /// Cached value for `key`, or the result of `fetch` written back with `ttl`
    pub async fn get_or_fetch<T, F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> MarketResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = MarketResult<T>>,
    {
        if let Some(coalescer) = &self.coalescer {
            return coalescer
                .execute_with_ttl(key, ttl, &self.cancel, fetch)
                .await;
        }

        if let Some(hit) = self.cache.get::<T>(key).await {
            debug!("Cache hit: {}", key);
            return Ok(hit);
        }

        debug!("Cache miss: {}", key);
        self.fetch_and_store(key, ttl, fetch).await
    }

    /// Fetch unconditionally and overwrite the cached entry
    pub async fn fetch_and_store<T, F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> MarketResult<T>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = MarketResult<T>>,
    {
        let value = fetch().await?;
        self.cache.set(key, &value, ttl).await;
        Ok(value)
    }
}

impl std::fmt::Debug for CacheAside {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheAside")
            .field("coalescing", &self.coalescer.is_some())
            .finish_non_exhaustive()
    }
}

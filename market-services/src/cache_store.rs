//! Typed cache-aside primitive over a [`KeyValueStore`]
//!
//! Reads never fail: a backend error, a miss and an undecodable payload all
//! come back as `None`, and the caller re-derives the value. Writes are
//! best-effort and only logged on failure.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::store::KeyValueStore;

/// Expiry applied when a caller passes a zero TTL
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Clone)]
pub struct CacheStore {
    store: Arc<dyn KeyValueStore>,
    default_ttl: Duration,
}

impl CacheStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_default_ttl(store, DEFAULT_CACHE_TTL)
    }

    pub fn with_default_ttl(store: Arc<dyn KeyValueStore>, default_ttl: Duration) -> Self {
        Self { store, default_ttl }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Resolve a call-site TTL, where zero means this store's default
    pub fn effective_ttl(&self, ttl: Duration) -> Duration {
        if ttl.is_zero() {
            self.default_ttl
        } else {
            ttl
        }
    }

    /// Raw payload, or `None` for a miss, an empty value or a backend error
    pub async fn get_raw(&self, key: &str) -> Option<String> {
        match self.store.get(key).await {
            Ok(Some(raw)) if !raw.is_empty() => Some(raw),
            Ok(_) => None,
            Err(e) => {
                warn!("Cache read failed for {}: {}", key, e);
                None
            }
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_raw(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("Discarding undecodable cache entry {}: {}", key, e);
                None
            }
        }
    }

    pub async fn set_raw(&self, key: &str, raw: &str, ttl: Duration) {
        let ttl = self.effective_ttl(ttl);
        if let Err(e) = self.store.set(key, raw, ttl).await {
            warn!("Cache write failed for {}: {}", key, e);
        }
    }

    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) {
        match serde_json::to_string(value) {
            Ok(raw) => self.set_raw(key, &raw, ttl).await,
            Err(e) => warn!("Cache encode failed for {}: {}", key, e),
        }
    }

    pub async fn delete(&self, key: &str) {
        if let Err(e) = self.store.delete(key).await {
            warn!("Cache delete failed for {}: {}", key, e);
        }
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

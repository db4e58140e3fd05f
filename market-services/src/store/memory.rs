//! In-process store with lazy expiry

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use market_core::{MarketError, MarketResult};
use parking_lot::Mutex;
use tokio::time::Instant;

use super::KeyValueStore;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// A `KeyValueStore` held in process memory
///
/// Expiry follows tokio's clock, so paused-time tests can step over TTLs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.lock().values().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired key
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        before - entries.len()
    }

    fn expiry(ttl: Duration) -> Option<Instant> {
        (!ttl.is_zero()).then(|| Instant::now() + ttl)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> MarketResult<Option<String>> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let expired = match entries.get(key) {
            Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> MarketResult<()> {
        self.entries.lock().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Self::expiry(ttl),
            },
        );
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> MarketResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        if entries.get(key).is_some_and(|e| e.is_live(now)) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Self::expiry(ttl),
            },
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> MarketResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> MarketResult<bool> {
        let now = Instant::now();
        Ok(self.entries.lock().get(key).is_some_and(|e| e.is_live(now)))
    }

    async fn incr_with_expiry(&self, key: &str, window: Duration) -> MarketResult<(u64, Duration)> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        if !entries.get(key).is_some_and(|e| e.is_live(now)) {
            entries.insert(
                key.to_string(),
                Entry {
                    value: "0".to_string(),
                    expires_at: None,
                },
            );
        }
        let entry = entries
            .get_mut(key)
            .ok_or_else(|| MarketError::internal("counter vanished during increment"))?;

        let count = entry
            .value
            .parse::<u64>()
            .map_err(|_| MarketError::store(format!("key {} does not hold a counter", key)))?
            + 1;
        entry.value = count.to_string();

        let expires_at = *entry.expires_at.get_or_insert(now + window);
        Ok((count, expires_at.saturating_duration_since(now)))
    }
}

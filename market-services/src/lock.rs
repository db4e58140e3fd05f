//! Ownerless lease lock
//!
//! The existence of the lock key is the lock. There is no holder token, so
//! `release` deletes the key unconditionally: a caller that outlived its
//! lease can free a lock someone else now holds.

use std::sync::Arc;
use std::time::Duration;

use market_core::{MarketError, MarketResult};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::keys::KeyBuilder;
use crate::store::KeyValueStore;

#[derive(Debug, Clone)]
pub struct LockConfig {
    /// Lease after which a lock frees itself
    pub lease: Duration,
    /// How often `wait_until_free` re-checks the key
    pub poll_interval: Duration,
    /// Upper bound on `wait_until_free`
    pub max_wait: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            lease: Duration::from_secs(30),
            poll_interval: Duration::from_millis(50),
            max_wait: Duration::from_secs(5),
        }
    }
}

#[derive(Clone)]
pub struct DistributedLock {
    store: Arc<dyn KeyValueStore>,
    keys: KeyBuilder,
    config: LockConfig,
}

impl DistributedLock {
    pub fn new(store: Arc<dyn KeyValueStore>, keys: KeyBuilder, config: LockConfig) -> Self {
        Self { store, keys, config }
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Try once to take the lock; never blocks
    pub async fn acquire(&self, resource: &str) -> MarketResult<bool> {
        let key = self.keys.coalesce_lock(resource);
        let acquired = self.store.set_nx(&key, "1", self.config.lease).await?;
        debug!("Lock {} {}", key, if acquired { "acquired" } else { "busy" });
        Ok(acquired)
    }

    pub async fn release(&self, resource: &str) -> MarketResult<()> {
        self.store.delete(&self.keys.coalesce_lock(resource)).await
    }

    pub async fn is_held(&self, resource: &str) -> MarketResult<bool> {
        self.store.exists(&self.keys.coalesce_lock(resource)).await
    }

    /// Poll until the lock key is gone
    ///
    /// Fails with `CoalescingTimeout` after `max_wait`, or `Cancelled` as soon
    /// as `cancel` fires.
    pub async fn wait_until_free(&self, resource: &str, cancel: &CancellationToken) -> MarketResult<()> {
        let deadline = Instant::now() + self.config.max_wait;

        loop {
            if !self.is_held(resource).await? {
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(MarketError::coalescing_timeout(resource));
            }
            let pause = self.config.poll_interval.min(deadline - now);

            tokio::select! {
                _ = cancel.cancelled() => return Err(MarketError::Cancelled),
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }
}

impl std::fmt::Debug for DistributedLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributedLock")
            .field("namespace", &self.keys.namespace())
            .field("config", &self.config)
            .finish()
    }
}

//! Single-flight request coalescing
//!
//! Within one process at most one execution per key is in flight: concurrent
//! callers attach to the running one and receive its result or its error.
//! Across processes the lease lock only makes duplicate work unlikely. A
//! caller that loses the lock waits for it, re-checks the cache once and, if
//! the cache is still cold, runs the work itself.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use market_core::{MarketError, MarketResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache_store::CacheStore;
use crate::lock::DistributedLock;

/// Serialized payload or the error every waiter should see
type FlightResult = Result<String, MarketError>;

struct Flight {
    id: u64,
    done: watch::Receiver<Option<FlightResult>>,
}

enum Role {
    Leader(u64, watch::Sender<Option<FlightResult>>),
    Follower(watch::Receiver<Option<FlightResult>>),
}

pub struct RequestCoalescer {
    cache: CacheStore,
    lock: DistributedLock,
    in_flight: DashMap<String, Flight>,
    next_id: AtomicU64,
}

impl RequestCoalescer {
    pub fn new(cache: CacheStore, lock: DistributedLock) -> Self {
        Self {
            cache,
            lock,
            in_flight: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Keys with an execution currently in flight in this process
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Run `fetch` for `key` at most once at a time, caching with the default TTL
    pub async fn execute<T, F, Fut>(
        &self,
        key: &str,
        cancel: &CancellationToken,
        fetch: F,
    ) -> MarketResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = MarketResult<T>>,
    {
        self.execute_with_ttl(key, Duration::ZERO, cancel, fetch).await
    }

    /// Like [`execute`](Self::execute) with an explicit cache TTL (zero = store default)
    pub async fn execute_with_ttl<T, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        cancel: &CancellationToken,
        fetch: F,
    ) -> MarketResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = MarketResult<T>>,
    {
        if let Some(hit) = self.cache.get::<T>(key).await {
            return Ok(hit);
        }

        let role = match self.in_flight.entry(key.to_string()) {
            Entry::Occupied(flight) => Role::Follower(flight.get().done.clone()),
            Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let (tx, rx) = watch::channel(None);
                slot.insert(Flight { id, done: rx });
                Role::Leader(id, tx)
            }
        };

        match role {
            Role::Follower(done) => self.follow(key, done, cancel).await,
            Role::Leader(id, tx) => {
                let mut guard = FlightGuard {
                    in_flight: &self.in_flight,
                    lock: self.lock.clone(),
                    key: key.to_string(),
                    id,
                    lock_held: false,
                };

                let outcome = self.lead(key, ttl, cancel, fetch, &mut guard).await;
                tx.send_replace(Some(match &outcome {
                    Ok((_, raw)) => Ok(raw.clone()),
                    Err(e) => Err(e.clone()),
                }));

                drop(guard);
                outcome.map(|(value, _)| value)
            }
        }
    }

    async fn lead<T, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        cancel: &CancellationToken,
        fetch: F,
        guard: &mut FlightGuard<'_>,
    ) -> MarketResult<(T, String)>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = MarketResult<T>>,
    {
        match self.lock.acquire(key).await {
            Ok(true) => guard.lock_held = true,
            Ok(false) => {
                debug!("Lock for {} held elsewhere, waiting", key);
                self.lock.wait_until_free(key, cancel).await?;

                if let Some(raw) = self.cache.get_raw(key).await {
                    if let Ok(value) = serde_json::from_str::<T>(&raw) {
                        return Ok((value, raw));
                    }
                }
                debug!("Cache still cold for {} after lock wait, fetching", key);
            }
            Err(e) => warn!("Lock unavailable for {}, fetching uncoordinated: {}", key, e),
        }

        let value = fetch().await?;
        let raw = serde_json::to_string(&value)?;
        if !raw.is_empty() && raw != "null" {
            self.cache.set_raw(key, &raw, ttl).await;
        }

        Ok((value, raw))
    }

    async fn follow<T: DeserializeOwned>(
        &self,
        key: &str,
        mut done: watch::Receiver<Option<FlightResult>>,
        cancel: &CancellationToken,
    ) -> MarketResult<T> {
        debug!("Joining in-flight request for {}", key);

        let published: Option<FlightResult> = tokio::select! {
            _ = cancel.cancelled() => return Err(MarketError::Cancelled),
            result = done.wait_for(Option::is_some) => result.ok().and_then(|r| (*r).clone()),
        };

        match published {
            Some(Ok(raw)) => Ok(serde_json::from_str(&raw)?),
            Some(Err(e)) => Err(e),
            // The leading caller was dropped before finishing
            None => Err(MarketError::Cancelled),
        }
    }
}

impl std::fmt::Debug for RequestCoalescer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCoalescer")
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

/// Deregisters a flight and releases its lock however the leader exits
struct FlightGuard<'a> {
    in_flight: &'a DashMap<String, Flight>,
    lock: DistributedLock,
    key: String,
    id: u64,
    lock_held: bool,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        let id = self.id;
        self.in_flight.remove_if(&self.key, |_, flight| flight.id == id);

        if !self.lock_held {
            return;
        }

        // Detached so that a cancelled caller still frees the lock
        let lock = self.lock.clone();
        let key = std::mem::take(&mut self.key);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = lock.release(&key).await {
                        warn!("Failed to release lock for {}: {}", key, e);
                    }
                });
            }
            Err(_) => warn!("No runtime to release lock for {}; lease will expire", key),
        }
    }
}

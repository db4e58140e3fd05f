//! Shared upstream request budget
//!
//! Paces every warming request through one budget so that all background
//! refresh loops together stay under a fixed upstream rate.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use market_core::{MarketError, MarketResult};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Budget that spaces requests evenly, `60s / per_minute` apart
///
/// ## Reservation-Based Scheduling
///
/// Each caller reserves its slot while holding the lock and only then waits,
/// so concurrent callers always get distinct, evenly spaced slots.
#[derive(Debug)]
pub struct RateBudget {
    /// The next free slot, as milliseconds since `epoch`
    next_available_ms: Mutex<u64>,
    epoch: Instant,
    min_interval: Duration,
    /// Name for logging purposes
    name: String,
    total_requests: AtomicU64,
    waited_requests: AtomicU64,
}

impl RateBudget {
    pub fn new(min_interval: Duration, name: &str) -> Self {
        Self {
            next_available_ms: Mutex::new(0),
            epoch: Instant::now(),
            min_interval,
            name: name.to_string(),
            total_requests: AtomicU64::new(0),
            waited_requests: AtomicU64::new(0),
        }
    }

    /// A budget of `per_minute` requests per minute (at least one)
    pub fn per_minute(per_minute: u32, name: &str) -> Self {
        let per_minute = per_minute.max(1);
        Self::new(Duration::from_secs(60) / per_minute, name)
    }

    fn instant_to_ms(&self, instant: Instant) -> u64 {
        instant.duration_since(self.epoch).as_millis() as u64
    }

    fn ms_to_instant(&self, ms: u64) -> Instant {
        self.epoch + Duration::from_millis(ms)
    }

    /// Wait for the next slot
    ///
    /// Returns `Cancelled` as soon as `cancel` fires; the reserved slot is
    /// then simply left unused.
    pub async fn acquire(&self, cancel: &CancellationToken) -> MarketResult<()> {
        let request_num = self.total_requests.fetch_add(1, Ordering::Relaxed) + 1;
        let now_ms = self.instant_to_ms(Instant::now());
        let interval_ms = self.min_interval.as_millis() as u64;

        let slot_ms = {
            let mut next_available = self.next_available_ms.lock().await;
            let slot = (*next_available).max(now_ms);
            *next_available = slot + interval_ms;
            slot
        };

        if slot_ms > now_ms {
            self.waited_requests.fetch_add(1, Ordering::Relaxed);
            debug!(
                "[RATE_BUDGET:{}] #{} QUEUED - waiting {}ms",
                self.name,
                request_num,
                slot_ms - now_ms
            );

            tokio::select! {
                _ = cancel.cancelled() => return Err(MarketError::Cancelled),
                _ = tokio::time::sleep_until(self.ms_to_instant(slot_ms)) => {}
            }
        }

        Ok(())
    }

    /// Whether a request could go out right now
    pub async fn can_acquire_immediately(&self) -> bool {
        let now_ms = self.instant_to_ms(Instant::now());
        now_ms >= *self.next_available_ms.lock().await
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn stats(&self) -> RateBudgetStats {
        RateBudgetStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            waited_requests: self.waited_requests.load(Ordering::Relaxed),
            min_interval_ms: self.min_interval.as_millis() as u64,
            name: self.name.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateBudgetStats {
    pub total_requests: u64,
    pub waited_requests: u64,
    pub min_interval_ms: u64,
    pub name: String,
}

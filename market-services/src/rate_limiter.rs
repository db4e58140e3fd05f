//! Fixed-window, tiered rate limiting
//!
//! Each `(identifier, tier)` pair owns a counter that is created with the
//! tier's window as its expiry and resets only when that key expires. A
//! caller can therefore burst up to twice the limit across a window boundary.

use std::sync::Arc;

use chrono::Utc;
use market_core::{MarketResult, RateLimitDecision, RateLimitTier};
use tracing::{debug, instrument};

use crate::keys::KeyBuilder;
use crate::store::KeyValueStore;

/// Requests allowed per window for each tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierLimits {
    pub authenticated: u64,
    pub unauthenticated: u64,
    pub worker: u64,
}

impl Default for TierLimits {
    fn default() -> Self {
        Self {
            authenticated: RateLimitTier::Authenticated.default_max_requests(),
            unauthenticated: RateLimitTier::Unauthenticated.default_max_requests(),
            worker: RateLimitTier::Worker.default_max_requests(),
        }
    }
}

impl TierLimits {
    pub fn max_requests(&self, tier: RateLimitTier) -> u64 {
        match tier {
            RateLimitTier::Authenticated => self.authenticated,
            RateLimitTier::Unauthenticated => self.unauthenticated,
            RateLimitTier::Worker => self.worker,
        }
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn KeyValueStore>,
    keys: KeyBuilder,
    limits: TierLimits,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn KeyValueStore>, keys: KeyBuilder, limits: TierLimits) -> Self {
        Self { store, keys, limits }
    }

    pub fn limits(&self) -> &TierLimits {
        &self.limits
    }

    /// Count one request against `identifier` and decide whether it may proceed
    ///
    /// Store failures are returned to the caller, which is expected to fail open.
    #[instrument(skip(self))]
    pub async fn check_limit(&self, identifier: &str, tier: RateLimitTier) -> MarketResult<RateLimitDecision> {
        let key = self.keys.rate_limit_counter(identifier, tier);
        let (count, ttl) = self.store.incr_with_expiry(&key, tier.window()).await?;

        let decision = RateLimitDecision::from_count(count, self.limits.max_requests(tier), ttl, Utc::now());
        if !decision.allowed {
            debug!("Rate limit exceeded for {} ({}): {} requests", identifier, tier, count);
        }

        Ok(decision)
    }

    /// Forget the current window for `identifier`
    pub async fn reset(&self, identifier: &str, tier: RateLimitTier) -> MarketResult<()> {
        self.store.delete(&self.keys.rate_limit_counter(identifier, tier)).await
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::time::Duration;

    fn limiter() -> RateLimiter {
        RateLimiter::new(Arc::new(MemoryStore::new()), KeyBuilder::default(), TierLimits::default())
    }

    #[tokio::test(start_paused = true)]
    async fn window_allows_limit_then_denies() {
        let limiter = limiter();

        for i in 1..=100u64 {
            let decision = limiter.check_limit("user-1", RateLimitTier::Authenticated).await.unwrap();
            assert!(decision.allowed, "request {} should be allowed", i);
            assert_eq!(decision.remaining, 100 - i);
            assert_eq!(decision.limit, 100);
        }

        let denied = limiter.check_limit("user-1", RateLimitTier::Authenticated).await.unwrap();
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);

        let still_denied = limiter.check_limit("user-1", RateLimitTier::Authenticated).await.unwrap();
        assert_eq!(still_denied.remaining, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn window_resets_after_expiry() {
        let limiter = limiter();
        for _ in 0..11 {
            limiter.check_limit("10.0.0.1", RateLimitTier::Unauthenticated).await.unwrap();
        }
        assert!(!limiter.check_limit("10.0.0.1", RateLimitTier::Unauthenticated).await.unwrap().allowed);

        tokio::time::advance(Duration::from_secs(61)).await;

        let fresh = limiter.check_limit("10.0.0.1", RateLimitTier::Unauthenticated).await.unwrap();
        assert!(fresh.allowed);
        assert_eq!(fresh.remaining, 9);
    }

    #[tokio::test(start_paused = true)]
    async fn window_is_fixed_not_sliding() {
        let limiter = limiter();

        tokio::time::advance(Duration::from_secs(50)).await;
        let first = limiter.check_limit("w", RateLimitTier::Worker).await.unwrap();
        assert!(first.allowed);

        tokio::time::advance(Duration::from_secs(30)).await;
        let decision = limiter.check_limit("w", RateLimitTier::Worker).await.unwrap();
        let reset_in = decision.reset_at - Utc::now();
        assert!(reset_in <= chrono::Duration::seconds(30));
        assert!(reset_in > chrono::Duration::seconds(28));
    }

    #[tokio::test(start_paused = true)]
    async fn identifiers_and_tiers_are_independent() {
        let limiter = limiter();
        for _ in 0..10 {
            limiter.check_limit("a", RateLimitTier::Unauthenticated).await.unwrap();
        }
        assert!(!limiter.check_limit("a", RateLimitTier::Unauthenticated).await.unwrap().allowed);
        assert!(limiter.check_limit("b", RateLimitTier::Unauthenticated).await.unwrap().allowed);
        assert!(limiter.check_limit("a", RateLimitTier::Authenticated).await.unwrap().allowed);

        limiter.reset("a", RateLimitTier::Unauthenticated).await.unwrap();
        assert!(limiter.check_limit("a", RateLimitTier::Unauthenticated).await.unwrap().allowed);
    }
}

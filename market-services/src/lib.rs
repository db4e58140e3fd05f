//! Caching and request-control services for the market data gateway
//!
//! This crate sits between the HTTP layer and the Kalshi client: cache-aside
//! repositories, single-flight request coalescing, tiered rate limiting and
//! the background cache warmer.

pub mod cache_aside;
pub mod cache_store;
pub mod cache_warmer;
pub mod category_repository;
pub mod category_service;
pub mod coalescer;
pub mod keys;
pub mod lock;
pub mod market_details;
pub mod market_list;
pub mod market_repository;
pub mod rate_budget;
pub mod rate_limiter;
pub mod store;

#[cfg(test)]
mod testing;

pub use cache_aside::CacheAside;
pub use cache_store::{CacheStore, DEFAULT_CACHE_TTL};
pub use cache_warmer::{CacheWarmer, CacheWarmerConfig, WarmerHandle};
pub use category_repository::{CategoryRepository, OVERVIEW_SAMPLE_LIMIT};
pub use category_service::CategoryService;
pub use coalescer::RequestCoalescer;
pub use keys::KeyBuilder;
pub use lock::{DistributedLock, LockConfig};
pub use market_details::{MarketDetails, MarketDetailsService, DETAILS_TRADES_LIMIT};
pub use market_list::{MarketListQuery, MarketListService, MarketPage, DEFAULT_PAGE, DEFAULT_PAGE_LIMIT};
pub use market_repository::{CacheTtls, MarketRepository, MAX_TRADES};
pub use rate_budget::{RateBudget, RateBudgetStats};
pub use rate_limiter::{RateLimiter, TierLimits};
pub use store::{KeyValueStore, MemoryStore, RedisStore};

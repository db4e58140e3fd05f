//! Core types for the Kalshi market data gateway
//!
//! This crate defines the domain model shared across the gateway: market,
//! order book and trade entities, category metadata, rate limit tiers, the
//! composite market view and the gateway-wide error type.

pub mod aggregate;
pub mod category;
pub mod error;
pub mod market;
pub mod pagination;
pub mod rate_limit;

pub use aggregate::{aggregate, AggregatedMarketView};
pub use category::{Category, CategoryName, CategoryOverview};
pub use error::{MarketError, MarketResult};
pub use market::{
    Market, MarketStatus, OrderBook, OrderLevel, Price, Ticker, Trade, TradeSide,
};
pub use pagination::{paginate, PageInfo, MAX_PAGE_LIMIT};
pub use rate_limit::{RateLimitDecision, RateLimitTier, RATE_LIMIT_WINDOW};

//! Kalshi integration for the market data gateway
//!
//! This crate provides the upstream collaborator the gateway caches in front
//! of: the `MarketDataSource` trait, a reqwest-based client for the Kalshi
//! REST API, and the wire types with their mapping into market-core.

pub mod client;
pub mod types;

pub use client::{KalshiClient, KalshiClientConfig, MarketDataSource, RetryPolicy, KALSHI_API_BASE};
pub use types::{to_markets, to_trades, KalshiMarket, KalshiOrderbook, KalshiSeries, KalshiTrade};

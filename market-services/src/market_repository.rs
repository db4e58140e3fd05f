//! Cache-aside repository for markets, order books and trades

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use market_core::{
    paginate, CategoryName, Market, MarketError, MarketResult, MarketStatus, OrderBook, Ticker,
    Trade,
};
use market_kalshi::{to_markets, to_trades, MarketDataSource};
use tracing::{debug, instrument, warn};

use crate::cache_aside::CacheAside;
use crate::keys::KeyBuilder;

/// Trades requested from upstream per market
pub const MAX_TRADES: u32 = 100;

/// Concurrent upstream fetches in `get_multiple`
const MAX_CONCURRENT_FETCHES: usize = 4;

/// Expiry for each cached resource
#[derive(Debug, Clone)]
pub struct CacheTtls {
    pub market_list: Duration,
    pub market_metadata: Duration,
    pub order_book: Duration,
    pub trades: Duration,
    pub category_list: Duration,
    pub category_overview: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            market_list: Duration::from_secs(5 * 60),
            market_metadata: Duration::from_secs(5 * 60),
            order_book: Duration::from_secs(30),
            trades: Duration::from_secs(60),
            category_list: Duration::from_secs(24 * 60 * 60),
            category_overview: Duration::from_secs(10 * 60),
        }
    }
}

pub struct MarketRepository {
    source: Arc<dyn MarketDataSource>,
    cache: CacheAside,
    keys: KeyBuilder,
    ttls: CacheTtls,
}

impl MarketRepository {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        cache: CacheAside,
        keys: KeyBuilder,
        ttls: CacheTtls,
    ) -> Self {
        Self {
            source,
            cache,
            keys,
            ttls,
        }
    }

    pub fn ttls(&self) -> &CacheTtls {
        &self.ttls
    }

    #[instrument(skip(self), fields(ticker = %ticker))]
    pub async fn get_by_ticker(&self, ticker: &Ticker) -> MarketResult<Market> {
        let key = self.keys.market_metadata(ticker);
        self.cache
            .get_or_fetch(&key, self.ttls.market_metadata, || self.fetch_market(ticker))
            .await
    }

    /// Markets of one category, filtered by status, as `(page, total)`
    ///
    /// Only the category is part of the cache key; filtering and pagination
    /// happen on the cached listing.
    #[instrument(skip(self))]
    pub async fn list_by_category(
        &self,
        category: CategoryName,
        status: Option<MarketStatus>,
        page: usize,
        limit: usize,
    ) -> MarketResult<(Vec<Market>, usize)> {
        let markets = self.list_all_by_category(category).await?;

        let filtered: Vec<Market> = match status {
            Some(status) => markets.into_iter().filter(|m| m.status == status).collect(),
            None => markets,
        };

        Ok(paginate(&filtered, page, limit))
    }

    /// The full cached listing for a category
    #[instrument(skip(self))]
    pub async fn list_all_by_category(&self, category: CategoryName) -> MarketResult<Vec<Market>> {
        let key = self.keys.market_list(category);
        self.cache
            .get_or_fetch(&key, self.ttls.market_list, || self.fetch_category(category))
            .await
    }

    #[instrument(skip(self), fields(ticker = %ticker))]
    pub async fn get_order_book(&self, ticker: &Ticker) -> MarketResult<OrderBook> {
        let key = self.keys.order_book(ticker);
        self.cache
            .get_or_fetch(&key, self.ttls.order_book, || async {
                let wire = self.source.fetch_order_book(ticker).await?;
                Ok(wire.to_order_book(ticker, Utc::now()))
            })
            .await
    }

    /// Most recent trades, at most `limit`
    #[instrument(skip(self), fields(ticker = %ticker))]
    pub async fn get_recent_trades(&self, ticker: &Ticker, limit: usize) -> MarketResult<Vec<Trade>> {
        let key = self.keys.trades(ticker);
        let mut trades: Vec<Trade> = self
            .cache
            .get_or_fetch(&key, self.ttls.trades, || async {
                let wire = self.source.fetch_trades(ticker, MAX_TRADES).await?;
                Ok(to_trades(&wire, ticker))
            })
            .await?;

        trades.truncate(limit);
        Ok(trades)
    }

    /// Markets for several tickers; tickers that fail are left out
    pub async fn get_multiple(&self, tickers: &[Ticker]) -> Vec<Market> {
        stream::iter(tickers)
            .map(|ticker| async move {
                match self.get_by_ticker(ticker).await {
                    Ok(market) => Some(market),
                    Err(e) => {
                        warn!("Skipping market {}: {}", ticker, e);
                        None
                    }
                }
            })
            .buffered(MAX_CONCURRENT_FETCHES)
            .filter_map(|m| async move { m })
            .collect()
            .await
    }

    /// Re-fetch one market and overwrite its cache entry
    #[instrument(skip(self), fields(ticker = %ticker))]
    pub async fn refresh_by_ticker(&self, ticker: &Ticker) -> MarketResult<Market> {
        let key = self.keys.market_metadata(ticker);
        self.cache
            .fetch_and_store(&key, self.ttls.market_metadata, || self.fetch_market(ticker))
            .await
    }

    /// Re-fetch a category listing and overwrite its cache entry
    #[instrument(skip(self))]
    pub async fn refresh_category(&self, category: CategoryName) -> MarketResult<Vec<Market>> {
        let key = self.keys.market_list(category);
        self.cache
            .fetch_and_store(&key, self.ttls.market_list, || self.fetch_category(category))
            .await
    }

    async fn fetch_market(&self, ticker: &Ticker) -> MarketResult<Market> {
        let wire = self.source.fetch_market(ticker).await?;
        wire.to_market().map_err(|e| {
            MarketError::upstream(format!("unusable market payload for {}: {}", ticker, e))
        })
    }

    async fn fetch_category(&self, category: CategoryName) -> MarketResult<Vec<Market>> {
        let wire = self.source.fetch_markets(category, None).await?;
        let markets = to_markets(&wire);
        debug!(
            "Mapped {} of {} upstream markets for {}",
            markets.len(),
            wire.len(),
            category
        );
        Ok(markets)
    }
}

impl std::fmt::Debug for MarketRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketRepository")
            .field("cache", &self.cache)
            .field("ttls", &self.ttls)
            .finish_non_exhaustive()
    }
}

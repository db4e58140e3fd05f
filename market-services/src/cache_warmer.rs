//! Background cache warming
//!
//! Three independent loops keep the hottest data in the cache: popular
//! markets, per-category overviews and the category list. Every upstream
//! request they make is paced through one shared [`RateBudget`], so a warmer
//! never starves interactive traffic of upstream quota.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use market_core::{CategoryName, MarketError, MarketResult, Ticker};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache_store::CacheStore;
use crate::category_repository::CategoryRepository;
use crate::keys::KeyBuilder;
use crate::market_repository::MarketRepository;
use crate::rate_budget::RateBudget;

#[derive(Debug, Clone)]
pub struct CacheWarmerConfig {
    pub hot_markets_interval: Duration,
    pub overviews_interval: Duration,
    pub category_list_interval: Duration,
    /// Markets kept warm by the hot-markets loop
    pub hot_markets_count: usize,
    /// Listing page scanned per category when ranking markets
    pub hot_markets_scan_limit: usize,
    pub hot_market_delay: Duration,
    pub overview_delay: Duration,
}

impl Default for CacheWarmerConfig {
    fn default() -> Self {
        Self {
            hot_markets_interval: Duration::from_secs(2 * 60),
            overviews_interval: Duration::from_secs(10 * 60),
            category_list_interval: Duration::from_secs(24 * 60 * 60),
            hot_markets_count: 20,
            hot_markets_scan_limit: 200,
            hot_market_delay: Duration::from_millis(50),
            overview_delay: Duration::from_millis(100),
        }
    }
}

pub struct CacheWarmer {
    markets: Arc<MarketRepository>,
    categories: Arc<CategoryRepository>,
    budget: Arc<RateBudget>,
    cache: CacheStore,
    keys: KeyBuilder,
    config: CacheWarmerConfig,
}

impl CacheWarmer {
    pub fn new(
        markets: Arc<MarketRepository>,
        categories: Arc<CategoryRepository>,
        budget: Arc<RateBudget>,
        cache: CacheStore,
        keys: KeyBuilder,
        config: CacheWarmerConfig,
    ) -> Self {
        Self {
            markets,
            categories,
            budget,
            cache,
            keys,
            config,
        }
    }

    pub fn config(&self) -> &CacheWarmerConfig {
        &self.config
    }

    /// Refresh the highest-volume markets across all categories
    ///
    /// Returns how many markets were refreshed.
    pub async fn warm_hot_markets(&self, cancel: &CancellationToken) -> MarketResult<usize> {
        let mut candidates: Vec<(Ticker, i64)> = Vec::new();

        for category in CategoryName::ALL {
            self.budget.acquire(cancel).await?;
            match self
                .markets
                .list_by_category(category, None, 1, self.config.hot_markets_scan_limit)
                .await
            {
                Ok((markets, _)) => {
                    candidates.extend(markets.into_iter().map(|m| (m.ticker, m.volume_24h)));
                }
                Err(e) => warn!("Hot market scan failed for {}: {}", category, e),
            }
        }

        candidates.sort_by(|a, b| b.1.cmp(&a.1));
        let mut seen = HashSet::new();
        let hot: Vec<Ticker> = candidates
            .into_iter()
            .map(|(ticker, _)| ticker)
            .filter(|ticker| seen.insert(ticker.clone()))
            .take(self.config.hot_markets_count)
            .collect();

        self.cache
            .set(&self.keys.hot_markets(), &hot, self.config.hot_markets_interval)
            .await;

        let mut warmed = 0;
        for ticker in &hot {
            self.budget.acquire(cancel).await?;
            match self.markets.refresh_by_ticker(ticker).await {
                Ok(_) => warmed += 1,
                Err(e) => warn!("Failed to warm market {}: {}", ticker, e),
            }
            pause(self.config.hot_market_delay, cancel).await?;
        }

        Ok(warmed)
    }

    /// Recompute the overview of every category
    pub async fn warm_category_overviews(&self, cancel: &CancellationToken) -> MarketResult<usize> {
        let mut warmed = 0;
        for category in CategoryName::ALL {
            self.budget.acquire(cancel).await?;
            match self.categories.refresh_overview(category).await {
                Ok(_) => warmed += 1,
                Err(e) => warn!("Failed to warm overview for {}: {}", category, e),
            }
            pause(self.config.overview_delay, cancel).await?;
        }
        Ok(warmed)
    }

    pub async fn warm_category_lists(&self, cancel: &CancellationToken) -> MarketResult<usize> {
        self.budget.acquire(cancel).await?;
        let categories = self.categories.refresh_all().await?;
        Ok(categories.len())
    }

    /// Refresh one category listing on demand
    pub async fn warm_markets_by_category(
        &self,
        category: CategoryName,
        cancel: &CancellationToken,
    ) -> MarketResult<usize> {
        self.budget.acquire(cancel).await?;
        let markets = self.markets.refresh_category(category).await?;
        Ok(markets.len())
    }

    /// Spawn the three warming loops
    ///
    /// Each loop runs a pass immediately, then once per interval, until
    /// `shutdown` is cancelled.
    pub fn start(self: Arc<Self>, shutdown: CancellationToken) -> WarmerHandle {
        info!(
            "Starting cache warmer (hot markets every {:?}, overviews every {:?}, categories every {:?})",
            self.config.hot_markets_interval,
            self.config.overviews_interval,
            self.config.category_list_interval
        );

        let tasks = vec![
            spawn_loop("hot_markets", self.config.hot_markets_interval, &self, &shutdown, |w, c| -> PassFuture {
                Box::pin(async move { w.warm_hot_markets(&c).await })
            }),
            spawn_loop("category_overviews", self.config.overviews_interval, &self, &shutdown, |w, c| -> PassFuture {
                Box::pin(async move { w.warm_category_overviews(&c).await })
            }),
            spawn_loop("category_lists", self.config.category_list_interval, &self, &shutdown, |w, c| -> PassFuture {
                Box::pin(async move { w.warm_category_lists(&c).await })
            }),
        ];

        WarmerHandle { shutdown, tasks }
    }
}

type PassFuture = std::pin::Pin<Box<dyn Future<Output = MarketResult<usize>> + Send>>;

fn spawn_loop(
    name: &'static str,
    period: Duration,
    warmer: &Arc<CacheWarmer>,
    shutdown: &CancellationToken,
    pass: fn(Arc<CacheWarmer>, CancellationToken) -> PassFuture,
) -> JoinHandle<()> {
    let warmer = Arc::clone(warmer);
    let shutdown = shutdown.clone();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match pass(Arc::clone(&warmer), shutdown.clone()).await {
                Ok(count) => info!("[WARMER:{}] pass complete, {} entries refreshed", name, count),
                Err(MarketError::Cancelled) => break,
                Err(e) => warn!("[WARMER:{}] pass failed: {}", name, e),
            }
        }

        debug!("[WARMER:{}] stopped", name);
    })
}

async fn pause(delay: Duration, cancel: &CancellationToken) -> MarketResult<()> {
    if delay.is_zero() {
        return Ok(());
    }
    tokio::select! {
        _ = cancel.cancelled() => Err(MarketError::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

/// Running warmer loops
pub struct WarmerHandle {
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl WarmerHandle {
    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(|t| t.is_finished())
    }

    /// Stop the loops, giving in-flight passes up to `grace` to finish
    ///
    /// Returns false when the loops had to be aborted.
    pub async fn shutdown(mut self, grace: Duration) -> bool {
        self.shutdown.cancel();

        let drained = tokio::time::timeout(grace, join_all(self.tasks.iter_mut()))
            .await
            .is_ok();

        if !drained {
            warn!("Cache warmer did not stop within {:?}, aborting", grace);
            for task in &self.tasks {
                task.abort();
            }
        } else {
            info!("Cache warmer stopped");
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache_aside::CacheAside;
    use crate::market_repository::CacheTtls;
    use crate::store::MemoryStore;
    use crate::testing::FakeSource;

    struct Fixture {
        source: Arc<FakeSource>,
        cache: CacheStore,
        warmer: Arc<CacheWarmer>,
    }

    fn fixture(config: CacheWarmerConfig) -> Fixture {
        let source = Arc::new(FakeSource::with_markets(
            CategoryName::Crypto,
            &[("KXBTC-1", 500), ("KXETH-1", 100)],
        ));
        source.add_markets(CategoryName::Sports, &[("KXNBA-1", 300)]);

        let cache = CacheStore::new(Arc::new(MemoryStore::new()));
        let aside = CacheAside::new(cache.clone(), None, CancellationToken::new());
        let markets = Arc::new(MarketRepository::new(
            source.clone(),
            aside.clone(),
            KeyBuilder::default(),
            CacheTtls::default(),
        ));
        let categories = Arc::new(CategoryRepository::new(
            Arc::clone(&markets),
            aside,
            KeyBuilder::default(),
            CacheTtls::default(),
        ));
        let warmer = Arc::new(CacheWarmer::new(
            markets,
            categories,
            Arc::new(RateBudget::per_minute(6000, "warmer")),
            cache.clone(),
            KeyBuilder::default(),
            config,
        ));

        Fixture { source, cache, warmer }
    }

    #[tokio::test(start_paused = true)]
    async fn hot_markets_ranked_by_volume() {
        let f = fixture(CacheWarmerConfig {
            hot_markets_count: 2,
            ..Default::default()
        });

        let warmed = f.warmer.warm_hot_markets(&CancellationToken::new()).await.unwrap();
        assert_eq!(warmed, 2);
        assert_eq!(f.source.market_calls(), 2);

        let hot: Vec<Ticker> = f.cache.get(&KeyBuilder::default().hot_markets()).await.unwrap();
        let hot: Vec<&str> = hot.iter().map(|t| t.as_str()).collect();
        assert_eq!(hot, vec!["KXBTC-1", "KXNBA-1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn overviews_cover_every_category() {
        let f = fixture(CacheWarmerConfig::default());
        let warmed = f
            .warmer
            .warm_category_overviews(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(warmed, CategoryName::ALL.len());

        let key = KeyBuilder::default().category_overview(CategoryName::Crypto);
        let overview: market_core::CategoryOverview = f.cache.get(&key).await.unwrap();
        assert_eq!(overview.total_markets, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_pass_stops_early() {
        let f = fixture(CacheWarmerConfig::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = f.warmer.warm_category_overviews(&cancel).await;
        assert_eq!(result, Err(MarketError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn loops_warm_on_start_and_stop_on_shutdown() {
        let f = fixture(CacheWarmerConfig::default());
        let handle = Arc::clone(&f.warmer).start(CancellationToken::new());

        tokio::time::sleep(Duration::from_secs(5)).await;
        let categories = KeyBuilder::default().category_list();
        assert!(f.cache.get_raw(&categories).await.is_some());
        assert!(f.source.market_calls() > 0);

        assert!(handle.shutdown(Duration::from_secs(1)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn on_demand_category_refresh() {
        let f = fixture(CacheWarmerConfig::default());
        let count = f
            .warmer
            .warm_markets_by_category(CategoryName::Crypto, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(f.source.list_calls(), 1);
    }
}

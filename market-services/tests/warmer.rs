//! A worker process warming the store that API processes read from

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use market_core::{CategoryName, MarketResult, MarketStatus, Ticker};
use market_kalshi::{KalshiMarket, KalshiOrderbook, KalshiTrade, MarketDataSource};
use market_services::{
    CacheAside, CacheStore, CacheTtls, CacheWarmer, CacheWarmerConfig, CategoryRepository,
    DistributedLock, KeyBuilder, KeyValueStore, LockConfig, MarketRepository, MemoryStore,
    RateBudget, RequestCoalescer,
};
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct CountingSource {
    listings: AtomicUsize,
    markets: AtomicUsize,
}

fn market(ticker: &str, category: CategoryName, volume_24h: i64) -> KalshiMarket {
    let now = Utc::now();
    KalshiMarket {
        ticker: ticker.to_string(),
        title: format!("{} market", ticker),
        status: Some("open".to_string()),
        open_time: Some(now - chrono::Duration::hours(1)),
        close_time: Some(now + chrono::Duration::days(14)),
        yes_bid: Some(30),
        yes_ask: Some(34),
        volume_24h: Some(volume_24h),
        category: Some(category.as_str().to_lowercase()),
        ..Default::default()
    }
}

#[async_trait]
impl MarketDataSource for CountingSource {
    async fn fetch_markets(
        &self,
        category: CategoryName,
        _status: Option<MarketStatus>,
    ) -> MarketResult<Vec<KalshiMarket>> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        Ok(match category {
            CategoryName::Economics => vec![
                market("KXCPI-1", category, 900),
                market("KXFED-1", category, 50),
            ],
            CategoryName::Sports => vec![market("KXNFL-1", category, 400)],
            _ => Vec::new(),
        })
    }

    async fn fetch_market(&self, ticker: &Ticker) -> MarketResult<KalshiMarket> {
        self.markets.fetch_add(1, Ordering::SeqCst);
        Ok(market(ticker.as_str(), CategoryName::Economics, 900))
    }

    async fn fetch_order_book(&self, _ticker: &Ticker) -> MarketResult<KalshiOrderbook> {
        Ok(KalshiOrderbook::default())
    }

    async fn fetch_trades(&self, _ticker: &Ticker, _limit: u32) -> MarketResult<Vec<KalshiTrade>> {
        Ok(Vec::new())
    }
}

struct Process {
    markets: Arc<MarketRepository>,
    categories: Arc<CategoryRepository>,
    cache: CacheStore,
}

fn process(store: Arc<dyn KeyValueStore>, source: Arc<CountingSource>) -> Process {
    let keys = KeyBuilder::default();
    let cache = CacheStore::new(Arc::clone(&store));
    let lock = DistributedLock::new(store, keys.clone(), LockConfig::default());
    let coalescer = Arc::new(RequestCoalescer::new(cache.clone(), lock));
    let aside = CacheAside::new(cache.clone(), Some(coalescer), CancellationToken::new());

    let markets = Arc::new(MarketRepository::new(
        source,
        aside.clone(),
        keys.clone(),
        CacheTtls::default(),
    ));
    let categories = Arc::new(CategoryRepository::new(
        Arc::clone(&markets),
        aside,
        keys,
        CacheTtls::default(),
    ));

    Process {
        markets,
        categories,
        cache,
    }
}

#[tokio::test(start_paused = true)]
async fn api_reads_what_the_worker_warmed() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let source = Arc::new(CountingSource::default());

    let worker = process(Arc::clone(&store), Arc::clone(&source));
    let warmer = Arc::new(CacheWarmer::new(
        worker.markets,
        worker.categories,
        Arc::new(RateBudget::per_minute(6000, "warmer")),
        worker.cache,
        KeyBuilder::default(),
        CacheWarmerConfig {
            hot_markets_count: 2,
            ..Default::default()
        },
    ));

    let shutdown = CancellationToken::new();
    let handle = Arc::clone(&warmer).start(shutdown.clone());
    tokio::time::sleep(Duration::from_secs(30)).await;

    let listings = source.listings.load(Ordering::SeqCst);
    let lookups = source.markets.load(Ordering::SeqCst);
    assert!(listings > 0);
    assert_eq!(lookups, 2);

    let api = process(store, Arc::clone(&source));
    let cpi = Ticker::new("KXCPI-1").unwrap();
    let market = api.markets.get_by_ticker(&cpi).await.unwrap();
    assert_eq!(market.volume_24h, 900);

    let overview = api.categories.get_overview(CategoryName::Economics).await.unwrap();
    assert_eq!(overview.total_markets, 2);

    let (page, total) = api
        .markets
        .list_by_category(CategoryName::Sports, None, 1, 20)
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(page[0].ticker.as_str(), "KXNFL-1");

    // Served entirely from the warmed store
    assert_eq!(source.listings.load(Ordering::SeqCst), listings);
    assert_eq!(source.markets.load(Ordering::SeqCst), lookups);

    shutdown.cancel();
    assert!(handle.shutdown(Duration::from_secs(5)).await);
}

#[tokio::test(start_paused = true)]
async fn hot_markets_refresh_on_schedule() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let source = Arc::new(CountingSource::default());
    let worker = process(store, Arc::clone(&source));
    let config = CacheWarmerConfig {
        hot_markets_count: 1,
        ..Default::default()
    };
    let interval = config.hot_markets_interval;
    let warmer = Arc::new(CacheWarmer::new(
        worker.markets,
        worker.categories,
        Arc::new(RateBudget::per_minute(6000, "warmer")),
        worker.cache,
        KeyBuilder::default(),
        config,
    ));

    let handle = warmer.start(CancellationToken::new());
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(source.markets.load(Ordering::SeqCst), 1);

    tokio::time::sleep(interval).await;
    assert_eq!(source.markets.load(Ordering::SeqCst), 2);

    assert!(handle.shutdown(Duration::from_secs(5)).await);
}

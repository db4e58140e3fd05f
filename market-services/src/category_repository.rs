//! Category list and overview metrics, cache-aside

use std::sync::Arc;

use market_core::{Category, CategoryName, CategoryOverview, Market, MarketError, MarketResult};
use rust_decimal::Decimal;
use tracing::{debug, info, instrument};

use crate::cache_aside::CacheAside;
use crate::keys::KeyBuilder;
use crate::market_repository::{CacheTtls, MarketRepository};

/// Markets considered when computing an overview
pub const OVERVIEW_SAMPLE_LIMIT: usize = 1000;

pub struct CategoryRepository {
    markets: Arc<MarketRepository>,
    cache: CacheAside,
    keys: KeyBuilder,
    ttls: CacheTtls,
}

impl CategoryRepository {
    pub fn new(markets: Arc<MarketRepository>, cache: CacheAside, keys: KeyBuilder, ttls: CacheTtls) -> Self {
        Self {
            markets,
            cache,
            keys,
            ttls,
        }
    }

    /// Every supported category
    #[instrument(skip(self))]
    pub async fn get_all(&self) -> MarketResult<Vec<Category>> {
        let key = self.keys.category_list();
        self.cache
            .get_or_fetch(&key, self.ttls.category_list, || async { Ok(self.build_categories().await) })
            .await
    }

    /// A single category by name; unknown names are `NotFound`
    pub async fn get_by_name(&self, name: &str) -> MarketResult<Category> {
        let wanted: CategoryName = name
            .parse()
            .map_err(|_| MarketError::not_found(format!("category {}", name)))?;

        self.get_all()
            .await?
            .into_iter()
            .find(|c| c.name == wanted)
            .ok_or_else(|| MarketError::not_found(format!("category {}", name)))
    }

    /// Overview for a category, recomputed when the cached copy has expired
    #[instrument(skip(self))]
    pub async fn get_overview(&self, category: CategoryName) -> MarketResult<CategoryOverview> {
        let key = self.keys.category_overview(category);

        if let Some(overview) = self.cache.cache().get::<CategoryOverview>(&key).await {
            if overview.is_fresh() {
                return Ok(overview);
            }
            debug!("Discarding expired overview for {}", category);
            self.cache.cache().delete(&key).await;
        }

        self.cache
            .get_or_fetch(&key, self.ttls.category_overview, || self.compute_overview(category))
            .await
    }

    pub async fn save_overview(&self, overview: &CategoryOverview) {
        let key = self.keys.category_overview(overview.category);
        self.cache
            .cache()
            .set(&key, overview, self.ttls.category_overview)
            .await;
    }

    /// Recompute and store an overview without consulting the cache
    #[instrument(skip(self))]
    pub async fn refresh_overview(&self, category: CategoryName) -> MarketResult<CategoryOverview> {
        let overview = self.compute_overview(category).await?;
        self.save_overview(&overview).await;
        Ok(overview)
    }

    /// Rebuild and store the category list
    pub async fn refresh_all(&self) -> MarketResult<Vec<Category>> {
        let key = self.keys.category_list();
        let categories = self
            .cache
            .fetch_and_store(&key, self.ttls.category_list, || async { Ok(self.build_categories().await) })
            .await?;
        info!("Refreshed {} categories", categories.len());
        Ok(categories)
    }

    /// Static category metadata; counts come from whichever listings are cached
    async fn build_categories(&self) -> Vec<Category> {
        let mut categories = Vec::with_capacity(CategoryName::ALL.len());
        for name in CategoryName::ALL {
            let mut category = Category::new(name);
            let listing = self
                .cache
                .cache()
                .get::<Vec<Market>>(&self.keys.market_list(name))
                .await;
            if let Some(markets) = listing {
                category.update_market_count(markets.len() as u64);
            }
            categories.push(category);
        }
        categories
    }

    async fn compute_overview(&self, category: CategoryName) -> MarketResult<CategoryOverview> {
        let markets = self.markets.list_all_by_category(category).await?;
        let sample = &markets[..markets.len().min(OVERVIEW_SAMPLE_LIMIT)];

        let total_volume: i64 = sample
            .iter()
            .map(|m| m.volume_24h.max(0))
            .fold(0i64, |acc, v| acc.saturating_add(v));
        let total_liquidity: Decimal = sample.iter().map(|m| Decimal::from(m.liquidity.max(0))).sum();
        let average_liquidity = if sample.is_empty() {
            Decimal::ZERO
        } else {
            total_liquidity / Decimal::from(sample.len())
        };

        debug!(
            "Computed overview for {}: {} markets, volume {}",
            category,
            markets.len(),
            total_volume
        );

        CategoryOverview::new(
            category,
            markets.len() as u64,
            total_volume,
            average_liquidity,
            0,
            self.ttls.category_overview,
        )
    }
}

impl std::fmt::Debug for CategoryRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CategoryRepository").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache_store::CacheStore;
    use crate::store::MemoryStore;
    use crate::testing::FakeSource;
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn repositories(source: Arc<FakeSource>) -> (Arc<MarketRepository>, CategoryRepository, CacheStore) {
        let cache = CacheStore::new(Arc::new(MemoryStore::new()));
        let aside = CacheAside::new(cache.clone(), None, CancellationToken::new());
        let markets = Arc::new(MarketRepository::new(
            source,
            aside.clone(),
            KeyBuilder::default(),
            CacheTtls::default(),
        ));
        let categories = CategoryRepository::new(
            Arc::clone(&markets),
            aside,
            KeyBuilder::default(),
            CacheTtls::default(),
        );
        (markets, categories, cache)
    }

    #[tokio::test(start_paused = true)]
    async fn lists_every_category() {
        let (_, repo, _) = repositories(Arc::new(FakeSource::default()));
        let all = repo.get_all().await.unwrap();
        assert_eq!(all.len(), 10);
        assert!(all.iter().any(|c| c.name == CategoryName::Crypto));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_category_is_not_found() {
        let (_, repo, _) = repositories(Arc::new(FakeSource::default()));
        assert!(matches!(repo.get_by_name("weather").await, Err(MarketError::NotFound(_))));
        assert_eq!(repo.get_by_name("politics").await.unwrap().name, CategoryName::Politics);
    }

    #[tokio::test(start_paused = true)]
    async fn overview_aggregates_listing() {
        let source = Arc::new(FakeSource::with_markets(
            CategoryName::Economics,
            &[("KXCPI-1", 100), ("KXCPI-2", 300)],
        ));
        let (_, repo, _) = repositories(source.clone());

        let overview = repo.get_overview(CategoryName::Economics).await.unwrap();
        assert_eq!(overview.total_markets, 2);
        assert_eq!(overview.total_volume_24h, 400);
        assert_eq!(overview.average_liquidity, dec!(2000));
        assert_eq!(overview.active_traders_24h, 0);

        repo.get_overview(CategoryName::Economics).await.unwrap();
        assert_eq!(source.list_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_category_has_zero_average() {
        let (_, repo, _) = repositories(Arc::new(FakeSource::default()));
        let overview = repo.get_overview(CategoryName::Health).await.unwrap();
        assert_eq!(overview.total_markets, 0);
        assert_eq!(overview.average_liquidity, Decimal::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_overview_is_recomputed() {
        let source = Arc::new(FakeSource::with_markets(CategoryName::Sports, &[("KXNBA-1", 5)]));
        let (_, repo, cache) = repositories(source.clone());

        let now = chrono::Utc::now();
        let stale = CategoryOverview::from_parts(
            CategoryName::Sports,
            99,
            1,
            Decimal::ONE,
            0,
            now - chrono::Duration::minutes(20),
            now - chrono::Duration::minutes(10),
        )
        .unwrap();
        cache
            .set(
                &KeyBuilder::default().category_overview(CategoryName::Sports),
                &stale,
                Duration::from_secs(600),
            )
            .await;

        let overview = repo.get_overview(CategoryName::Sports).await.unwrap();
        assert_eq!(overview.total_markets, 1);
        assert!(overview.is_fresh());
    }

    #[tokio::test(start_paused = true)]
    async fn category_counts_follow_cached_listings() {
        let source = Arc::new(FakeSource::with_markets(
            CategoryName::Crypto,
            &[("KXBTC-1", 1), ("KXETH-1", 1)],
        ));
        let (markets, repo, _) = repositories(source);

        markets.list_all_by_category(CategoryName::Crypto).await.unwrap();
        let all = repo.refresh_all().await.unwrap();
        let crypto = all.iter().find(|c| c.name == CategoryName::Crypto).unwrap();
        assert_eq!(crypto.market_count, 2);
    }
}

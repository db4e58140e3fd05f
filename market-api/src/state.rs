//! Component wiring shared by the API server and the worker

use std::sync::Arc;

use market_core::MarketResult;
use market_kalshi::{KalshiClient, KalshiClientConfig, MarketDataSource};
use market_services::{
    CacheAside, CacheStore, CacheTtls, CacheWarmer, CacheWarmerConfig, CategoryRepository,
    CategoryService, DistributedLock, KeyBuilder, KeyValueStore, LockConfig, MarketDetailsService,
    MarketListService, MarketRepository, MemoryStore, RateBudget, RateLimiter, RedisStore,
    RequestCoalescer,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::auth::{CredentialValidator, JwtValidator};
use crate::config::AppConfig;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub market_list: Arc<MarketListService>,
    pub market_details: Arc<MarketDetailsService>,
    pub categories: Arc<CategoryService>,
    pub rate_limiter: RateLimiter,
    /// None when no signing secret is configured
    pub validator: Option<Arc<dyn CredentialValidator>>,
    pub require_auth: bool,
    pub store: Arc<dyn KeyValueStore>,
}

/// Everything built from one configuration
pub struct Components {
    pub state: AppState,
    pub market_repository: Arc<MarketRepository>,
    pub category_repository: Arc<CategoryRepository>,
    pub cache: CacheStore,
    pub keys: KeyBuilder,
}

impl Components {
    pub fn build(
        config: &AppConfig,
        store: Arc<dyn KeyValueStore>,
        source: Arc<dyn MarketDataSource>,
        in_flight: CancellationToken,
    ) -> Self {
        let keys = KeyBuilder::new(config.cache_namespace.clone());
        let cache = CacheStore::new(Arc::clone(&store));
        let ttls = CacheTtls::default();

        let coalescer = config.coalesce_upstream.then(|| {
            let lock = DistributedLock::new(Arc::clone(&store), keys.clone(), LockConfig::default());
            Arc::new(RequestCoalescer::new(cache.clone(), lock))
        });
        if coalescer.is_none() {
            info!("Upstream request coalescing disabled");
        }
        let aside = CacheAside::new(cache.clone(), coalescer, in_flight);

        let market_repository = Arc::new(MarketRepository::new(
            source,
            aside.clone(),
            keys.clone(),
            ttls.clone(),
        ));
        let category_repository = Arc::new(CategoryRepository::new(
            Arc::clone(&market_repository),
            aside,
            keys.clone(),
            ttls,
        ));

        let validator = config
            .jwt_secret
            .as_deref()
            .map(|secret| Arc::new(JwtValidator::new(secret)) as Arc<dyn CredentialValidator>);
        if validator.is_none() {
            warn!("JWT_SECRET not set - all callers are rate limited as unauthenticated");
        }

        let state = AppState {
            market_list: Arc::new(MarketListService::new(Arc::clone(&market_repository))),
            market_details: Arc::new(MarketDetailsService::new(Arc::clone(&market_repository))),
            categories: Arc::new(CategoryService::new(Arc::clone(&category_repository))),
            rate_limiter: RateLimiter::new(Arc::clone(&store), keys.clone(), config.rate_limits),
            validator,
            require_auth: config.require_auth,
            store,
        };

        Self {
            state,
            market_repository,
            category_repository,
            cache,
            keys,
        }
    }

    /// A cache warmer over these repositories, paced by the worker budget
    pub fn warmer(&self, config: &AppConfig) -> CacheWarmer {
        CacheWarmer::new(
            Arc::clone(&self.market_repository),
            Arc::clone(&self.category_repository),
            Arc::new(RateBudget::per_minute(config.worker_rate_per_minute, "warmer")),
            self.cache.clone(),
            self.keys.clone(),
            CacheWarmerConfig {
                hot_markets_count: config.hot_market_count,
                ..Default::default()
            },
        )
    }
}

/// Redis when configured, otherwise an in-process store
pub async fn connect_store(config: &AppConfig) -> MarketResult<Arc<dyn KeyValueStore>> {
    match &config.redis_url {
        Some(url) => {
            let store = RedisStore::connect(url).await?;
            info!("Connected to Redis");
            Ok(Arc::new(store))
        }
        None => {
            warn!("REDIS_URL not set - using in-process store; cache, locks and limits are not shared");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

pub fn kalshi_client(config: &AppConfig) -> MarketResult<KalshiClient> {
    let client = KalshiClient::new(KalshiClientConfig {
        base_url: config.kalshi_base_url.clone(),
        api_key: config.kalshi_api_key.clone(),
        ..Default::default()
    })?;
    info!(
        "Kalshi client ready ({}, {})",
        client.base_url(),
        if client.is_authenticated() { "authenticated" } else { "public" }
    );
    Ok(client)
}

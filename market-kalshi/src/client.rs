//! Kalshi API client
//!
//! Provides the read-only market data endpoints the gateway depends on,
//! with bounded retries for transient failures.

use crate::types::{
    KalshiErrorResponse, KalshiMarket, KalshiOrderbook, KalshiTrade, MarketResponse,
    MarketsResponse, OrderbookResponse, SeriesListResponse, TradesResponse,
};
use async_trait::async_trait;
use market_core::{CategoryName, MarketError, MarketResult, MarketStatus, Ticker};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Base URL for Kalshi API
pub const KALSHI_API_BASE: &str = "https://api.elections.kalshi.com/trade-api/v2";

/// Series queried per category; the /series endpoint can return hundreds
const MAX_SERIES_PER_CATEGORY: usize = 10;

/// Page size for per-series market listings
const MARKETS_PAGE_LIMIT: u32 = 100;

/// The upstream collaborator the repositories read through
///
/// Implementations return raw wire payloads; mapping into domain types
/// happens at the caching layer.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// List markets for a category, optionally filtered by status
    async fn fetch_markets(
        &self,
        category: CategoryName,
        status: Option<MarketStatus>,
    ) -> MarketResult<Vec<KalshiMarket>>;

    async fn fetch_market(&self, ticker: &Ticker) -> MarketResult<KalshiMarket>;

    async fn fetch_order_book(&self, ticker: &Ticker) -> MarketResult<KalshiOrderbook>;

    async fn fetch_trades(&self, ticker: &Ticker, limit: u32) -> MarketResult<Vec<KalshiTrade>>;
}

/// Exponential backoff policy for retryable responses (5xx, 429, transport errors)
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Delay before the given retry (1-based)
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let mut backoff = self.initial_backoff;
        for _ in 1..retry {
            backoff = backoff.saturating_mul(self.multiplier).min(self.max_backoff);
        }
        backoff.min(self.max_backoff)
    }
}

/// Configuration for [`KalshiClient`]
#[derive(Debug, Clone)]
pub struct KalshiClientConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for KalshiClientConfig {
    fn default() -> Self {
        Self {
            base_url: KALSHI_API_BASE.to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

/// Kalshi API client
#[derive(Clone)]
pub struct KalshiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    retry: RetryPolicy,
}

impl KalshiClient {
    pub fn new(config: KalshiClientConfig) -> MarketResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MarketError::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.filter(|k| !k.is_empty()),
            retry: config.retry,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_authenticated(&self) -> bool {
        self.api_key.is_some()
    }

    /// GET `url` and decode the JSON body, retrying transient failures
    ///
    /// 404 maps to NotFound; other 4xx responses fail immediately.
    async fn get_json<T: DeserializeOwned>(&self, url: &str, what: &str) -> MarketResult<T> {
        let mut last_error = MarketError::upstream(format!("no attempt made to fetch {}", what));

        for attempt in 0..self.retry.max_attempts {
            if attempt > 0 {
                let backoff = self.retry.backoff_for(attempt);
                debug!("Retrying {} in {:?} (attempt {})", what, backoff, attempt + 1);
                tokio::time::sleep(backoff).await;
            }

            let mut request = self.client.get(url).header("Accept", "application/json");
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    last_error = MarketError::upstream(format!("Failed to fetch {}: {}", what, e));
                    continue;
                }
            };

            let status = response.status();
            if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                warn!("Kalshi returned {} for {}", status, what);
                last_error = MarketError::upstream(format!("Kalshi API error ({}) for {}", status, what));
                continue;
            }

            if status == StatusCode::NOT_FOUND {
                return Err(MarketError::not_found(what.to_string()));
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = match serde_json::from_str::<KalshiErrorResponse>(&body) {
                    Ok(err) if !err.error.message.is_empty() => {
                        format!("{} (code: {})", err.error.message, err.error.code)
                    }
                    _ => body,
                };
                return Err(MarketError::upstream(format!(
                    "Kalshi API error ({}): {}",
                    status, message
                )));
            }

            return response
                .json::<T>()
                .await
                .map_err(|e| MarketError::upstream(format!("Failed to parse {}: {}", what, e)));
        }

        Err(MarketError::upstream(format!(
            "max retries exceeded: {}",
            last_error
        )))
    }

    /// Series tickers belonging to a category (case-insensitive match)
    #[instrument(skip(self))]
    async fn series_for_category(&self, category: CategoryName) -> MarketResult<Vec<String>> {
        let url = format!("{}/series?category={}", self.base_url, category.display_name());

        let response: SeriesListResponse = self.get_json(&url, "series").await?;

        let tickers: Vec<String> = response
            .series
            .into_iter()
            .filter(|s| {
                s.category
                    .as_deref()
                    .is_some_and(|c| c.eq_ignore_ascii_case(category.as_str()))
            })
            .map(|s| s.ticker)
            .collect();

        debug!("Found {} Kalshi series for {}", tickers.len(), category);
        Ok(tickers)
    }
}

#[async_trait]
impl MarketDataSource for KalshiClient {
    /// Markets for the first few series of a category
    ///
    /// A failing series is logged and skipped rather than failing the listing.
    #[instrument(skip(self))]
    async fn fetch_markets(
        &self,
        category: CategoryName,
        status: Option<MarketStatus>,
    ) -> MarketResult<Vec<KalshiMarket>> {
        let mut series = self.series_for_category(category).await?;
        series.truncate(MAX_SERIES_PER_CATEGORY);

        let mut all_markets = Vec::new();
        for series_ticker in series {
            let mut url = format!(
                "{}/markets?series_ticker={}&limit={}",
                self.base_url, series_ticker, MARKETS_PAGE_LIMIT
            );
            if let Some(s) = status {
                url.push_str(&format!("&status={}", s.as_str()));
            }

            debug!("Fetching Kalshi markets for series: {}", series_ticker);

            match self.get_json::<MarketsResponse>(&url, "markets").await {
                Ok(response) => {
                    all_markets.extend(response.markets.into_iter().map(|mut m| {
                        m.category = Some(category.as_str().to_string());
                        m
                    }));
                }
                Err(e) => warn!("Skipping series {}: {}", series_ticker, e),
            }
        }

        debug!("Fetched {} Kalshi markets for {}", all_markets.len(), category);
        Ok(all_markets)
    }

    #[instrument(skip(self), fields(ticker = %ticker))]
    async fn fetch_market(&self, ticker: &Ticker) -> MarketResult<KalshiMarket> {
        let url = format!("{}/markets/{}", self.base_url, ticker);

        debug!("Fetching Kalshi market: {}", ticker);

        let response: MarketResponse = self
            .get_json(&url, &format!("market {}", ticker))
            .await?;
        Ok(response.market)
    }

    #[instrument(skip(self), fields(ticker = %ticker))]
    async fn fetch_order_book(&self, ticker: &Ticker) -> MarketResult<KalshiOrderbook> {
        let url = format!("{}/markets/{}/orderbook", self.base_url, ticker);

        debug!("Fetching Kalshi orderbook for: {}", ticker);

        let response: OrderbookResponse = self
            .get_json(&url, &format!("orderbook {}", ticker))
            .await?;
        Ok(response.orderbook)
    }

    #[instrument(skip(self), fields(ticker = %ticker))]
    async fn fetch_trades(&self, ticker: &Ticker, limit: u32) -> MarketResult<Vec<KalshiTrade>> {
        // Kalshi uses query param for ticker, not path param
        let url = format!(
            "{}/markets/trades?ticker={}&limit={}",
            self.base_url, ticker, limit
        );

        debug!("Fetching Kalshi trades for: {}", ticker);

        let response: TradesResponse = self
            .get_json(&url, &format!("trades {}", ticker))
            .await?;
        Ok(response.trades)
    }
}

impl std::fmt::Debug for KalshiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KalshiClient")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.api_key.is_some())
            .finish()
    }
}

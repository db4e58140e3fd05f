//! Market details: metadata, order book and recent trades in one view

use std::sync::Arc;

use market_core::{aggregate, AggregatedMarketView, MarketError, MarketResult, Ticker};
use serde::Serialize;
use tracing::{instrument, warn};

use crate::market_repository::MarketRepository;

/// Trades included in a details view
pub const DETAILS_TRADES_LIMIT: usize = 100;

/// Aggregated view plus one message per optional part that failed
#[derive(Debug, Clone, Serialize)]
pub struct MarketDetails {
    #[serde(flatten)]
    pub view: AggregatedMarketView,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl MarketDetails {
    pub fn is_partial(&self) -> bool {
        self.view.is_partial
    }
}

pub struct MarketDetailsService {
    markets: Arc<MarketRepository>,
}

impl MarketDetailsService {
    pub fn new(markets: Arc<MarketRepository>) -> Self {
        Self { markets }
    }

    /// Fetch the three parts concurrently
    ///
    /// The market itself is mandatory. A failed order book or trade fetch
    /// only makes the result partial.
    #[instrument(skip(self))]
    pub async fn get_details(&self, ticker: &str) -> MarketResult<MarketDetails> {
        let ticker = Ticker::new(ticker)?;

        let (market, order_book, trades) = tokio::join!(
            self.markets.get_by_ticker(&ticker),
            self.markets.get_order_book(&ticker),
            self.markets.get_recent_trades(&ticker, DETAILS_TRADES_LIMIT),
        );

        let market = market?;
        let mut errors = Vec::new();

        let order_book = order_book
            .map_err(|e| {
                warn!("Order book unavailable for {}: {}", ticker, e);
                errors.push(format!("order_book: {}", e));
            })
            .ok();
        let trades = trades
            .map_err(|e| {
                warn!("Trades unavailable for {}: {}", ticker, e);
                errors.push(format!("trades: {}", e));
            })
            .ok();

        let view = aggregate(Some(market), order_book, trades)
            .ok_or_else(|| MarketError::not_found(format!("market {}", ticker)))?;

        Ok(MarketDetails { view, errors })
    }
}

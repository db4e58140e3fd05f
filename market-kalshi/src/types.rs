//! Kalshi API response types
//!
//! These types mirror the Kalshi API responses and are converted
//! to market-core types by the repositories that cache them.

use chrono::{DateTime, Utc};
use market_core::{
    Market, MarketError, MarketResult, MarketStatus, OrderBook, OrderLevel, Price, Ticker, Trade,
    TradeSide,
};
use serde::{Deserialize, Serialize};

/// Response from GET /markets
#[derive(Debug, Clone, Deserialize)]
pub struct MarketsResponse {
    pub markets: Vec<KalshiMarket>,
    #[serde(default)]
    pub cursor: Option<String>,
}

/// Response from GET /markets/{ticker}
#[derive(Debug, Clone, Deserialize)]
pub struct MarketResponse {
    pub market: KalshiMarket,
}

/// Response from GET /series
#[derive(Debug, Clone, Deserialize)]
pub struct SeriesListResponse {
    #[serde(default)]
    pub series: Vec<KalshiSeries>,
}

/// A Kalshi series (a recurring family of events)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct KalshiSeries {
    pub ticker: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// Error body returned by Kalshi on 4xx responses
#[derive(Debug, Clone, Deserialize)]
pub struct KalshiErrorResponse {
    pub error: KalshiErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KalshiErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// A Kalshi market from the API
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct KalshiMarket {
    /// Market ticker (unique identifier)
    pub ticker: String,

    /// Event ticker this market belongs to
    #[serde(default)]
    pub event_ticker: Option<String>,

    /// Market title
    #[serde(default)]
    pub title: String,

    /// Current YES bid in cents
    #[serde(default)]
    pub yes_bid: Option<i64>,

    /// Current YES ask in cents
    #[serde(default)]
    pub yes_ask: Option<i64>,

    /// NO bid price in cents
    #[serde(default)]
    pub no_bid: Option<i64>,

    /// NO ask price in cents
    #[serde(default)]
    pub no_ask: Option<i64>,

    /// Last traded YES price in cents
    #[serde(default)]
    pub last_price: Option<i64>,

    /// Lifetime volume
    #[serde(default)]
    pub volume: Option<i64>,

    /// 24h volume
    #[serde(default)]
    pub volume_24h: Option<i64>,

    /// Resting liquidity in cents
    #[serde(default)]
    pub liquidity: Option<i64>,

    /// Market status
    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub open_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub close_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub created_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub expiration_time: Option<DateTime<Utc>>,

    /// Category, filled in by the client when listing by category
    #[serde(default)]
    pub category: Option<String>,
}

impl KalshiMarket {
    /// Map an upstream status string onto the domain status
    ///
    /// Anything unrecognised is treated as closed.
    pub fn market_status(&self) -> MarketStatus {
        match self.status.as_deref() {
            Some("open") | Some("active") => MarketStatus::Open,
            Some("settled") | Some("finalized") => MarketStatus::Settled,
            _ => MarketStatus::Closed,
        }
    }

    /// Convert to a market-core Market
    ///
    /// An invalid ticker or open/close window rejects the market; an
    /// out-of-range price falls back to zero.
    pub fn to_market(&self) -> MarketResult<Market> {
        let ticker = Ticker::new(self.ticker.as_str())?;

        let open_time = self
            .open_time
            .or(self.created_time)
            .ok_or_else(|| MarketError::invalid_input(format!("market {} has no open time", ticker)))?;
        let close_time = self
            .close_time
            .or(self.expiration_time)
            .ok_or_else(|| MarketError::invalid_input(format!("market {} has no close time", ticker)))?;

        let mut market = Market::new(
            ticker,
            self.title.clone(),
            self.category.clone().unwrap_or_default().to_uppercase(),
            open_time,
            close_time,
            self.market_status(),
        )?;

        market.yes_ask = price_or_zero(self.yes_ask);
        market.yes_bid = price_or_zero(self.yes_bid);
        market.no_ask = price_or_zero(self.no_ask);
        market.no_bid = price_or_zero(self.no_bid);
        market.last_price = price_or_zero(self.last_price);
        market.volume = self.volume.unwrap_or(0);
        market.volume_24h = self.volume_24h.unwrap_or(0);
        market.liquidity = self.liquidity.unwrap_or(0);

        Ok(market)
    }
}

fn price_or_zero(cents: Option<i64>) -> Price {
    cents.map(Price::or_zero).unwrap_or(Price::ZERO)
}

/// Convert a listing, dropping entries that fail validation
pub fn to_markets(markets: &[KalshiMarket]) -> Vec<Market> {
    markets
        .iter()
        .filter_map(|m| match m.to_market() {
            Ok(market) => Some(market),
            Err(e) => {
                tracing::debug!("Skipping Kalshi market {}: {}", m.ticker, e);
                None
            }
        })
        .collect()
}

// ============================================================================
// Order Book Types
// ============================================================================

/// Response from GET /markets/{ticker}/orderbook
#[derive(Debug, Clone, Deserialize)]
pub struct OrderbookResponse {
    pub orderbook: KalshiOrderbook,
}

/// Kalshi orderbook structure
///
/// Kalshi returns resting bids for each outcome as `[price_cents, quantity]`
/// pairs. A NO bid at X cents is a YES ask at `100 - X`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct KalshiOrderbook {
    #[serde(default)]
    pub yes: Option<Vec<Vec<i64>>>,
    #[serde(default)]
    pub no: Option<Vec<Vec<i64>>>,
}

impl KalshiOrderbook {
    /// Convert to a YES-side market-core OrderBook, best price first
    ///
    /// Malformed levels and out-of-range prices are skipped.
    pub fn to_order_book(&self, ticker: &Ticker, timestamp: DateTime<Utc>) -> OrderBook {
        let mut bids: Vec<OrderLevel> = self
            .yes
            .iter()
            .flatten()
            .filter(|level| level.len() >= 2)
            .filter_map(|level| Price::new(level[0]).ok().map(|p| OrderLevel::new(p, level[1])))
            .collect();
        bids.sort_by(|a, b| b.price.cmp(&a.price));

        let mut asks: Vec<OrderLevel> = self
            .no
            .iter()
            .flatten()
            .filter(|level| level.len() >= 2)
            .filter_map(|level| {
                Price::new(Price::MAX_CENTS - level[0])
                    .ok()
                    .map(|p| OrderLevel::new(p, level[1]))
            })
            .collect();
        asks.sort_by(|a, b| a.price.cmp(&b.price));

        OrderBook::new(ticker.clone(), timestamp, bids, asks)
    }
}

// ============================================================================
// Trade History Types
// ============================================================================

/// Response from GET /markets/trades
#[derive(Debug, Clone, Deserialize)]
pub struct TradesResponse {
    pub trades: Vec<KalshiTrade>,
    #[serde(default)]
    pub cursor: Option<String>,
}

/// A single Kalshi trade
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct KalshiTrade {
    #[serde(default)]
    pub trade_id: Option<String>,

    #[serde(default)]
    pub ticker: Option<String>,

    /// YES price in cents
    #[serde(default)]
    pub yes_price: Option<i64>,

    /// Number of contracts traded
    #[serde(default)]
    pub count: Option<i64>,

    #[serde(default)]
    pub created_time: Option<DateTime<Utc>>,

    /// Taker side ("yes"/"no", or "buy"/"sell")
    #[serde(default)]
    pub taker_side: Option<String>,
}

impl KalshiTrade {
    pub fn trade_side(&self) -> TradeSide {
        match self.taker_side.as_deref() {
            Some("no") | Some("sell") => TradeSide::Sell,
            _ => TradeSide::Buy,
        }
    }

    /// Convert to a market-core Trade; `fallback` is used when the trade omits its ticker
    pub fn to_trade(&self, fallback: &Ticker) -> MarketResult<Trade> {
        let ticker = match self.ticker.as_deref() {
            Some(t) => Ticker::new(t)?,
            None => fallback.clone(),
        };
        let price = Price::new(self.yes_price.unwrap_or(0))?;

        Ok(Trade {
            ticker,
            trade_id: self.trade_id.clone().unwrap_or_default(),
            price,
            quantity: self.count.unwrap_or(0),
            side: self.trade_side(),
            timestamp: self.created_time.unwrap_or_else(Utc::now),
        })
    }
}

/// Convert a trade list, dropping entries with an invalid ticker or price
pub fn to_trades(trades: &[KalshiTrade], ticker: &Ticker) -> Vec<Trade> {
    trades.iter().filter_map(|t| t.to_trade(ticker).ok()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn wire_market(ticker: &str) -> KalshiMarket {
        let now = Utc::now();
        KalshiMarket {
            ticker: ticker.to_string(),
            title: "Will it rain?".to_string(),
            open_time: Some(now - Duration::days(1)),
            close_time: Some(now + Duration::days(1)),
            status: Some("active".to_string()),
            yes_bid: Some(44),
            yes_ask: Some(46),
            last_price: Some(250),
            volume_24h: Some(1_000),
            category: Some("Climate".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn market_prices_fall_back_to_zero() {
        let market = wire_market("KXRAIN-25").to_market().unwrap();
        assert_eq!(market.yes_bid.cents(), 44);
        assert_eq!(market.last_price, Price::ZERO);
        assert_eq!(market.status, MarketStatus::Open);
        assert_eq!(market.category, "CLIMATE");
    }

    #[test]
    fn unknown_status_maps_to_closed() {
        let mut wire = wire_market("KXRAIN-25");
        wire.status = Some("paused".to_string());
        assert_eq!(wire.market_status(), MarketStatus::Closed);
        wire.status = Some("finalized".to_string());
        assert_eq!(wire.market_status(), MarketStatus::Settled);
    }

    #[test]
    fn listing_skips_invalid_markets() {
        let mut bad_window = wire_market("KXBAD-1");
        bad_window.close_time = bad_window.open_time;

        let markets = to_markets(&[wire_market("KXRAIN-25"), wire_market("lower-case"), bad_window]);
        assert_eq!(markets.len(), 1);
        assert_eq!(markets[0].ticker.as_str(), "KXRAIN-25");
    }

    #[test]
    fn order_book_derives_asks_from_no_bids() {
        let wire = KalshiOrderbook {
            yes: Some(vec![vec![40, 10], vec![42, 5], vec![7]]),
            no: Some(vec![vec![55, 3], vec![50, 8], vec![120, 1]]),
        };
        let ticker = Ticker::new("KXRAIN-25").unwrap();
        let book = wire.to_order_book(&ticker, Utc::now());

        assert_eq!(book.bids.len(), 2);
        assert_eq!(book.best_bid().unwrap().cents(), 42);
        assert_eq!(book.asks.len(), 2);
        assert_eq!(book.best_ask().unwrap().cents(), 45);
        assert_eq!(book.spread(), 3);
    }

    #[test]
    fn trade_side_mapping() {
        let ticker = Ticker::new("KXRAIN-25").unwrap();
        let mut wire = KalshiTrade {
            trade_id: Some("t-1".to_string()),
            yes_price: Some(45),
            count: Some(3),
            taker_side: Some("no".to_string()),
            ..Default::default()
        };
        assert_eq!(wire.to_trade(&ticker).unwrap().side, TradeSide::Sell);

        wire.taker_side = Some("yes".to_string());
        let trade = wire.to_trade(&ticker).unwrap();
        assert_eq!(trade.side, TradeSide::Buy);
        assert_eq!(trade.ticker, ticker);

        wire.yes_price = Some(101);
        assert!(to_trades(&[wire], &ticker).is_empty());
    }
}

//! Market data structures for Kalshi prediction markets

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{MarketError, MarketResult};

/// Kalshi tickers are upper-case alphanumeric with hyphens
static TICKER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9\-]+$").expect("ticker pattern is valid"));

// ============================================================================
// Value Objects
// ============================================================================

/// A contract price in cents, always within `0..=100`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Price(u8);

impl Price {
    pub const ZERO: Price = Price(0);
    pub const MAX_CENTS: i64 = 100;

    /// Create a price, rejecting anything outside `0..=100` cents
    pub fn new(cents: i64) -> MarketResult<Self> {
        if cents < 0 {
            return Err(MarketError::invalid_input(format!(
                "price cannot be negative: {}",
                cents
            )));
        }
        if cents > Self::MAX_CENTS {
            return Err(MarketError::invalid_input(format!(
                "price cannot exceed 100 cents: {}",
                cents
            )));
        }
        Ok(Price(cents as u8))
    }

    /// Like [`Price::new`], but out-of-range input becomes zero
    pub fn or_zero(cents: i64) -> Self {
        Self::new(cents).unwrap_or(Price::ZERO)
    }

    pub fn cents(&self) -> i64 {
        i64::from(self.0)
    }

    /// Implied probability (0.00 - 1.00)
    pub fn probability(&self) -> Decimal {
        Decimal::from(self.0) / Decimal::from(100)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl TryFrom<i64> for Price {
    type Error = MarketError;

    fn try_from(cents: i64) -> Result<Self, Self::Error> {
        Price::new(cents)
    }
}

impl From<Price> for i64 {
    fn from(price: Price) -> Self {
        price.cents()
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}¢", self.0)
    }
}

/// A validated market ticker (e.g. "KXBTC-25DEC31-B100000")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    pub fn new(value: impl Into<String>) -> MarketResult<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(MarketError::invalid_input("ticker cannot be empty"));
        }
        if !TICKER_PATTERN.is_match(&value) {
            return Err(MarketError::invalid_input(format!(
                "invalid ticker format: {}",
                value
            )));
        }
        Ok(Ticker(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Ticker {
    type Error = MarketError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ticker::new(value)
    }
}

impl From<Ticker> for String {
    fn from(ticker: Ticker) -> Self {
        ticker.0
    }
}

impl FromStr for Ticker {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ticker::new(s)
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Ticker {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Market
// ============================================================================

/// Status of a prediction market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketStatus {
    /// Market is open for trading
    Open,
    /// Market is closed but not yet settled
    Closed,
    /// Market has been settled with a final outcome
    Settled,
}

impl MarketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketStatus::Open => "open",
            MarketStatus::Closed => "closed",
            MarketStatus::Settled => "settled",
        }
    }
}

impl fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarketStatus {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(MarketStatus::Open),
            "closed" => Ok(MarketStatus::Closed),
            "settled" => Ok(MarketStatus::Settled),
            other => Err(MarketError::invalid_input(format!(
                "unknown market status: {}",
                other
            ))),
        }
    }
}

/// A Kalshi prediction market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub ticker: Ticker,
    pub title: String,
    /// Upper-case category name the market was listed under (may be empty)
    pub category: String,
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub status: MarketStatus,
    pub yes_ask: Price,
    pub yes_bid: Price,
    pub no_ask: Price,
    pub no_bid: Price,
    pub last_price: Price,
    /// Lifetime volume in contracts
    pub volume: i64,
    pub volume_24h: i64,
    pub liquidity: i64,
    pub last_updated: DateTime<Utc>,
}

impl Market {
    /// Create a market with zeroed prices and volumes
    ///
    /// Fails unless `open_time < close_time`.
    pub fn new(
        ticker: Ticker,
        title: impl Into<String>,
        category: impl Into<String>,
        open_time: DateTime<Utc>,
        close_time: DateTime<Utc>,
        status: MarketStatus,
    ) -> MarketResult<Self> {
        if open_time >= close_time {
            return Err(MarketError::invalid_input(format!(
                "market {} opens at {} which is not before its close at {}",
                ticker, open_time, close_time
            )));
        }

        Ok(Self {
            ticker,
            title: title.into(),
            category: category.into(),
            open_time,
            close_time,
            status,
            yes_ask: Price::ZERO,
            yes_bid: Price::ZERO,
            no_ask: Price::ZERO,
            no_bid: Price::ZERO,
            last_price: Price::ZERO,
            volume: 0,
            volume_24h: 0,
            liquidity: 0,
            last_updated: Utc::now(),
        })
    }

    pub fn is_open(&self) -> bool {
        self.status == MarketStatus::Open
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.status, MarketStatus::Closed | MarketStatus::Settled)
    }
}

// ============================================================================
// Order Book Types
// ============================================================================

/// A single price level in the order book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLevel {
    pub price: Price,
    pub quantity: i64,
}

impl OrderLevel {
    pub fn new(price: Price, quantity: i64) -> Self {
        Self { price, quantity }
    }
}

/// Order book snapshot for a market
///
/// Levels keep the order they were constructed in; the first level of each
/// side is treated as the best price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    pub ticker: Ticker,
    pub timestamp: DateTime<Utc>,
    pub bids: Vec<OrderLevel>,
    pub asks: Vec<OrderLevel>,
}

impl OrderBook {
    pub fn new(
        ticker: Ticker,
        timestamp: DateTime<Utc>,
        bids: Vec<OrderLevel>,
        asks: Vec<OrderLevel>,
    ) -> Self {
        Self {
            ticker,
            timestamp,
            bids,
            asks,
        }
    }

    /// Best ask minus best bid in cents; 0 when crossed or either side is empty
    pub fn spread(&self) -> i64 {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) if ask > bid => ask.cents() - bid.cents(),
            _ => 0,
        }
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.asks.first().map(|l| l.price)
    }

    pub fn bid_depth(&self) -> i64 {
        self.bids.iter().map(|l| l.quantity).sum()
    }

    pub fn ask_depth(&self) -> i64 {
        self.asks.iter().map(|l| l.quantity).sum()
    }

    pub fn total_depth(&self) -> i64 {
        self.bid_depth() + self.ask_depth()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

// ============================================================================
// Trade Types
// ============================================================================

/// Side of a trade (from the taker's perspective)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "buy",
            TradeSide::Sell => "sell",
        }
    }
}

/// A single executed trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub ticker: Ticker,
    pub trade_id: String,
    pub price: Price,
    pub quantity: i64,
    pub side: TradeSide,
    pub timestamp: DateTime<Utc>,
}

impl Trade {
    /// Notional value in cents (price * quantity)
    pub fn value(&self) -> i64 {
        self.price.cents() * self.quantity
    }

    pub fn is_buy(&self) -> bool {
        self.side == TradeSide::Buy
    }
}

//! Composite market view built from metadata, order book and trades

use serde::{Deserialize, Serialize};

use crate::market::{Market, OrderBook, Trade};

/// A market together with whichever companion data could be loaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMarketView {
    pub market: Market,
    pub order_book: Option<OrderBook>,
    pub trades: Option<Vec<Trade>>,
    /// True when the order book is missing or there are no trades
    pub is_partial: bool,
}

impl AggregatedMarketView {
    pub fn has_order_book(&self) -> bool {
        self.order_book.is_some()
    }

    pub fn has_trades(&self) -> bool {
        self.trades.as_ref().is_some_and(|t| !t.is_empty())
    }

    pub fn is_complete(&self) -> bool {
        !self.is_partial
    }
}

/// Combine the three sources into one view
///
/// Metadata is mandatory: without a market there is no view at all. A missing
/// order book, or missing/empty trades, yields a partial view.
pub fn aggregate(
    market: Option<Market>,
    order_book: Option<OrderBook>,
    trades: Option<Vec<Trade>>,
) -> Option<AggregatedMarketView> {
    let market = market?;

    let is_partial = order_book.is_none() || trades.as_ref().map_or(true, |t| t.is_empty());

    Some(AggregatedMarketView {
        market,
        order_book,
        trades,
        is_partial,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{MarketStatus, OrderLevel, Price, Ticker, TradeSide};
    use chrono::{Duration, Utc};

    fn market() -> Market {
        let now = Utc::now();
        Market::new(
            Ticker::new("KXTEST-1").unwrap(),
            "Test market",
            "SCIENCE",
            now - Duration::days(1),
            now + Duration::days(1),
            MarketStatus::Open,
        )
        .unwrap()
    }

    fn order_book() -> OrderBook {
        OrderBook::new(
            Ticker::new("KXTEST-1").unwrap(),
            Utc::now(),
            vec![OrderLevel::new(Price::new(40).unwrap(), 10)],
            vec![OrderLevel::new(Price::new(42).unwrap(), 7)],
        )
    }

    fn trade(id: &str) -> Trade {
        Trade {
            ticker: Ticker::new("KXTEST-1").unwrap(),
            trade_id: id.to_string(),
            price: Price::new(41).unwrap(),
            quantity: 2,
            side: TradeSide::Buy,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn missing_market_means_no_view() {
        assert!(aggregate(None, Some(order_book()), Some(vec![trade("t1")])).is_none());
        assert!(aggregate(None, None, None).is_none());
    }

    #[test]
    fn missing_order_book_and_empty_trades_is_partial() {
        let view = aggregate(Some(market()), None, Some(vec![])).unwrap();
        assert!(view.is_partial);
        assert!(!view.has_order_book());
        assert!(!view.has_trades());
    }

    #[test]
    fn missing_trades_is_partial() {
        let view = aggregate(Some(market()), Some(order_book()), None).unwrap();
        assert!(view.is_partial);
    }

    #[test]
    fn all_sources_present_is_complete() {
        let view = aggregate(
            Some(market()),
            Some(order_book()),
            Some(vec![trade("t1"), trade("t2")]),
        )
        .unwrap();
        assert!(!view.is_partial);
        assert!(view.is_complete());
    }
}

//! In-memory market source for unit tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use market_core::{CategoryName, MarketError, MarketResult, MarketStatus, Ticker};
use market_kalshi::{KalshiMarket, KalshiOrderbook, KalshiTrade, MarketDataSource};
use parking_lot::Mutex;

#[derive(Default)]
pub struct FakeSource {
    markets: Mutex<Vec<(CategoryName, KalshiMarket)>>,
    trade_count: AtomicUsize,
    fail_books: AtomicBool,
    fail_trades: AtomicBool,
    list_calls: AtomicUsize,
    market_calls: AtomicUsize,
    book_calls: AtomicUsize,
    trade_calls: AtomicUsize,
}

impl FakeSource {
    pub fn with_markets(category: CategoryName, markets: &[(&str, i64)]) -> Self {
        let source = Self::default();
        source.add_markets(category, markets);
        source
    }

    pub fn add_markets(&self, category: CategoryName, markets: &[(&str, i64)]) {
        let now = Utc::now();
        let mut guard = self.markets.lock();
        for (ticker, volume) in markets {
            guard.push((
                category,
                KalshiMarket {
                    ticker: ticker.to_string(),
                    title: format!("Market {}", ticker),
                    status: Some("active".to_string()),
                    open_time: Some(now - Duration::days(1)),
                    close_time: Some(now + Duration::days(30)),
                    yes_bid: Some(40),
                    yes_ask: Some(45),
                    volume_24h: Some(*volume),
                    liquidity: Some(volume * 10),
                    category: Some(category.as_str().to_string()),
                    ..Default::default()
                },
            ));
        }
    }

    pub fn set_status(&self, ticker: &str, status: &str) {
        for (_, market) in self.markets.lock().iter_mut() {
            if market.ticker == ticker {
                market.status = Some(status.to_string());
            }
        }
    }

    pub fn set_trade_count(&self, count: usize) {
        self.trade_count.store(count, Ordering::SeqCst);
    }

    pub fn fail_order_books(&self) {
        self.fail_books.store(true, Ordering::SeqCst);
    }

    pub fn fail_trades(&self) {
        self.fail_trades.store(true, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn market_calls(&self) -> usize {
        self.market_calls.load(Ordering::SeqCst)
    }

    pub fn book_calls(&self) -> usize {
        self.book_calls.load(Ordering::SeqCst)
    }

    pub fn trade_calls(&self) -> usize {
        self.trade_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketDataSource for FakeSource {
    async fn fetch_markets(
        &self,
        category: CategoryName,
        status: Option<MarketStatus>,
    ) -> MarketResult<Vec<KalshiMarket>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .markets
            .lock()
            .iter()
            .filter(|(c, _)| *c == category)
            .map(|(_, m)| m.clone())
            .filter(|m| status.map_or(true, |s| m.market_status() == s))
            .collect())
    }

    async fn fetch_market(&self, ticker: &Ticker) -> MarketResult<KalshiMarket> {
        self.market_calls.fetch_add(1, Ordering::SeqCst);
        self.markets
            .lock()
            .iter()
            .find(|(_, m)| m.ticker == ticker.as_str())
            .map(|(_, m)| m.clone())
            .ok_or_else(|| MarketError::not_found(format!("market {}", ticker)))
    }

    async fn fetch_order_book(&self, _ticker: &Ticker) -> MarketResult<KalshiOrderbook> {
        self.book_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_books.load(Ordering::SeqCst) {
            return Err(MarketError::upstream("orderbook unavailable"));
        }
        Ok(KalshiOrderbook {
            yes: Some(vec![vec![40, 100], vec![38, 50]]),
            no: Some(vec![vec![55, 80]]),
        })
    }

    async fn fetch_trades(&self, ticker: &Ticker, limit: u32) -> MarketResult<Vec<KalshiTrade>> {
        self.trade_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_trades.load(Ordering::SeqCst) {
            return Err(MarketError::upstream("trades unavailable"));
        }
        let count = self.trade_count.load(Ordering::SeqCst).min(limit as usize);
        Ok((0..count)
            .map(|i| KalshiTrade {
                trade_id: Some(format!("t-{}", i)),
                ticker: Some(ticker.as_str().to_string()),
                yes_price: Some(42),
                count: Some(10),
                created_time: Some(Utc::now()),
                taker_side: Some("yes".to_string()),
            })
            .collect())
    }
}

//! Cache key naming
//!
//! Keys follow `{namespace}:{family}:{kind}:{identifier}`.

use market_core::{CategoryName, RateLimitTier, Ticker};

pub const DEFAULT_NAMESPACE: &str = "kalshi";

#[derive(Debug, Clone)]
pub struct KeyBuilder {
    namespace: String,
}

impl Default for KeyBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

impl KeyBuilder {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn market_list(&self, category: CategoryName) -> String {
        format!("{}:markets:list:{}", self.namespace, category)
    }

    pub fn market_metadata(&self, ticker: &Ticker) -> String {
        format!("{}:markets:metadata:{}", self.namespace, ticker)
    }

    pub fn order_book(&self, ticker: &Ticker) -> String {
        format!("{}:markets:orderbook:{}", self.namespace, ticker)
    }

    pub fn trades(&self, ticker: &Ticker) -> String {
        format!("{}:markets:trades:{}", self.namespace, ticker)
    }

    /// Tickers the warmer last judged hottest
    pub fn hot_markets(&self) -> String {
        format!("{}:markets:hot", self.namespace)
    }

    pub fn category_overview(&self, category: CategoryName) -> String {
        format!("{}:categories:overview:{}", self.namespace, category)
    }

    pub fn category_list(&self) -> String {
        format!("{}:categories:list", self.namespace)
    }

    pub fn rate_limit_counter(&self, identifier: &str, tier: RateLimitTier) -> String {
        format!("{}:ratelimit:counter:{}:{}", self.namespace, identifier, tier)
    }

    pub fn coalesce_lock(&self, resource: &str) -> String {
        format!("{}:lock:coalesce:{}", self.namespace, resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced() {
        let keys = KeyBuilder::default();
        let ticker = Ticker::new("KXRAIN-25").unwrap();

        assert_eq!(keys.market_list(CategoryName::Climate), "kalshi:markets:list:CLIMATE");
        assert_eq!(keys.market_metadata(&ticker), "kalshi:markets:metadata:KXRAIN-25");
        assert_eq!(keys.order_book(&ticker), "kalshi:markets:orderbook:KXRAIN-25");
        assert_eq!(keys.trades(&ticker), "kalshi:markets:trades:KXRAIN-25");
        assert_eq!(keys.category_overview(CategoryName::Crypto), "kalshi:categories:overview:CRYPTO");
        assert_eq!(keys.category_list(), "kalshi:categories:list");
        assert_eq!(
            keys.rate_limit_counter("user-1", RateLimitTier::Authenticated),
            "kalshi:ratelimit:counter:user-1:authenticated"
        );
        assert_eq!(
            keys.coalesce_lock("kalshi:markets:metadata:KXRAIN-25"),
            "kalshi:lock:coalesce:kalshi:markets:metadata:KXRAIN-25"
        );
    }

    #[test]
    fn namespace_is_configurable() {
        let keys = KeyBuilder::new("staging");
        assert_eq!(keys.category_list(), "staging:categories:list");
        assert_eq!(keys.hot_markets(), "staging:markets:hot");
    }
}

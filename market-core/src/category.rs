//! Market categories and their pre-computed overview metrics

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{MarketError, MarketResult};

/// The fixed set of Kalshi categories served by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CategoryName {
    Economics,
    Politics,
    Sports,
    Climate,
    Science,
    Technology,
    Entertainment,
    Finance,
    Health,
    Crypto,
}

impl CategoryName {
    pub const ALL: [CategoryName; 10] = [
        CategoryName::Economics,
        CategoryName::Politics,
        CategoryName::Sports,
        CategoryName::Climate,
        CategoryName::Science,
        CategoryName::Technology,
        CategoryName::Entertainment,
        CategoryName::Finance,
        CategoryName::Health,
        CategoryName::Crypto,
    ];

    /// Canonical upper-case name, as used in cache keys and upstream queries
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryName::Economics => "ECONOMICS",
            CategoryName::Politics => "POLITICS",
            CategoryName::Sports => "SPORTS",
            CategoryName::Climate => "CLIMATE",
            CategoryName::Science => "SCIENCE",
            CategoryName::Technology => "TECHNOLOGY",
            CategoryName::Entertainment => "ENTERTAINMENT",
            CategoryName::Finance => "FINANCE",
            CategoryName::Health => "HEALTH",
            CategoryName::Crypto => "CRYPTO",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            CategoryName::Economics => "Economics",
            CategoryName::Politics => "Politics",
            CategoryName::Sports => "Sports",
            CategoryName::Climate => "Climate",
            CategoryName::Science => "Science",
            CategoryName::Technology => "Technology",
            CategoryName::Entertainment => "Entertainment",
            CategoryName::Finance => "Finance",
            CategoryName::Health => "Health",
            CategoryName::Crypto => "Crypto",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            CategoryName::Economics => "Economic indicators and market predictions",
            CategoryName::Politics => "Political events and election outcomes",
            CategoryName::Sports => "Sports events and championship predictions",
            CategoryName::Climate => "Climate and environmental event predictions",
            CategoryName::Science => "Scientific discoveries and research outcomes",
            CategoryName::Technology => "Technology trends and product launches",
            CategoryName::Entertainment => "Entertainment industry events and awards",
            CategoryName::Finance => "Financial markets and company performance",
            CategoryName::Health => "Public health outcomes and medical advances",
            CategoryName::Crypto => "Cryptocurrency and blockchain predictions",
        }
    }
}

impl fmt::Display for CategoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CategoryName {
    type Err = MarketError;

    /// Case-insensitive, surrounding whitespace ignored
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase();
        if normalized.is_empty() {
            return Err(MarketError::invalid_input("category name cannot be empty"));
        }

        CategoryName::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| {
                MarketError::invalid_input(format!(
                    "category '{}' is not a supported Kalshi category",
                    normalized
                ))
            })
    }
}

/// A logical grouping of markets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub name: CategoryName,
    pub display_name: String,
    pub description: String,
    pub market_count: u64,
    pub last_updated: DateTime<Utc>,
}

impl Category {
    pub fn new(name: CategoryName) -> Self {
        Self {
            name,
            display_name: name.display_name().to_string(),
            description: name.description().to_string(),
            market_count: 0,
            last_updated: Utc::now(),
        }
    }

    pub fn update_market_count(&mut self, count: u64) {
        self.market_count = count;
        self.last_updated = Utc::now();
    }

    pub fn is_empty(&self) -> bool {
        self.market_count == 0
    }
}

/// Aggregate metrics for one category, valid until `expires_at`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryOverview {
    pub category: CategoryName,
    pub total_markets: u64,
    pub total_volume_24h: i64,
    pub average_liquidity: Decimal,
    /// Not derivable from upstream data; always 0 today
    pub active_traders_24h: u64,
    pub computed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CategoryOverview {
    /// Build an overview computed now and expiring after `ttl`
    pub fn new(
        category: CategoryName,
        total_markets: u64,
        total_volume_24h: i64,
        average_liquidity: Decimal,
        active_traders_24h: u64,
        ttl: Duration,
    ) -> MarketResult<Self> {
        let computed_at = Utc::now();
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| MarketError::invalid_input(format!("overview ttl out of range: {}", e)))?;

        Self::from_parts(
            category,
            total_markets,
            total_volume_24h,
            average_liquidity,
            active_traders_24h,
            computed_at,
            computed_at + ttl,
        )
    }

    /// Build an overview from explicit timestamps, validating every invariant
    pub fn from_parts(
        category: CategoryName,
        total_markets: u64,
        total_volume_24h: i64,
        average_liquidity: Decimal,
        active_traders_24h: u64,
        computed_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> MarketResult<Self> {
        if total_volume_24h < 0 {
            return Err(MarketError::invalid_input("total volume cannot be negative"));
        }
        if average_liquidity.is_sign_negative() && !average_liquidity.is_zero() {
            return Err(MarketError::invalid_input(
                "average liquidity cannot be negative",
            ));
        }
        if computed_at >= expires_at {
            return Err(MarketError::invalid_input(
                "computed time must be before expiry time",
            ));
        }

        Ok(Self {
            category,
            total_markets,
            total_volume_24h,
            average_liquidity,
            active_traders_24h,
            computed_at,
            expires_at,
        })
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_fresh(&self) -> bool {
        !self.is_expired_at(Utc::now())
    }

    pub fn time_until_expiry(&self) -> chrono::Duration {
        let remaining = self.expires_at - Utc::now();
        remaining.max(chrono::Duration::zero())
    }

    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.computed_at
    }
}

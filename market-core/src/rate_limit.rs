//! Rate limit tiers and decisions

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MarketError;

/// Length of every tier's fixed window
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Caller classes with their own request allowance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitTier {
    /// Callers presenting a valid credential
    Authenticated,
    /// Anonymous callers, keyed by client address
    Unauthenticated,
    /// Background workers
    Worker,
}

impl RateLimitTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitTier::Authenticated => "authenticated",
            RateLimitTier::Unauthenticated => "unauthenticated",
            RateLimitTier::Worker => "worker",
        }
    }

    /// Requests per window when not overridden by configuration
    pub fn default_max_requests(&self) -> u64 {
        match self {
            RateLimitTier::Authenticated => 100,
            RateLimitTier::Unauthenticated => 10,
            RateLimitTier::Worker => 80,
        }
    }

    pub fn window(&self) -> Duration {
        RATE_LIMIT_WINDOW
    }
}

impl fmt::Display for RateLimitTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RateLimitTier {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authenticated" => Ok(RateLimitTier::Authenticated),
            "unauthenticated" => Ok(RateLimitTier::Unauthenticated),
            "worker" => Ok(RateLimitTier::Worker),
            other => Err(MarketError::invalid_input(format!(
                "invalid rate limit tier: {}",
                other
            ))),
        }
    }
}

/// Outcome of one rate limit check
///
/// Carries everything the transport needs for its limit/remaining/reset
/// response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    /// Build a decision from the counter value after increment
    pub fn from_count(count: u64, limit: u64, ttl_remaining: Duration, now: DateTime<Utc>) -> Self {
        let reset_in = chrono::Duration::from_std(ttl_remaining).unwrap_or_else(|_| chrono::Duration::zero());
        Self {
            allowed: count <= limit,
            limit,
            remaining: limit.saturating_sub(count),
            reset_at: now + reset_in,
        }
    }
}

//! Process configuration from the environment

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use market_core::{MarketError, MarketResult};
use market_kalshi::KALSHI_API_BASE;
use market_services::TierLimits;

use crate::logging::LogFormat;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_port: u16,
    pub shutdown_grace: Duration,
    /// Unset means an in-process store, which only works for a single instance
    pub redis_url: Option<String>,
    pub cache_namespace: String,
    pub kalshi_base_url: String,
    pub kalshi_api_key: Option<String>,
    /// Unset means every caller is rate limited as unauthenticated
    pub jwt_secret: Option<String>,
    /// Reject `/api/v1` requests without a valid bearer token
    pub require_auth: bool,
    pub rate_limits: TierLimits,
    pub coalesce_upstream: bool,
    pub hot_market_count: usize,
    pub worker_rate_per_minute: u32,
    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn from_env() -> MarketResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source; blank values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> MarketResult<Self> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let defaults = TierLimits::default();

        let jwt_secret = get("JWT_SECRET");
        let require_auth = parse_bool(&get, "REQUIRE_AUTH", false)?;
        if require_auth && jwt_secret.is_none() {
            return Err(MarketError::config("REQUIRE_AUTH is set but JWT_SECRET is not"));
        }

        Ok(Self {
            server_port: parse(&get, "SERVER_PORT", 8080)?,
            shutdown_grace: Duration::from_secs(parse(&get, "SHUTDOWN_GRACE_SECS", 30)?),
            redis_url: get("REDIS_URL"),
            cache_namespace: get("CACHE_NAMESPACE").unwrap_or_else(|| "kalshi".to_string()),
            kalshi_base_url: get("KALSHI_API_BASE_URL").unwrap_or_else(|| KALSHI_API_BASE.to_string()),
            kalshi_api_key: get("KALSHI_API_KEY"),
            jwt_secret,
            require_auth,
            rate_limits: TierLimits {
                authenticated: parse(&get, "RATE_LIMIT_AUTHENTICATED", defaults.authenticated)?,
                unauthenticated: parse(&get, "RATE_LIMIT_UNAUTHENTICATED", defaults.unauthenticated)?,
                worker: parse(&get, "RATE_LIMIT_WORKER", defaults.worker)?,
            },
            coalesce_upstream: parse_bool(&get, "COALESCE_UPSTREAM", true)?,
            hot_market_count: parse(&get, "HOT_MARKET_COUNT", 20)?,
            worker_rate_per_minute: parse(&get, "WORKER_RATE_PER_MINUTE", 80)?,
            log_format: parse(&get, "LOG_FORMAT", LogFormat::Text)?,
        })
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> MarketResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    match get(name) {
        Some(raw) => raw
            .parse()
            .map_err(|e| MarketError::config(format!("{}={:?}: {}", name, raw, e))),
        None => Ok(default),
    }
}

fn parse_bool(get: &impl Fn(&str) -> Option<String>, name: &str, default: bool) -> MarketResult<bool> {
    match get(name).map(|v| v.to_lowercase()).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(MarketError::config(format!("{}={:?} is not a boolean", name, other))),
    }
}

/// Load `.env.local`, then `.env`; a missing file is not an error
pub fn load_dotenv() {
    for file in [".env.local", ".env"] {
        if let Err(e) = dotenvy::from_filename(file) {
            if !e.not_found() {
                eprintln!("Warning: Failed to load {}: {}", file, e);
            }
        }
    }
}

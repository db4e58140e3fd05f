//! Error types for the gateway

use thiserror::Error;

/// Gateway-wide error type
///
/// `Clone` so that one coalesced execution can hand the same error to every
/// caller that waited on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Coalescing timeout: {0}")]
    CoalescingTimeout(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MarketError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        MarketError::NotFound(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        MarketError::InvalidInput(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        MarketError::Upstream(msg.into())
    }

    pub fn coalescing_timeout(resource: impl Into<String>) -> Self {
        MarketError::CoalescingTimeout(resource.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        MarketError::Store(msg.into())
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        MarketError::Serialization(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        MarketError::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        MarketError::Internal(msg.into())
    }

    /// Whether a caller may safely retry the operation that produced this error
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            MarketError::Upstream(_)
                | MarketError::CoalescingTimeout(_)
                | MarketError::Store(_)
                | MarketError::Cancelled
        )
    }
}

impl From<serde_json::Error> for MarketError {
    fn from(e: serde_json::Error) -> Self {
        MarketError::Serialization(e.to_string())
    }
}

/// Result type alias for gateway operations
pub type MarketResult<T> = Result<T, MarketError>;

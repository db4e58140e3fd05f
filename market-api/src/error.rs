//! HTTP mapping of gateway errors

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use market_core::MarketError;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Market(#[from] MarketError),

    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited { retry_after: i64 },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

/// Error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<i64>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Market(e) => match e {
                MarketError::NotFound(_) => StatusCode::NOT_FOUND,
                MarketError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                MarketError::Upstream(_) => StatusCode::BAD_GATEWAY,
                MarketError::CoalescingTimeout(_) | MarketError::Cancelled | MarketError::Store(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                MarketError::Serialization(_) | MarketError::Config(_) | MarketError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::RateLimited { .. } => "rate_limit_exceeded",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Market(e) => match e {
                MarketError::NotFound(_) => "not_found",
                MarketError::InvalidInput(_) => "invalid_input",
                MarketError::Upstream(_) => "upstream_unavailable",
                MarketError::CoalescingTimeout(_) => "coalescing_timeout",
                MarketError::Cancelled | MarketError::Store(_) => "service_unavailable",
                _ => "internal_error",
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            debug!("Request rejected: {}", self);
        }

        let retry_after = match &self {
            ApiError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        };
        let body = ErrorResponse {
            error: self.code().to_string(),
            message: self.to_string(),
            retry_after,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let cases = [
            (MarketError::not_found("market X"), StatusCode::NOT_FOUND),
            (MarketError::invalid_input("bad page"), StatusCode::BAD_REQUEST),
            (MarketError::upstream("502"), StatusCode::BAD_GATEWAY),
            (MarketError::coalescing_timeout("k"), StatusCode::SERVICE_UNAVAILABLE),
            (MarketError::internal("boom"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
        assert_eq!(
            ApiError::RateLimited { retry_after: 0 }.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ApiError::Unauthorized("missing bearer token".into()).status(),
            StatusCode::UNAUTHORIZED
        );
    }
}

//! Per-caller rate limiting and the optional bearer token requirement
//!
//! Callers with a valid bearer token are counted by subject on the
//! authenticated tier; everyone else by client address. If the limiter's
//! store is unreachable the request is let through.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use market_core::{RateLimitDecision, RateLimitTier};
use tracing::{debug, warn};

use crate::auth::bearer_token;
use crate::error::ApiError;
use crate::state::AppState;

pub const RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const RATE_LIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let (identifier, tier) = identify(&state, &request);

    let decision = match state.rate_limiter.check_limit(&identifier, tier).await {
        Ok(decision) => decision,
        Err(e) => {
            warn!("Rate limiter unavailable, allowing request: {}", e);
            return next.run(request).await;
        }
    };

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        debug!("Rejecting {} ({}): limit of {} reached", identifier, tier, decision.limit);
        ApiError::RateLimited {
            retry_after: decision.reset_at.timestamp(),
        }
        .into_response()
    };

    apply_headers(response.headers_mut(), &decision);
    response
}

/// Reject requests without a valid bearer token
pub async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let validator = state
        .validator
        .as_ref()
        .ok_or_else(|| ApiError::Unauthorized("no credential validator configured".to_string()))?;
    let token = bearer_token(request.headers())
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;

    validator
        .validate(token)
        .map_err(|e| ApiError::Unauthorized(e.to_string()))?;

    Ok(next.run(request).await)
}

fn identify(state: &AppState, request: &Request) -> (String, RateLimitTier) {
    if let (Some(validator), Some(token)) = (&state.validator, bearer_token(request.headers())) {
        match validator.validate(token) {
            Ok(subject) => return (subject, RateLimitTier::Authenticated),
            Err(e) => debug!("Ignoring bearer token for rate limiting: {}", e),
        }
    }

    (client_ip(request), RateLimitTier::Unauthenticated)
}

/// First `X-Forwarded-For` hop, else the peer address
fn client_ip(request: &Request) -> String {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn apply_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(RATE_LIMIT_RESET, HeaderValue::from(decision.reset_at.timestamp()));
}

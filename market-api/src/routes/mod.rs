//! API route definitions

mod categories;
mod health;
mod markets;

use axum::{
    http::{header, Method},
    middleware, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::middleware::{rate_limit, require_auth};
use crate::AppState;

/// Create all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(categories::routes())
        .merge(markets::routes())
}

/// The full application: versioned API behind the rate limiter (and the
/// token check when required), plus health checks
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let mut api = api_routes().layer(middleware::from_fn_with_state(state.clone(), rate_limit));
    if state.require_auth {
        api = api.layer(middleware::from_fn_with_state(state.clone(), require_auth));
    }

    Router::new()
        .nest("/api/v1", api)
        .merge(health::routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

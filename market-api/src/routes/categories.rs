//! Category endpoints

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use market_core::{Category, CategoryOverview, Market, PageInfo};
use market_services::{MarketListQuery, DEFAULT_PAGE, DEFAULT_PAGE_LIMIT};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ApiError;
use crate::AppState;

/// Query parameters for listing a category's markets
#[derive(Debug, Deserialize)]
pub struct ListMarketsQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    /// open, closed or settled
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CategoriesResponse {
    pub data: Vec<Category>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct MarketListResponse {
    pub data: Vec<Market>,
    pub pagination: PageInfo,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories))
        .route("/categories/{name}", get(get_category))
        .route("/categories/{name}/overview", get(get_overview))
        .route("/categories/{name}/markets", get(list_markets))
}

async fn list_categories(State(state): State<AppState>) -> Result<Json<CategoriesResponse>, ApiError> {
    let data = state.categories.list_categories().await?;
    Ok(Json(CategoriesResponse {
        count: data.len(),
        data,
    }))
}

async fn get_category(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(state.categories.get_category(&name).await?))
}

async fn get_overview(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<CategoryOverview>, ApiError> {
    Ok(Json(state.categories.get_overview(&name).await?))
}

async fn list_markets(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<ListMarketsQuery>,
) -> Result<Json<MarketListResponse>, ApiError> {
    let query = MarketListQuery {
        category: name,
        page: params.page.unwrap_or(DEFAULT_PAGE),
        limit: params.limit.unwrap_or(DEFAULT_PAGE_LIMIT),
        status: params.status,
    };

    let page = state.market_list.list(&query).await?;
    info!(
        "Returning {} of {} markets for {}",
        page.markets.len(),
        page.pagination.total,
        page.category
    );

    Ok(Json(MarketListResponse {
        data: page.markets,
        pagination: page.pagination,
    }))
}

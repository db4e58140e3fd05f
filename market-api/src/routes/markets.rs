//! Market detail endpoint

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use market_core::{Market, OrderBook, OrderLevel, Price, Trade};
use market_services::MarketDetails;
use serde::Serialize;

use crate::error::ApiError;
use crate::AppState;

/// Market with its order book and recent trades
#[derive(Debug, Serialize)]
pub struct MarketDetailResponse {
    #[serde(flatten)]
    pub market: Market,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_book: Option<OrderBookResponse>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recent_trades: Vec<Trade>,
    pub is_partial: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderBookResponse {
    pub timestamp: DateTime<Utc>,
    pub bids: Vec<OrderLevel>,
    pub asks: Vec<OrderLevel>,
    pub best_bid: Option<Price>,
    pub best_ask: Option<Price>,
    pub spread: i64,
    pub bid_depth: i64,
    pub ask_depth: i64,
}

impl From<OrderBook> for OrderBookResponse {
    fn from(book: OrderBook) -> Self {
        Self {
            timestamp: book.timestamp,
            best_bid: book.best_bid(),
            best_ask: book.best_ask(),
            spread: book.spread(),
            bid_depth: book.bid_depth(),
            ask_depth: book.ask_depth(),
            bids: book.bids,
            asks: book.asks,
        }
    }
}

impl From<MarketDetails> for MarketDetailResponse {
    fn from(details: MarketDetails) -> Self {
        let view = details.view;
        Self {
            market: view.market,
            order_book: view.order_book.map(OrderBookResponse::from),
            recent_trades: view.trades.unwrap_or_default(),
            is_partial: view.is_partial,
            errors: details.errors,
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/markets/{ticker}", get(get_market))
}

/// 206 when the order book or trades could not be included
async fn get_market(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let details = state.market_details.get_details(&ticker).await?;

    let status = if details.is_partial() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };

    Ok((status, Json(MarketDetailResponse::from(details))))
}

//! Paginated market listings per category

use std::sync::Arc;

use market_core::{
    CategoryName, Market, MarketError, MarketResult, MarketStatus, PageInfo, MAX_PAGE_LIMIT,
};
use serde::Serialize;
use tracing::instrument;

use crate::market_repository::MarketRepository;

pub const DEFAULT_PAGE: usize = 1;
pub const DEFAULT_PAGE_LIMIT: usize = 20;

/// Raw listing parameters as received from a caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketListQuery {
    pub category: String,
    pub page: usize,
    pub limit: usize,
    pub status: Option<String>,
}

impl MarketListQuery {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            page: DEFAULT_PAGE,
            limit: DEFAULT_PAGE_LIMIT,
            status: None,
        }
    }

    pub fn page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketPage {
    pub category: CategoryName,
    pub markets: Vec<Market>,
    pub pagination: PageInfo,
}

pub struct MarketListService {
    markets: Arc<MarketRepository>,
}

impl MarketListService {
    pub fn new(markets: Arc<MarketRepository>) -> Self {
        Self { markets }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, query: &MarketListQuery) -> MarketResult<MarketPage> {
        let category: CategoryName = query.category.parse()?;

        if query.page < 1 {
            return Err(MarketError::invalid_input("page must be at least 1"));
        }
        if query.limit < 1 || query.limit > MAX_PAGE_LIMIT {
            return Err(MarketError::invalid_input(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_LIMIT
            )));
        }

        let status = query
            .status
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(str::parse::<MarketStatus>)
            .transpose()?;

        let (markets, total) = self
            .markets
            .list_by_category(category, status, query.page, query.limit)
            .await?;

        let pagination = PageInfo::new(query.page, query.limit, total, |page| {
            page_url(category, page, query.limit, status)
        });

        Ok(MarketPage {
            category,
            markets,
            pagination,
        })
    }
}

fn page_url(category: CategoryName, page: usize, limit: usize, status: Option<MarketStatus>) -> String {
    let mut url = format!(
        "/api/v1/categories/{}/markets?page={}&limit={}",
        category.as_str().to_lowercase(),
        page,
        limit
    );
    if let Some(status) = status {
        url.push_str("&status=");
        url.push_str(status.as_str());
    }
    url
}

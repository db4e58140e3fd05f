use std::sync::Arc;

use market_core::{Category, CategoryName, CategoryOverview, MarketResult};

use crate::category_repository::CategoryRepository;

/// Category lookups keyed by caller-supplied names
pub struct CategoryService {
    categories: Arc<CategoryRepository>,
}

impl CategoryService {
    pub fn new(categories: Arc<CategoryRepository>) -> Self {
        Self { categories }
    }

    pub async fn list_categories(&self) -> MarketResult<Vec<Category>> {
        self.categories.get_all().await
    }

    pub async fn get_category(&self, name: &str) -> MarketResult<Category> {
        self.categories.get_by_name(name).await
    }

    /// Unsupported names are rejected as invalid input before any lookup
    pub async fn get_overview(&self, name: &str) -> MarketResult<CategoryOverview> {
        let category: CategoryName = name.parse()?;
        self.categories.get_overview(category).await
    }
}

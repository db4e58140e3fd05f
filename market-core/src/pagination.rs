//! Offset/limit pagination over an in-memory listing

use serde::Serialize;

/// Largest page size a caller may request
pub const MAX_PAGE_LIMIT: usize = 100;

/// Return the 1-based `page` of `items` and the unpaginated total
///
/// Pages past the end yield an empty slice with the same total.
pub fn paginate<T: Clone>(items: &[T], page: usize, limit: usize) -> (Vec<T>, usize) {
    let total = items.len();
    let start = page.saturating_sub(1).saturating_mul(limit);
    if start >= total || limit == 0 {
        return (Vec::new(), total);
    }

    let end = start.saturating_add(limit).min(total);
    (items[start..end].to_vec(), total)
}

/// Pagination metadata for a listing response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_url: Option<String>,
}

impl PageInfo {
    /// Compute page counts; `link` renders the URL for a given page number
    pub fn new(page: usize, limit: usize, total: usize, link: impl Fn(usize) -> String) -> Self {
        let total_pages = if limit == 0 { 0 } else { total.div_ceil(limit) };

        let next_url = (page < total_pages).then(|| link(page + 1));
        let prev_url = (page > 1).then(|| link(page - 1));

        Self {
            page,
            limit,
            total,
            total_pages,
            next_url,
            prev_url,
        }
    }

    pub fn has_next(&self) -> bool {
        self.next_url.is_some()
    }
}

//! Pagination and sorting primitives for list endpoints.

use serde::{Deserialize, Serialize};

use crate::models::paging::{Direction, PagingParams};

/// Pagination query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pagination {
    pub page: Option<i64>,
    /// Also accepted as `limit`, the key generated paginator links carry.
    #[serde(alias = "limit")]
    pub per_page: Option<i64>,
    pub sort: Option<String>,
    pub direction: Option<String>,
}

impl Pagination {
    /// Maximum items per page.
    const MAX_PER_PAGE: i64 = 100;

    /// Default items per page.
    const DEFAULT_PER_PAGE: i64 = 25;

    pub fn limit(&self) -> i64 {
        self.per_page
            .unwrap_or(Self::DEFAULT_PER_PAGE)
            .clamp(1, Self::MAX_PER_PAGE)
    }

    pub fn offset(&self) -> i64 {
        (self.current_page() - 1) * self.limit()
    }

    pub fn current_page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn direction(&self) -> Direction {
        self.direction
            .as_deref()
            .map(Direction::normalize)
            .unwrap_or_default()
    }

    /// Paging state for the paginator given the total number of records.
    ///
    /// The requested page is clamped to the last page so an out-of-range
    /// request still renders sensible controls.
    pub fn paging_params(&self, total: i64, default_sort: Option<&str>) -> PagingParams {
        let per_page = self.limit();
        let page_count = (total + per_page - 1) / per_page;
        let page = self.current_page().min(page_count.max(1));
        let shown = (total - (page - 1) * per_page).clamp(0, per_page);

        let mut params = PagingParams::new(page, page_count).with_counts(total, shown, per_page);
        params.limit = self.per_page.map(|_| per_page);
        if let Some(sort) = &self.sort {
            params = params.with_sort(sort.clone(), self.direction());
        }
        if let Some(sort) = default_sort {
            params = params.with_default_sort(sort, Direction::Asc);
        }
        params
    }
}

/// Paged result envelope returned by list endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct PagedResult<T: Serialize> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl<T: Serialize> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, pagination: &Pagination) -> Self {
        let per_page = pagination.limit();
        let total_pages = (total + per_page - 1) / per_page;
        Self {
            items,
            total,
            page: pagination.current_page(),
            per_page,
            total_pages,
        }
    }
}

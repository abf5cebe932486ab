//! Pagination utilities for list endpoints (home timeline, feed, search)

use serde::Serialize;

/// Page size constant for all paginated lists
pub const PAGE_SIZE: i64 = 20;

/// Pagination metadata calculated from total results
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: i64,
    /// Total number of pages
    pub total_pages: i64,
    /// Offset for SQL LIMIT/OFFSET query
    pub offset: i64,
}

impl Pagination {
    /// Wrap one page of rows with its metadata
    pub fn into_page<T: Serialize>(self, items: Vec<T>, total_results: i64) -> Page<T> {
        Page {
            items,
            page: self.page,
            page_size: PAGE_SIZE,
            total_pages: self.total_pages,
            total_results,
        }
    }
}

/// One page of results as returned to clients
#[derive(Debug, Serialize)]
pub struct Page<T: Serialize> {
    pub items: Vec<T>,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub total_results: i64,
}

/// Calculate pagination metadata from total results and requested page
///
/// Ensures page is within valid bounds [1, total_pages]
///
/// # Examples
/// ```
/// use resonate_web::pagination::calculate_pagination;
///
/// // 45 results = 3 pages (20 + 20 + 5)
/// let p = calculate_pagination(45, 2);
/// assert_eq!(p.page, 2);
/// assert_eq!(p.total_pages, 3);
/// assert_eq!(p.offset, 20);
///
/// // Requesting out-of-bounds page gets clamped
/// let p = calculate_pagination(45, 99);
/// assert_eq!(p.page, 3);
/// assert_eq!(p.offset, 40);
/// ```
pub fn calculate_pagination(total_results: i64, requested_page: i64) -> Pagination {
    let total_pages = (total_results + PAGE_SIZE - 1) / PAGE_SIZE;
    let page = requested_page.max(1).min(total_pages.max(1));
    let offset = (page - 1) * PAGE_SIZE;

    Pagination {
        page,
        total_pages,
        offset,
    }
}

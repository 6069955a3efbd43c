//! Limit/offset pagination for execution and record listings.

use serde::{Deserialize, Serialize};

/// Default page size.
const DEFAULT_LIMIT: u64 = 25;
/// Maximum page size.
const MAX_LIMIT: u64 = 500;

/// Request parameters for paginated queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Maximum number of items returned.
    #[serde(default = "default_limit")]
    pub limit: u64,
    /// Number of items skipped.
    #[serde(default)]
    pub offset: u64,
}

impl PageRequest {
    /// Create a new page request, clamping the limit to `1..=MAX_LIMIT`.
    pub fn new(limit: u64, offset: u64) -> Self {
        Self {
            limit: limit.clamp(1, MAX_LIMIT),
            offset,
        }
    }

    /// The request for the page following this one.
    pub fn next(&self) -> Self {
        Self {
            limit: self.limit,
            offset: self.offset + self.limit,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

/// Paginated response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResponse<T> {
    /// The items on this page.
    pub items: Vec<T>,
    /// Total number of items across all pages.
    pub total: u64,
    /// Limit that produced this page.
    pub limit: u64,
    /// Offset that produced this page.
    pub offset: u64,
    /// Whether items exist past this page.
    pub has_more: bool,
}

impl<T> PageResponse<T> {
    /// Create a new paginated response.
    pub fn new(items: Vec<T>, page: &PageRequest, total: u64) -> Self {
        let has_more = page.offset + (items.len() as u64) < total;
        Self {
            items,
            total,
            limit: page.limit,
            offset: page.offset,
            has_more,
        }
    }

    /// Paginate an in-memory, already ordered collection.
    pub fn slice(all: Vec<T>, page: &PageRequest) -> Self {
        let total = all.len() as u64;
        let items: Vec<T> = all
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect();
        Self::new(items, page, total)
    }
}

fn default_limit() -> u64 {
    DEFAULT_LIMIT
}

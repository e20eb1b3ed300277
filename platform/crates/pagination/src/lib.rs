//! Offset pagination primitives shared by platform-kit services.
//!
//! Inbound `skip`/`limit` values come from untrusted query strings, so they
//! are clamped rather than rejected: a negative `skip` becomes zero and
//! `limit` is kept between one and the configured cap.
//!
//! # Examples
//!
//! ```
//! use pagination::{PageParams, MAX_PAGE_LIMIT};
//!
//! let params = PageParams::clamped(-5, 999_999, MAX_PAGE_LIMIT);
//! assert_eq!(params.skip(), 0);
//! assert_eq!(params.limit(), 1000);
//! ```

use serde::{Deserialize, Serialize};

/// Offset applied when the caller omits `skip`.
pub const DEFAULT_SKIP: i64 = 0;

/// Page size applied when the caller omits `limit`.
pub const DEFAULT_LIMIT: i64 = 100;

/// Upper bound for `limit` unless a service configures its own cap.
pub const MAX_PAGE_LIMIT: u64 = 1000;

/// Effective pagination parameters after clamping.
///
/// ## Invariants
/// - `limit` is at least one and never exceeds the cap used to build it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageParams {
    skip: u64,
    limit: u64,
}

impl PageParams {
    /// Clamp raw values against `cap`.
    ///
    /// A cap of zero is treated as one so every page can hold a row.
    #[must_use]
    pub fn clamped(skip: i64, limit: i64, cap: u64) -> Self {
        let cap = cap.max(1);
        let skip = u64::try_from(skip).unwrap_or(0);
        let limit = u64::try_from(limit).unwrap_or(1).clamp(1, cap);
        Self { skip, limit }
    }

    /// Clamp raw values against [`MAX_PAGE_LIMIT`].
    #[must_use]
    pub fn new(skip: i64, limit: i64) -> Self {
        Self::clamped(skip, limit, MAX_PAGE_LIMIT)
    }

    /// Number of rows to skip.
    #[must_use]
    pub const fn skip(&self) -> u64 {
        self.skip
    }

    /// Maximum number of rows to return.
    #[must_use]
    pub const fn limit(&self) -> u64 {
        self.limit
    }

    /// `skip` as the signed offset SQL builders expect.
    #[must_use]
    pub fn offset_i64(&self) -> i64 {
        i64::try_from(self.skip).unwrap_or(i64::MAX)
    }

    /// `limit` as the signed count SQL builders expect.
    #[must_use]
    pub fn limit_i64(&self) -> i64 {
        i64::try_from(self.limit).unwrap_or(i64::MAX)
    }
}

impl Default for PageParams {
    fn default() -> Self {
        Self::new(DEFAULT_SKIP, DEFAULT_LIMIT)
    }
}

/// Raw pagination query as sent by clients.
///
/// Missing values fall back to [`DEFAULT_SKIP`] and [`DEFAULT_LIMIT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PageQuery {
    /// Requested offset; may be negative.
    #[serde(default = "default_skip")]
    pub skip: i64,
    /// Requested page size; may exceed the cap.
    #[serde(default = "default_limit")]
    pub limit: i64,
}

const fn default_skip() -> i64 {
    DEFAULT_SKIP
}

const fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            skip: DEFAULT_SKIP,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageQuery {
    /// Clamp the query into effective parameters.
    #[must_use]
    pub fn into_params(self, cap: u64) -> PageParams {
        PageParams::clamped(self.skip, self.limit, cap)
    }
}

/// Page envelope returned by list endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Rows in this page.
    pub items: Vec<T>,
    /// Offset that produced this page.
    pub skip: u64,
    /// Page size that produced this page.
    pub limit: u64,
    /// Total number of rows when the caller counted them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

impl<T> Page<T> {
    /// Build a page from rows and the parameters used to fetch them.
    #[must_use]
    pub fn new(items: Vec<T>, params: PageParams) -> Self {
        Self {
            items,
            skip: params.skip,
            limit: params.limit,
            total: None,
        }
    }

    /// Attach the total row count.
    #[must_use]
    pub fn with_total(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }
}

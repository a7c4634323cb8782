//! Page request and page envelope primitives shared by search endpoints.
//!
//! Search payloads arrive either as JSON bodies or as query strings, so the
//! raw [`PageParams`] accept numbers and numeric strings alike. Range checks
//! happen when converting into a [`PageRequest`], which is the only type the
//! persistence layer ever sees.

use serde::{Deserialize, Deserializer, Serialize};

/// Page size applied when a request omits `pageSize`.
pub const DEFAULT_PAGE_SIZE: u32 = 20;
/// Largest page size a caller may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Errors raised while validating raw pagination parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaginationError {
    /// `page` was zero or negative.
    #[error("page must be at least 1, got {value}")]
    PageOutOfRange {
        /// The rejected value.
        value: i64,
    },
    /// `pageSize` fell outside `1..=MAX_PAGE_SIZE`.
    #[error("pageSize must be between 1 and {max}, got {value}")]
    PageSizeOutOfRange {
        /// The rejected value.
        value: i64,
        /// The configured upper bound.
        max: u32,
    },
}

impl PaginationError {
    /// Name of the offending request field, in wire casing.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::PageOutOfRange { .. } => "page",
            Self::PageSizeOutOfRange { .. } => "pageSize",
        }
    }
}

/// Unvalidated pagination parameters as supplied by a caller.
///
/// # Examples
/// ```
/// use pagination::{PageParams, PageRequest};
///
/// let params: PageParams = serde_json::from_str(r#"{"page":"2","pageSize":5}"#).unwrap();
/// let request = PageRequest::try_from(params).unwrap();
/// assert_eq!(request.offset(), 5);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageParams {
    /// One-based page index.
    #[serde(default, deserialize_with = "lenient_integer")]
    pub page: Option<i64>,
    /// Number of items per page.
    #[serde(default, alias = "page_size", deserialize_with = "lenient_integer")]
    pub page_size: Option<i64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawInteger {
    Number(i64),
    Text(String),
}

fn lenient_integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawInteger>::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(RawInteger::Number(value)) => Ok(Some(value)),
        Some(RawInteger::Text(text)) => text
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("expected an integer, got {text:?}"))),
    }
}

/// Validated page window.
///
/// ## Invariants
/// - `page >= 1`
/// - `1 <= page_size <= MAX_PAGE_SIZE`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    page: u32,
    page_size: u32,
}

impl PageRequest {
    /// Validate and build a page window.
    ///
    /// # Errors
    ///
    /// Returns [`PaginationError`] when either value is out of range.
    pub fn new(page: i64, page_size: i64) -> Result<Self, PaginationError> {
        let page = u32::try_from(page)
            .ok()
            .filter(|value| *value >= 1)
            .ok_or(PaginationError::PageOutOfRange { value: page })?;
        let page_size = u32::try_from(page_size)
            .ok()
            .filter(|value| (1..=MAX_PAGE_SIZE).contains(value))
            .ok_or(PaginationError::PageSizeOutOfRange {
                value: page_size,
                max: MAX_PAGE_SIZE,
            })?;
        Ok(Self { page, page_size })
    }

    /// One-based page index.
    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    /// Items per page.
    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Number of items skipped before this page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    /// Maximum number of items on this page.
    #[must_use]
    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl TryFrom<PageParams> for PageRequest {
    type Error = PaginationError;

    fn try_from(value: PageParams) -> Result<Self, Self::Error> {
        Self::new(
            value.page.unwrap_or(1),
            value.page_size.unwrap_or(i64::from(DEFAULT_PAGE_SIZE)),
        )
    }
}

/// One page of results together with the size of the full match set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Items inside the requested window.
    pub items: Vec<T>,
    /// Number of matching items irrespective of the window.
    pub total: u64,
}

impl<T> Page<T> {
    /// Build a page from its parts.
    #[must_use]
    pub const fn new(items: Vec<T>, total: u64) -> Self {
        Self { items, total }
    }

    /// An empty page with a zero total.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }

    /// Transform every item while keeping the total.
    #[must_use]
    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
        }
    }

    /// Slice an already filtered, ordered collection into the requested window.
    #[must_use]
    pub fn from_window(matches: Vec<T>, request: PageRequest) -> Self {
        let total = matches.len() as u64;
        let skip = usize::try_from(request.offset()).unwrap_or(usize::MAX);
        let take = usize::try_from(request.limit()).unwrap_or(usize::MAX);
        let items = matches.into_iter().skip(skip).take(take).collect();
        Self { items, total }
    }
}

/// Pagination metadata attached to response envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    /// One-based page index.
    pub page: u32,
    /// Items per page.
    pub page_size: u32,
    /// Number of matching items.
    pub total: u64,
    /// Number of pages needed to cover `total`.
    pub total_pages: u64,
}

impl PageMetadata {
    /// Describe `total` matches split by `request`.
    #[must_use]
    pub fn new(request: PageRequest, total: u64) -> Self {
        Self {
            page: request.page(),
            page_size: request.page_size(),
            total,
            total_pages: total.div_ceil(request.limit()),
        }
    }
}

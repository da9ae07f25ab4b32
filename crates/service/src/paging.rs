//! Paging and sorting negotiation.
//!
//! Turns raw query values into a [`PageRequest`]. Values arrive as the
//! strings found on the query string so that malformed input is reported
//! here, before any store call, rather than swallowed by a decoder.
//!
//! Sort entries follow the `field[,field...][,direction]` form. A trailing
//! `asc`/`desc` applies to every field of its entry:
//!
//! ```
//! use service::paging::{negotiate, PageParams, PagingLimits};
//! use storage::{Sort, SortField};
//!
//! let params = PageParams {
//!     page: Some("1".into()),
//!     size: Some("5".into()),
//!     sort: vec!["name,owner,desc".into(), "id".into()],
//! };
//! let page = negotiate(&params, &PagingLimits::default()).unwrap();
//! assert_eq!(page.page, 1);
//! assert_eq!(page.size, 5);
//! assert_eq!(
//!     page.sort,
//!     vec![
//!         Sort::desc(SortField::Name),
//!         Sort::desc(SortField::Owner),
//!         Sort::asc(SortField::Id),
//!     ]
//! );
//! ```

use std::num::IntErrorKind;

use storage::{Direction, PageRequest, Sort, SortField};
use thiserror::Error;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 2000;

/// Bounds applied to requested page sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingLimits {
    /// Size used when the request names none.
    pub default_size: u32,
    /// Larger requested sizes are clamped down to this.
    pub max_size: u32,
}

impl Default for PagingLimits {
    fn default() -> Self {
        Self {
            default_size: DEFAULT_PAGE_SIZE,
            max_size: MAX_PAGE_SIZE,
        }
    }
}

/// Raw paging parameters as received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageParams {
    pub page: Option<String>,
    pub size: Option<String>,
    /// One entry per `sort` occurrence, in order.
    pub sort: Vec<String>,
}

impl PageParams {
    /// Collect `page`, `size` and `sort` from decoded query pairs. Other keys
    /// are ignored; a repeated `page` or `size` keeps the last value.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            match key.as_ref() {
                "page" => params.page = Some(value.into()),
                "size" => params.size = Some(value.into()),
                "sort" => params.sort.push(value.into()),
                _ => {}
            }
        }
        params
    }

    /// Whether no paging parameter was supplied at all.
    pub fn is_empty(&self) -> bool {
        self.page.is_none() && self.size.is_none() && self.sort.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("page must be a non-negative integer, got {0:?}")]
    InvalidPage(String),

    #[error("size must be a positive integer, got {0:?}")]
    InvalidSize(String),

    #[error("cannot sort by {0:?}; sortable fields are id, name, owner")]
    UnknownSortField(String),

    #[error("empty field in sort {0:?}")]
    EmptySortField(String),
}

/// Validate raw parameters and build the canonical page request.
///
/// Numbers too large for their field saturate: the page to `u32::MAX`, the
/// size to the configured maximum.
pub fn negotiate(
    params: &PageParams,
    limits: &PagingLimits,
) -> Result<PageRequest, ValidationError> {
    let page = match present(&params.page) {
        None => 0,
        Some(raw) => match parse_count(raw) {
            Some(n) => u32::try_from(n).unwrap_or(u32::MAX),
            None => return Err(ValidationError::InvalidPage(raw.to_string())),
        },
    };

    let size = match present(&params.size) {
        None => limits.default_size,
        Some(raw) => match parse_count(raw) {
            Some(n) if n > 0 => u32::try_from(n.min(u64::from(limits.max_size)))
                .unwrap_or(limits.max_size),
            _ => return Err(ValidationError::InvalidSize(raw.to_string())),
        },
    };

    let mut sort = Vec::new();
    for entry in &params.sort {
        parse_sort_entry(entry, &mut sort)?;
    }

    Ok(PageRequest { page, size, sort })
}

/// Blank values count as absent.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// A non-negative integer, saturating at `u64::MAX`.
fn parse_count(raw: &str) -> Option<u64> {
    match raw.parse::<u64>() {
        Ok(n) => Some(n),
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => Some(u64::MAX),
        Err(_) => None,
    }
}

fn parse_sort_entry(entry: &str, out: &mut Vec<Sort>) -> Result<(), ValidationError> {
    if entry.trim().is_empty() {
        return Ok(());
    }

    let mut tokens: Vec<&str> = entry.split(',').map(str::trim).collect();
    let direction = match tokens.as_slice() {
        [_, .., last] => match last.parse::<Direction>() {
            Ok(direction) => {
                tokens.pop();
                direction
            }
            Err(()) => Direction::Asc,
        },
        _ => Direction::Asc,
    };

    for token in tokens {
        if token.is_empty() {
            return Err(ValidationError::EmptySortField(entry.to_string()));
        }
        let field = token
            .parse::<SortField>()
            .map_err(|()| ValidationError::UnknownSortField(token.to_string()))?;
        out.push(Sort { field, direction });
    }
    Ok(())
}

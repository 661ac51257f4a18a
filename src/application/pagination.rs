//! Numbered pagination shared by every feed.
//!
//! Feeds are addressed by a 1-based `page` query parameter. Page 1 is always
//! valid even when the scope holds no posts; any page past the last one is a
//! [`PaginationError::PageOutOfRange`].

use serde::Serialize;
use thiserror::Error;

/// Request for one numbered page of a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub number: u32,
    pub size: u32,
}

impl PageRequest {
    pub fn new(number: u32, size: u32) -> Self {
        Self { number, size }
    }

    /// Validate the request against the total row count and produce the
    /// window the repository should fetch.
    pub fn window(&self, total_items: u64) -> Result<PageWindow, PaginationError> {
        if self.number == 0 {
            return Err(PaginationError::PageOutOfRange {
                requested: self.number,
                last: total_pages(total_items, self.size),
            });
        }
        let last = total_pages(total_items, self.size);
        if self.number > last {
            return Err(PaginationError::PageOutOfRange {
                requested: self.number,
                last,
            });
        }
        Ok(PageWindow {
            limit: i64::from(self.size),
            offset: i64::from(self.number - 1) * i64::from(self.size),
        })
    }
}

/// Limit/offset pair handed to the repository layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub limit: i64,
    pub offset: i64,
}

/// One resolved page of items plus the navigation facts templates need.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, number: u32, total_items: u64, size: u32) -> Self {
        Self {
            items,
            number,
            total_items,
            total_pages: total_pages(total_items, size),
        }
    }

    pub fn empty(size: u32) -> Self {
        Self::new(Vec::new(), 1, 0, size)
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.total_pages
    }

    pub fn previous_number(&self) -> u32 {
        self.number.saturating_sub(1)
    }

    pub fn next_number(&self) -> u32 {
        self.number + 1
    }
}

/// An empty scope still renders as one empty page.
fn total_pages(total_items: u64, size: u32) -> u32 {
    if total_items == 0 {
        return 1;
    }
    let size = u64::from(size.max(1));
    let pages = total_items.div_ceil(size);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaginationError {
    #[error("page {requested} is out of range (last page is {last})")]
    PageOutOfRange { requested: u32, last: u32 },
}

//! Page-number pagination for list views

use serde::Deserialize;

use crate::error::{AppError, Result};

/// Query parameters for paginated listings
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: i64,
}

fn default_page() -> i64 {
    1
}

/// Position of one page within a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl Page {
    /// Resolve `number` against `total` items.
    ///
    /// Page 1 always exists, even for an empty listing; anything below 1 or
    /// past the last page is `NotFound`.
    pub fn new(number: i64, per_page: i64, total: i64) -> Result<Self> {
        let total_pages = ((total + per_page - 1) / per_page).max(1);
        if number < 1 || number > total_pages {
            return Err(AppError::NotFound);
        }
        Ok(Self {
            number,
            per_page,
            total_pages,
        })
    }

    pub fn offset(&self) -> i64 {
        (self.number - 1) * self.per_page
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.total_pages
    }

    pub fn previous(&self) -> i64 {
        self.number - 1
    }

    pub fn next(&self) -> i64 {
        self.number + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_bounds() {
        let page = Page::new(2, 6, 13).unwrap();
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.offset(), 6);
        assert!(page.has_previous());
        assert!(page.has_next());

        let last = Page::new(3, 6, 13).unwrap();
        assert!(!last.has_next());
    }

    #[test]
    fn test_empty_listing_has_first_page() {
        let page = Page::new(1, 6, 0).unwrap();
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.offset(), 0);
        assert!(!page.has_previous());
        assert!(!page.has_next());
    }

    #[test]
    fn test_out_of_range_is_not_found() {
        assert!(matches!(Page::new(0, 6, 10), Err(AppError::NotFound)));
        assert!(matches!(Page::new(3, 6, 12), Err(AppError::NotFound)));
    }
}

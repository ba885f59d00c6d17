//! Paging state

use serde::Deserialize;
use serde::Serialize;

use super::DataSet;
use super::QueryResult;
use crate::error::Error;

/// Page position and result size of the last successful read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    /// 1-based page number.
    pub page: usize,
    /// Rows per page.
    pub page_size: usize,
    /// Total number of matching rows across all pages.
    pub total: usize,
}

impl Paging {
    /// Creates paging state positioned on page 1 with no rows.
    pub fn new(page_size: usize) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
            total: 0,
        }
    }

    /// Returns the number of pages (at least 1).
    pub fn page_count(&self) -> usize {
        self.total.div_ceil(self.page_size).max(1)
    }

    /// Returns `true` if a page follows the current one.
    pub fn has_next(&self) -> bool {
        self.page < self.page_count()
    }

    /// Returns `true` if a page precedes the current one.
    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}

impl Default for Paging {
    fn default() -> Self {
        Self::new(10)
    }
}

impl DataSet {
    /// Returns the paging state.
    pub fn paging(&self) -> Paging {
        self.read().paging
    }

    /// Returns the total row count reported by the last read.
    pub fn total(&self) -> usize {
        self.read().paging.total
    }

    /// Loads the following page with the parameters of the last query.
    ///
    /// Returns `None` without reading when already on the last page.
    pub async fn next_page(&self) -> Result<Option<QueryResult>, Error> {
        let paging = self.paging();
        if !paging.has_next() {
            return Ok(None);
        }
        self.query_page(paging.page + 1).await.map(Some)
    }

    /// Loads the preceding page with the parameters of the last query.
    ///
    /// Returns `None` without reading when already on the first page.
    pub async fn prev_page(&self) -> Result<Option<QueryResult>, Error> {
        let paging = self.paging();
        if !paging.has_prev() {
            return Ok(None);
        }
        self.query_page(paging.page - 1).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_count() {
        let mut paging = Paging::new(10);
        assert_eq!(paging.page_count(), 1);
        paging.total = 25;
        assert_eq!(paging.page_count(), 3);
        assert!(paging.has_next());
        paging.page = 3;
        assert!(!paging.has_next());
        assert!(paging.has_prev());
    }
}

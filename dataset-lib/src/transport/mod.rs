//! Transport adapter
//!
//! Provides the [`Transport`] trait a data set reads and submits through,
//! plus [`InMemoryTransport`], a reference backend that evaluates filters,
//! sorting and paging over a local row store.

mod memory;

pub use memory::*;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

use crate::error::TransportError;
use crate::model::Row;
use crate::query::Filter;
use crate::query::OrderBy;

/// A 1-based page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: usize,
    /// Rows per page.
    pub size: usize,
}

impl PageRequest {
    /// Creates a page window. A page of 0 is treated as 1.
    pub fn new(page: usize, size: usize) -> Self {
        Self {
            page: page.max(1),
            size,
        }
    }

    /// Returns the number of rows preceding this page.
    pub fn offset(&self) -> usize {
        (self.page - 1) * self.size
    }
}

/// Parameters of a read.
///
/// `params` holds the merged query parameters (static parameters, query
/// data set values, parent link values and explicit parameters, later
/// entries overriding earlier ones).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadRequest {
    /// Page window, `None` when paging is disabled.
    pub paging: Option<PageRequest>,
    /// Merged query parameters.
    pub params: Row,
    /// Sort order.
    pub sort: Option<OrderBy>,
    /// Filter conditions, combined with AND.
    pub filters: Vec<Filter>,
}

impl ReadRequest {
    /// Creates an empty read request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page window.
    pub fn with_paging(mut self, page: usize, size: usize) -> Self {
        self.paging = Some(PageRequest::new(page, size));
        self
    }

    /// Sets the parameters.
    pub fn with_params(mut self, params: Row) -> Self {
        self.params = params;
        self
    }

    /// Sets the sort order.
    pub fn with_sort(mut self, sort: OrderBy) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Adds a filter condition.
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }
}

/// Result of a read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadResponse {
    /// The rows of the requested page.
    pub rows: Vec<Row>,
    /// Total number of matching rows across all pages, if known.
    pub total: Option<usize>,
}

impl ReadResponse {
    /// Creates a response from rows.
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows, total: None }
    }

    /// Sets the total row count.
    pub fn with_total(mut self, total: usize) -> Self {
        self.total = Some(total);
        self
    }
}

/// Backend a data set reads from and submits to.
///
/// Write operations take a batch of rows and return the stored rows in the
/// same order; returned rows are merged back into the submitted records. A
/// failed batch may carry per-row field errors keyed by the row's index in
/// the batch (see [`TransportError::reject_field`]).
///
/// Implementations own their timeouts and retries.
///
/// # Example
///
/// ```ignore
/// use dataset_lib::model::{row, Value};
/// use dataset_lib::transport::{InMemoryTransport, ReadRequest, Transport};
///
/// let transport = InMemoryTransport::new("id");
/// transport.seed([row([("id", Value::Int(1)), ("name", Value::from("Ada"))])]);
///
/// let response = transport.read(ReadRequest::new().with_paging(1, 10)).await?;
/// assert_eq!(response.total, Some(1));
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Reads a page of rows.
    async fn read(&self, request: ReadRequest) -> Result<ReadResponse, TransportError>;

    /// Persists new rows.
    async fn create(&self, rows: Vec<Row>) -> Result<Vec<Row>, TransportError>;

    /// Persists modified rows.
    async fn update(&self, rows: Vec<Row>) -> Result<Vec<Row>, TransportError>;

    /// Deletes rows.
    async fn destroy(&self, rows: Vec<Row>) -> Result<Vec<Row>, TransportError>;
}

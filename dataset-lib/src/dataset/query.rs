//! Query binding and reads

use std::sync::Arc;

use log::debug;
use log::warn;

use super::DataSet;
use super::Event;
use crate::error::Error;
use crate::model::Record;
use crate::model::RecordStatus;
use crate::model::Row;
use crate::model::Value;
use crate::query::Filter;
use crate::query::OrderBy;
use crate::transport::ReadRequest;
use crate::transport::Transport;

/// Outcome of a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryResult {
    /// The page was loaded.
    Loaded {
        /// Records now held.
        count: usize,
        /// Total matching rows across all pages.
        total: usize,
    },
    /// A newer query started before this one resolved; its response was
    /// discarded.
    Superseded,
}

impl QueryResult {
    /// Returns `true` if records were loaded.
    pub fn is_loaded(&self) -> bool {
        matches!(self, QueryResult::Loaded { .. })
    }
}

/// Query inputs folded into every read.
#[derive(Debug, Default)]
pub(crate) struct QueryState {
    /// Static parameters set through `set_query_parameter`.
    pub(crate) params: Row,
    /// Explicit parameters of the last `query()`, reused when paging.
    pub(crate) last_params: Row,
    pub(crate) sort: Option<OrderBy>,
    pub(crate) filters: Vec<Filter>,
    pub(crate) data_set: Option<DataSet>,
    /// Incremented by every read; a response is applied only if its
    /// sequence number is still the latest.
    pub(crate) seq: u64,
}

struct Prepared {
    seq: u64,
    request: ReadRequest,
}

enum Plan {
    Read(Arc<dyn Transport>, Prepared),
    /// Detail data set without a parent record: nothing to read.
    Clear(u64),
}

impl DataSet {
    // =========================================================================
    // Query binding
    // =========================================================================

    /// Binds a query data set whose current record supplies parameters to
    /// every read. A current record is created if it has none.
    pub fn bind_query(&self, query: &DataSet) -> Result<(), Error> {
        if query.current().is_none() {
            query.create(Row::new())?;
        }
        self.write().query.data_set = Some(query.clone());
        Ok(())
    }

    /// Returns the bound query data set.
    pub fn query_data_set(&self) -> Option<DataSet> {
        self.read().query.data_set.clone()
    }

    /// Returns the names of the editable (non-bound) fields of the query
    /// data set, in declaration order. Multi-language shadow fields
    /// (`__tls`) are skipped.
    pub fn query_fields(&self) -> Vec<String> {
        let Some(query) = self.query_data_set() else {
            return Vec::new();
        };
        let schema = query.schema();
        schema
            .stored_names()
            .filter(|name| !name.contains("__tls"))
            .map(String::from)
            .collect()
    }

    /// Sets a static parameter sent with every read. `Null` removes it.
    pub fn set_query_parameter(&self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        let mut inner = self.write();
        if value.is_null() {
            inner.query.params.remove(&name);
        } else {
            inner.query.params.insert(name, value);
        }
    }

    /// Returns the static parameters.
    pub fn query_parameters(&self) -> Row {
        self.read().query.params.clone()
    }

    /// Sets the sort order of the next read.
    pub fn sort_by(&self, order: OrderBy) {
        self.write().query.sort = Some(order);
    }

    /// Removes the sort order.
    pub fn clear_sort(&self) {
        self.write().query.sort = None;
    }

    /// Adds a filter condition to subsequent reads.
    pub fn filter(&self, filter: Filter) {
        self.write().query.filters.push(filter);
    }

    /// Removes every filter condition.
    pub fn clear_filters(&self) {
        self.write().query.filters.clear();
    }

    /// Resets the query data set's current record to its defaults, then
    /// reads page 1.
    pub async fn reset_query(&self) -> Result<QueryResult, Error> {
        if let Some(query) = self.query_data_set() {
            query.reset_form()?;
        }
        self.query(Row::new()).await
    }

    /// Restores the current record to its synced values, or to its defaults
    /// if it was never persisted.
    fn reset_form(&self) -> Result<(), Error> {
        let Some(id) = self.current() else {
            self.create(Row::new())?;
            return Ok(());
        };
        if self.status(id) != Some(RecordStatus::Add) {
            return self.reset(id);
        }
        self.mutate(|inner, events| {
            let fresh = Record::added(inner.id, &inner.schema, Row::new())?;
            let Some(record) = inner.record_mut(id) else {
                return Err(Error::RecordNotFound(id));
            };
            record.fields = fresh.fields;
            record.validation_errors.clear();
            events.push(Event::Reset { records: vec![id] });
            Ok(())
        })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Reads page 1 with `params` merged over the static parameters, the
    /// query data set's current values and the parent link values.
    ///
    /// Records are replaced on success; on failure they are left unchanged.
    /// If another read starts before this one resolves, this one returns
    /// [`QueryResult::Superseded`] and its response is discarded.
    pub async fn query(&self, params: Row) -> Result<QueryResult, Error> {
        self.run_query(1, Some(params)).await
    }

    /// Reads the given 1-based page with the parameters of the last query.
    pub async fn query_page(&self, page: usize) -> Result<QueryResult, Error> {
        self.run_query(page.max(1), None).await
    }

    async fn run_query(&self, page: usize, params: Option<Row>) -> Result<QueryResult, Error> {
        let (transport, prepared) = match self.prepare_read(page, params)? {
            Plan::Read(transport, prepared) => (transport, prepared),
            Plan::Clear(seq) => return Ok(self.load(seq, page, Vec::new(), Some(0), false)),
        };
        self.emit(vec![Event::Query {
            params: prepared.request.params.clone(),
        }]);

        match transport.read(prepared.request).await {
            Ok(response) => Ok(self.load(prepared.seq, page, response.rows, response.total, true)),
            Err(err) => {
                if self.read().query.seq != prepared.seq {
                    warn!("{} discarded failure of superseded read: {}", self.id(), err);
                    return Ok(QueryResult::Superseded);
                }
                warn!("{} read failed: {}", self.id(), err);
                Err(Error::QueryFailure(err))
            }
        }
    }

    fn prepare_read(&self, page: usize, explicit: Option<Row>) -> Result<Plan, Error> {
        let (seq, transport, mut params, explicit, sort, filters, query, paging) = {
            let mut inner = self.write();
            inner.query.seq += 1;
            if let Some(explicit) = explicit {
                inner.query.last_params = explicit;
            }
            let paging = inner.config.paging.then_some(inner.config.page_size);
            (
                inner.query.seq,
                inner.transport.clone(),
                inner.query.params.clone(),
                inner.query.last_params.clone(),
                inner.query.sort.clone(),
                inner.query.filters.clone(),
                inner.query.data_set.clone(),
                paging,
            )
        };

        if let Some(query) = query
            && let Some(values) = query.current_data()
        {
            params.extend(values);
        }
        match self.parent_link_values() {
            Ok(Some(links)) => params.extend(links),
            Ok(None) => {}
            Err(Error::NoCurrentRequiredParent) => {
                debug!("{} has no parent record, clearing", self.id());
                return Ok(Plan::Clear(seq));
            }
            Err(err) => return Err(err),
        }
        params.extend(explicit);

        let transport = transport.ok_or(Error::NoTransport)?;
        let mut request = ReadRequest::new().with_params(params);
        if let Some(size) = paging {
            request = request.with_paging(page, size);
        }
        request.sort = sort;
        request.filters = filters;
        debug!("{} read page {} (seq {})", self.id(), page, seq);
        Ok(Plan::Read(transport, Prepared { seq, request }))
    }

    /// Replaces the records with a read response, unless a newer read
    /// started in the meantime.
    fn load(
        &self,
        seq: u64,
        page: usize,
        rows: Vec<Row>,
        total: Option<usize>,
        allow_create: bool,
    ) -> QueryResult {
        self.mutate(|inner, events| {
            if inner.query.seq != seq {
                warn!("{} discarded superseded read (seq {} < {})", inner.id, seq, inner.query.seq);
                return QueryResult::Superseded;
            }
            let schema = Arc::clone(&inner.schema);
            let mut rows = rows;
            let returned = rows.len();
            if inner.config.paging {
                rows.truncate(inner.config.page_size);
            }
            let total = total.unwrap_or_else(|| {
                if inner.config.paging {
                    (page - 1) * inner.config.page_size + returned
                } else {
                    returned
                }
            });

            inner.records = rows
                .into_iter()
                .map(|row| Record::synced(inner.id, &schema, row))
                .collect();
            if inner.records.is_empty()
                && allow_create
                && inner.config.auto_create
                && let Ok(record) = Record::added(inner.id, &schema, Row::new())
            {
                inner.records.push(record);
            }
            inner.current = inner.records.first().map(|r| r.id);
            inner.paging.page = page;
            inner.paging.total = total;
            inner.sync_selection();

            let count = inner.records.len();
            debug!("{} loaded {} of {} record(s) on page {}", inner.id, count, total, page);
            events.push(Event::Load {
                records: inner.records.iter().map(|r| r.id).collect(),
                total,
            });
            QueryResult::Loaded { count, total }
        })
    }
}

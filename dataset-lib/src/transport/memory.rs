//! In-memory transport implementation

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use async_trait::async_trait;
use log::trace;

use super::ReadRequest;
use super::ReadResponse;
use super::Transport;
use crate::error::TransportError;
use crate::model::Row;
use crate::model::Value;

/// Transport operations, used for call accounting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Read,
    Create,
    Update,
    Destroy,
}

#[derive(Debug, Default)]
struct Store {
    rows: Vec<Row>,
    next_key: i64,
    calls: HashMap<Operation, usize>,
    failures: HashMap<Operation, TransportError>,
    last_read: Option<ReadRequest>,
}

/// A transport backed by a local row store.
///
/// Rows are identified by the primary key field. Reads treat every
/// non-null parameter as an equality condition, then apply the request's
/// filters, sort and page window. Creates assign integer keys to rows that
/// arrive without one.
///
/// Every batch is applied atomically: if one row of a batch cannot be
/// found, nothing is written.
///
/// # Example
///
/// ```
/// use dataset_lib::transport::InMemoryTransport;
///
/// let transport = InMemoryTransport::new("id");
/// assert!(transport.is_empty());
/// ```
#[derive(Debug)]
pub struct InMemoryTransport {
    primary_key: String,
    store: Mutex<Store>,
}

impl InMemoryTransport {
    /// Creates an empty store keyed by `primary_key`.
    pub fn new(primary_key: impl Into<String>) -> Self {
        Self {
            primary_key: primary_key.into(),
            store: Mutex::new(Store {
                next_key: 1,
                ..Default::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends rows to the store without counting a call.
    pub fn seed(&self, rows: impl IntoIterator<Item = Row>) {
        let mut store = self.lock();
        for row in rows {
            if let Some(Value::Int(key)) = row.get(&self.primary_key) {
                store.next_key = store.next_key.max(key + 1);
            }
            store.rows.push(row);
        }
    }

    /// Returns a snapshot of the stored rows.
    pub fn rows(&self) -> Vec<Row> {
        self.lock().rows.clone()
    }

    /// Returns the stored row with the given key.
    pub fn find(&self, key: &Value) -> Option<Row> {
        let store = self.lock();
        store
            .rows
            .iter()
            .find(|row| row.get(&self.primary_key) == Some(key))
            .cloned()
    }

    /// Returns the number of stored rows.
    pub fn len(&self) -> usize {
        self.lock().rows.len()
    }

    /// Returns `true` if no rows are stored.
    pub fn is_empty(&self) -> bool {
        self.lock().rows.is_empty()
    }

    /// Returns how many times an operation was called.
    pub fn calls(&self, operation: Operation) -> usize {
        self.lock().calls.get(&operation).copied().unwrap_or(0)
    }

    /// Returns the total number of write calls (create, update and destroy).
    pub fn write_calls(&self) -> usize {
        [Operation::Create, Operation::Update, Operation::Destroy]
            .into_iter()
            .map(|op| self.calls(op))
            .sum()
    }

    /// Returns the most recent read request.
    pub fn last_read(&self) -> Option<ReadRequest> {
        self.lock().last_read.clone()
    }

    /// Makes the next call of `operation` fail with `error`.
    pub fn fail_next(&self, operation: Operation, error: TransportError) {
        self.lock().failures.insert(operation, error);
    }

    fn begin(&self, operation: Operation) -> Result<MutexGuard<'_, Store>, TransportError> {
        let mut store = self.lock();
        *store.calls.entry(operation).or_default() += 1;
        trace!("in-memory transport {:?}", operation);
        let failure = store.failures.remove(&operation);
        match failure {
            Some(error) => Err(error),
            None => Ok(store),
        }
    }

    fn key_of<'a>(&self, row: &'a Row) -> Option<&'a Value> {
        row.get(&self.primary_key).filter(|key| !key.is_null())
    }

    fn positions(&self, store: &Store, rows: &[Row]) -> Result<Vec<usize>, TransportError> {
        rows.iter()
            .enumerate()
            .map(|(index, row)| {
                self.key_of(row)
                    .and_then(|key| {
                        store
                            .rows
                            .iter()
                            .position(|stored| stored.get(&self.primary_key) == Some(key))
                    })
                    .ok_or_else(|| {
                        TransportError::with_status(404, "Row not found").reject_field(
                            index,
                            self.primary_key.clone(),
                            "No stored row has this key.",
                        )
                    })
            })
            .collect()
    }
}

fn matches_params(row: &Row, params: &Row) -> bool {
    params
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .all(|(name, value)| {
            row.get(name)
                .and_then(|stored| stored.compare(value))
                .is_some_and(|ordering| ordering.is_eq())
        })
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn read(&self, request: ReadRequest) -> Result<ReadResponse, TransportError> {
        let mut store = self.begin(Operation::Read)?;
        let mut rows: Vec<Row> = store
            .rows
            .iter()
            .filter(|row| matches_params(row, &request.params))
            .filter(|row| request.filters.iter().all(|filter| filter.matches(row)))
            .cloned()
            .collect();
        if let Some(sort) = &request.sort {
            rows.sort_by(|a, b| sort.compare(a, b));
        }
        let total = rows.len();
        if let Some(paging) = request.paging {
            rows = rows.into_iter().skip(paging.offset()).take(paging.size).collect();
        }
        store.last_read = Some(request);
        Ok(ReadResponse::new(rows).with_total(total))
    }

    async fn create(&self, rows: Vec<Row>) -> Result<Vec<Row>, TransportError> {
        let mut store = self.begin(Operation::Create)?;
        let mut created = Vec::with_capacity(rows.len());
        for mut row in rows {
            match self.key_of(&row) {
                Some(Value::Int(key)) => store.next_key = store.next_key.max(key + 1),
                Some(_) => {}
                None => {
                    let key = store.next_key;
                    store.next_key += 1;
                    row.insert(self.primary_key.clone(), Value::Int(key));
                }
            }
            store.rows.push(row.clone());
            created.push(row);
        }
        Ok(created)
    }

    async fn update(&self, rows: Vec<Row>) -> Result<Vec<Row>, TransportError> {
        let mut store = self.begin(Operation::Update)?;
        let positions = self.positions(&store, &rows)?;
        let mut updated = Vec::with_capacity(rows.len());
        for (position, row) in positions.into_iter().zip(rows) {
            let stored = &mut store.rows[position];
            stored.extend(row);
            updated.push(stored.clone());
        }
        Ok(updated)
    }

    async fn destroy(&self, rows: Vec<Row>) -> Result<Vec<Row>, TransportError> {
        let mut store = self.begin(Operation::Destroy)?;
        let mut positions = self.positions(&store, &rows)?;
        positions.sort_unstable();
        positions.dedup();
        let mut removed: Vec<Row> = positions
            .into_iter()
            .rev()
            .map(|position| store.rows.remove(position))
            .collect();
        removed.reverse();
        Ok(removed)
    }
}

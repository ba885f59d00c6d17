//! Data sets
//!
//! A [`DataSet`] is an ordered collection of [`Record`]s sharing one
//! [`Schema`]. It owns the query, paging and selection state, orchestrates
//! create/update/destroy against a [`Transport`], and emits [`Event`]s.
//!
//! `DataSet` is a cheap-clone handle. All state lives behind one lock that
//! is never held across an `.await`, and never while another data set's
//! lock is held; listeners run after it is released.

mod cascade;
mod config;
mod events;
mod paging;
mod query;
mod selection;
mod submit;

pub use cascade::*;
pub use config::*;
pub use events::*;
pub use paging::*;
pub use query::*;
pub use selection::*;
pub use submit::*;

use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;
use std::sync::Weak;
use std::sync::atomic::AtomicBool;

use log::debug;
use log::trace;

use crate::error::Error;
use crate::error::FieldError;
use crate::model::DataSetId;
use crate::model::Record;
use crate::model::RecordId;
use crate::model::RecordStatus;
use crate::model::ResetOutcome;
use crate::model::Row;
use crate::model::Value;
use crate::schema::Schema;
use crate::transport::Transport;
use crate::validation::ValidationKind;
use crate::validation::ValidationMessage;
use crate::validation::validate_fields;
use crate::validation::validate_record;

/// Internal state for a data set.
pub(crate) struct Inner {
    pub(crate) id: DataSetId,
    pub(crate) config: DataSetConfig,
    pub(crate) schema: Arc<Schema>,
    pub(crate) transport: Option<Arc<dyn Transport>>,
    /// Records in presentation order, including those marked for deletion.
    pub(crate) records: Vec<Record>,
    pub(crate) current: Option<RecordId>,
    pub(crate) paging: Paging,
    pub(crate) selection: Selection,
    pub(crate) query: QueryState,
    pub(crate) parent: Option<ParentLink>,
    pub(crate) children: Vec<ChildBinding>,
    pub(crate) listeners: Listeners,
}

impl Inner {
    pub(crate) fn index_of(&self, id: RecordId) -> Option<usize> {
        self.records.iter().position(|r| r.id == id)
    }

    pub(crate) fn record(&self, id: RecordId) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }

    pub(crate) fn record_mut(&mut self, id: RecordId) -> Option<&mut Record> {
        self.records.iter_mut().find(|r| r.id == id)
    }

    fn live(&self) -> impl Iterator<Item = &Record> {
        self.records.iter().filter(|r| r.status != RecordStatus::Delete)
    }

    /// Picks a new current record after the record at `index` left the
    /// live set: the next live record, else the previous one.
    fn reassign_current(&mut self, index: usize) {
        let after = self.records[index..]
            .iter()
            .find(|r| r.status != RecordStatus::Delete)
            .map(|r| r.id);
        let before = self.records[..index]
            .iter()
            .rev()
            .find(|r| r.status != RecordStatus::Delete)
            .map(|r| r.id);
        self.current = after.or(before);
    }

    /// Destroys the record at `index`, moving `current` if needed.
    fn destroy_at(&mut self, index: usize) -> Record {
        let record = self.records.remove(index);
        if record.selected {
            let key = self.selection_key(&record);
            self.selection.remove(&key);
        }
        if self.current == Some(record.id) {
            self.reassign_current(index);
        }
        record
    }

    /// Revalidates `names` on the record at `index` against its peers.
    fn revalidate(&mut self, index: usize, names: &[String], external: &Row) {
        let schema = Arc::clone(&self.schema);
        let mode = self.config.validation_mode;
        let results = {
            let peers: Vec<&Record> = self.records.iter().collect();
            validate_fields(
                &schema,
                &self.records[index],
                names.iter().map(String::as_str),
                &peers,
                external,
                mode,
            )
        };
        self.records[index].apply_validation(results);
    }

    /// Rechecks `field` on peers whose value previously collided with the
    /// record at `index`.
    fn revalidate_unique_peers(&mut self, index: usize, field: &str, external: &Row) {
        let peers: Vec<usize> = self
            .records
            .iter()
            .enumerate()
            .filter(|&(i, r)| {
                i != index
                    && r.errors_for(field)
                        .iter()
                        .any(|m| m.kind == ValidationKind::UniqueConflict)
            })
            .map(|(i, _)| i)
            .collect();
        let names = [field.to_string()];
        for peer in peers {
            self.revalidate(peer, &names, external);
        }
    }
}

impl std::fmt::Debug for Inner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inner")
            .field("id", &self.id)
            .field("name", &self.config.name)
            .field("records", &self.records.len())
            .field("current", &self.current)
            .field("paging", &self.paging)
            .field("children", &self.children.len())
            .finish()
    }
}

pub(crate) struct Shared {
    state: RwLock<Inner>,
    /// Set while a submit is pending.
    submitting: AtomicBool,
}

/// An observable, ordered collection of records.
///
/// # Example
///
/// ```
/// use dataset_lib::dataset::{DataSet, DataSetConfig};
/// use dataset_lib::model::{row, RecordStatus, Value};
/// use dataset_lib::schema::{FieldDescriptor, FieldType, Schema};
///
/// let schema = Schema::new(vec![
///     FieldDescriptor::new("name", FieldType::String).required(),
///     FieldDescriptor::new("age", FieldType::Number),
/// ])
/// .unwrap();
/// let people = DataSet::new(schema, DataSetConfig::named("people"));
///
/// let id = people.create(row([("age", Value::Int(30))])).unwrap();
/// assert_eq!(people.current(), Some(id));
/// assert!(!people.validate());
///
/// people.set(id, "name", "Ada").unwrap();
/// assert!(people.validate());
/// assert_eq!(people.status(id), Some(RecordStatus::Add));
/// ```
#[derive(Clone)]
pub struct DataSet {
    shared: Arc<Shared>,
}

impl DataSet {
    /// Creates an empty data set without a transport.
    pub fn new(schema: Schema, config: DataSetConfig) -> Self {
        Self::from_parts(Arc::new(schema), config, None)
    }

    /// Creates an empty data set reading from and submitting to `transport`.
    pub fn with_transport(
        schema: Schema,
        config: DataSetConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self::from_parts(Arc::new(schema), config, Some(transport))
    }

    fn from_parts(
        schema: Arc<Schema>,
        config: DataSetConfig,
        transport: Option<Arc<dyn Transport>>,
    ) -> Self {
        let inner = Inner {
            id: DataSetId::new(),
            paging: Paging::new(config.page_size),
            config,
            schema,
            transport,
            records: Vec::new(),
            current: None,
            selection: Selection::new(),
            query: QueryState::default(),
            parent: None,
            children: Vec::new(),
            listeners: Listeners::default(),
        };
        debug!("created data set {} ({})", inner.id, inner.config.name);
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(inner),
                submitting: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.shared.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.shared.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn downgrade(&self) -> WeakDataSet {
        WeakDataSet {
            shared: Arc::downgrade(&self.shared),
        }
    }

    pub(crate) fn submitting(&self) -> &AtomicBool {
        &self.shared.submitting
    }

    /// Runs `f` under the write lock, then delivers the collected events.
    ///
    /// A change of the current record adds an `IndexChange` event and
    /// swaps detail records once the lock is released.
    pub(crate) fn mutate<R>(&self, f: impl FnOnce(&mut Inner, &mut Vec<Event>) -> R) -> R {
        let mut events = Vec::new();
        let (result, previous, current) = {
            let mut inner = self.write();
            let previous = inner.current;
            let result = f(&mut inner, &mut events);
            (result, previous, inner.current)
        };
        if previous != current {
            trace!("{} current {:?} -> {:?}", self.id(), previous, current);
            self.cascade(previous, current);
            events.push(Event::IndexChange { previous, current });
        }
        self.emit(events);
        result
    }

    /// Returns `true` if both handles refer to the same data set.
    pub fn ptr_eq(&self, other: &DataSet) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the identity of this data set.
    pub fn id(&self) -> DataSetId {
        self.read().id
    }

    /// Returns the configured name.
    pub fn name(&self) -> String {
        self.read().config.name.clone()
    }

    /// Returns the configuration.
    pub fn config(&self) -> DataSetConfig {
        self.read().config.clone()
    }

    /// Returns the shared schema.
    pub fn schema(&self) -> Arc<Schema> {
        Arc::clone(&self.read().schema)
    }

    /// Replaces the transport.
    pub fn set_transport(&self, transport: Arc<dyn Transport>) {
        self.write().transport = Some(transport);
    }

    /// Returns the number of live (not deleted) records.
    pub fn len(&self) -> usize {
        self.read().live().count()
    }

    /// Returns `true` if there are no live records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the ids of live records in order.
    pub fn ids(&self) -> Vec<RecordId> {
        self.read().live().map(|r| r.id).collect()
    }

    /// Returns a snapshot of every record, including those marked for
    /// deletion.
    pub fn records(&self) -> Vec<Record> {
        self.read().records.clone()
    }

    /// Returns a snapshot of one record.
    pub fn get(&self, id: RecordId) -> Option<Record> {
        self.read().record(id).cloned()
    }

    /// Runs `f` against a record without cloning it.
    pub fn with_record<R>(&self, id: RecordId, f: impl FnOnce(&Record) -> R) -> Option<R> {
        self.read().record(id).map(f)
    }

    /// Returns the lifecycle status of a record.
    pub fn status(&self, id: RecordId) -> Option<RecordStatus> {
        self.read().record(id).map(|r| r.status)
    }

    /// Returns the position of a record.
    pub fn index_of(&self, id: RecordId) -> Option<usize> {
        self.read().index_of(id)
    }

    /// Returns a field value, resolving bound fields (including fields
    /// bound into the parent data set).
    pub fn value(&self, id: RecordId, field: &str) -> Result<Value, Error> {
        let external = self.external_values();
        let inner = self.read();
        let record = inner.record(id).ok_or(Error::RecordNotFound(id))?;
        if !inner.schema.contains(field) && record.get(field).is_none() {
            return Err(FieldError::missing(field).into());
        }
        Ok(record.resolve(&inner.schema, field, &external))
    }

    /// Returns the declared values of every live record, bound fields
    /// included.
    pub fn data(&self) -> Vec<Row> {
        let external = self.external_values();
        let inner = self.read();
        inner
            .live()
            .map(|r| r.resolve_data(&inner.schema, &external))
            .collect()
    }

    /// Returns the validation errors of a record.
    pub fn errors(&self, id: RecordId) -> Option<Vec<(String, Vec<ValidationMessage>)>> {
        let inner = self.read();
        let record = inner.record(id)?;
        Some(
            inner
                .schema
                .names()
                .filter_map(|name| {
                    let errors = record.errors_for(name);
                    (!errors.is_empty()).then(|| (name.to_string(), errors.to_vec()))
                })
                .collect(),
        )
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Returns the current record id.
    pub fn current(&self) -> Option<RecordId> {
        self.read().current
    }

    /// Returns a snapshot of the current record.
    pub fn current_record(&self) -> Option<Record> {
        let inner = self.read();
        inner.current.and_then(|id| inner.record(id).cloned())
    }

    /// Returns the declared values of the current record, including
    /// fields bound into ancestors.
    pub fn current_data(&self) -> Option<Row> {
        let external = self.external_values();
        let inner = self.read();
        let id = inner.current?;
        Some(inner.record(id)?.resolve_data(&inner.schema, &external))
    }

    /// Makes a live record current.
    pub fn set_current(&self, id: RecordId) -> Result<(), Error> {
        self.mutate(|inner, _| {
            match inner.record(id) {
                Some(record) if record.status != RecordStatus::Delete => {}
                _ => return Err(Error::RecordNotFound(id)),
            }
            inner.current = Some(id);
            Ok(())
        })
    }

    /// Makes the live record at `index` (counting live records only)
    /// current.
    pub fn locate(&self, index: usize) -> Option<RecordId> {
        self.mutate(|inner, _| {
            let id = inner.live().nth(index).map(|r| r.id)?;
            inner.current = Some(id);
            Some(id)
        })
    }

    /// Moves to the next live record. Returns `None` at the end.
    pub fn next(&self) -> Option<RecordId> {
        self.step(1)
    }

    /// Moves to the previous live record. Returns `None` at the start.
    pub fn previous(&self) -> Option<RecordId> {
        self.step(-1)
    }

    fn step(&self, delta: isize) -> Option<RecordId> {
        self.mutate(|inner, _| {
            let live: Vec<RecordId> = inner.live().map(|r| r.id).collect();
            let target = match inner.current.and_then(|c| live.iter().position(|&id| id == c)) {
                Some(position) => position
                    .checked_add_signed(delta)
                    .and_then(|p| live.get(p))
                    .copied(),
                None => live.first().copied(),
            }?;
            inner.current = Some(target);
            Some(target)
        })
    }

    // =========================================================================
    // Editing
    // =========================================================================

    /// Writes a field of a record.
    ///
    /// The field and every field bound to it are revalidated. A no-op write
    /// emits nothing.
    pub fn set(&self, id: RecordId, field: &str, value: impl Into<Value>) -> Result<(), Error> {
        let value = value.into();
        let external = self.external_values();
        self.mutate(|inner, events| {
            let index = inner.index_of(id).ok_or(Error::RecordNotFound(id))?;
            let schema = Arc::clone(&inner.schema);
            let dependents = schema.dependents_of(field);
            let before: Vec<Value> = dependents
                .iter()
                .map(|d| inner.records[index].value(&schema, d))
                .collect();

            let selected_key = inner.selected_key_at(index);
            let Some(old) = inner.records[index].set(&schema, field, value)? else {
                return Ok(());
            };
            inner.rekey_selection(index, selected_key);
            let new = inner.records[index].value(&schema, field);
            trace!("{} set {}.{} = {}", inner.id, id, field, new);

            let mut names = Vec::with_capacity(dependents.len() + 1);
            names.push(field.to_string());
            names.extend(dependents.iter().cloned());
            inner.revalidate(index, &names, &external);
            if schema.field(field).is_some_and(|d| d.is_unique()) {
                inner.revalidate_unique_peers(index, field, &external);
            }

            events.push(Event::Update {
                record: id,
                field: field.to_string(),
                old,
                new,
            });
            for (dependent, old) in dependents.into_iter().zip(before) {
                let new = inner.records[index].value(&schema, &dependent);
                if new != old {
                    events.push(Event::Update {
                        record: id,
                        field: dependent,
                        old,
                        new,
                    });
                }
            }
            Ok(())
        })
    }

    /// Validates one record against its peers. Returns `true` if valid.
    pub fn validate_record(&self, id: RecordId) -> Result<bool, Error> {
        let external = self.external_values();
        let mut inner = self.write();
        let index = inner.index_of(id).ok_or(Error::RecordNotFound(id))?;
        let names: Vec<String> = inner.schema.names().map(String::from).collect();
        inner.revalidate(index, &names, &external);
        Ok(inner.records[index].is_valid())
    }

    /// Validates every live record. Returns `true` if all are valid.
    pub fn validate(&self) -> bool {
        let external = self.external_values();
        let mut inner = self.write();
        let schema = Arc::clone(&inner.schema);
        let mode = inner.config.validation_mode;
        let results: Vec<_> = {
            let peers: Vec<&Record> = inner.records.iter().collect();
            inner
                .records
                .iter()
                .enumerate()
                .filter(|(_, r)| r.status != RecordStatus::Delete)
                .map(|(i, r)| (i, validate_record(&schema, r, &peers, &external, mode)))
                .collect()
        };
        let mut valid = true;
        for (index, errors) in results {
            valid &= errors.is_empty();
            inner.records[index].validation_errors = errors;
        }
        valid
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Appends a new record and makes it current.
    ///
    /// Defaults are applied first, then `initial`. In a detail data set the
    /// link fields are filled from the parent's current record, which must
    /// exist.
    pub fn create(&self, initial: Row) -> Result<RecordId, Error> {
        let mut initial = initial;
        if let Some(links) = self.parent_link_values()? {
            initial.extend(links);
        }
        self.mutate(|inner, events| {
            let record = Record::added(inner.id, &inner.schema, initial)?;
            let id = record.id;
            inner.records.push(record);
            inner.current = Some(id);
            debug!("{} created {}", inner.id, id);
            events.push(Event::Create { record: id });
            Ok(id)
        })
    }

    /// Removes records.
    ///
    /// Records never persisted are destroyed immediately; the rest are
    /// marked for deletion and sent on the next submit.
    pub fn remove(&self, ids: &[RecordId]) -> Result<(), Error> {
        self.mutate(|inner, events| {
            if let Some(&missing) = ids.iter().find(|&&id| inner.index_of(id).is_none()) {
                return Err(Error::RecordNotFound(missing));
            }
            let mut removed = Vec::with_capacity(ids.len());
            for &id in ids {
                let Some(index) = inner.index_of(id) else {
                    continue;
                };
                if inner.records[index].mark_deleted() {
                    if inner.current == Some(id) {
                        inner.reassign_current(index);
                    }
                } else {
                    inner.destroy_at(index);
                }
                removed.push(id);
            }
            debug!("{} removed {} record(s)", inner.id, removed.len());
            events.push(Event::Remove { records: removed });
            Ok(())
        })
    }

    /// Removes every live record.
    pub fn remove_all(&self) -> Result<(), Error> {
        let ids = self.ids();
        if ids.is_empty() {
            return Ok(());
        }
        self.remove(&ids)
    }

    /// Reverts a pending deletion. Returns `false` if the record was not
    /// marked for deletion.
    pub fn restore(&self, id: RecordId) -> Result<bool, Error> {
        self.mutate(|inner, events| {
            let restored = inner
                .record_mut(id)
                .ok_or(Error::RecordNotFound(id))?
                .restore();
            if restored {
                if inner.current.is_none() {
                    inner.current = Some(id);
                }
                events.push(Event::Reset { records: vec![id] });
            }
            Ok(restored)
        })
    }

    /// Reverts a record to its synced values, destroying it if it was
    /// never persisted.
    pub fn reset(&self, id: RecordId) -> Result<(), Error> {
        self.mutate(|inner, events| {
            let index = inner.index_of(id).ok_or(Error::RecordNotFound(id))?;
            if inner.records[index].reset() == ResetOutcome::Destroy {
                inner.destroy_at(index);
            }
            events.push(Event::Reset { records: vec![id] });
            Ok(())
        })
    }

    /// Reverts every record, destroying those never persisted.
    pub fn reset_all(&self) {
        self.mutate(|inner, events| {
            let mut reset = Vec::new();
            let mut index = 0;
            while index < inner.records.len() {
                let record = &mut inner.records[index];
                if record.status == RecordStatus::Sync && !record.is_dirty() && record.is_valid() {
                    index += 1;
                    continue;
                }
                reset.push(record.id);
                match record.reset() {
                    ResetOutcome::Reverted => index += 1,
                    ResetOutcome::Destroy => {
                        inner.destroy_at(index);
                    }
                }
            }
            if inner.current.is_none() {
                let first = inner.live().next().map(|r| r.id);
                inner.current = first;
            }
            if !reset.is_empty() {
                events.push(Event::Reset { records: reset });
            }
        })
    }

    /// Moves the record at `from` to position `to`. Returns `false` if
    /// either index is out of range.
    pub fn move_record(&self, from: usize, to: usize) -> bool {
        self.mutate(|inner, events| {
            let len = inner.records.len();
            if from >= len || to >= len {
                return false;
            }
            if from != to {
                let record = inner.records.remove(from);
                let id = record.id;
                inner.records.insert(to, record);
                events.push(Event::OrderChange { record: id, from, to });
            }
            true
        })
    }
}

impl std::fmt::Debug for DataSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DataSet").field(&*self.read()).finish()
    }
}

/// Non-owning handle to a data set, held by detail data sets.
#[derive(Clone)]
pub(crate) struct WeakDataSet {
    shared: Weak<Shared>,
}

impl WeakDataSet {
    pub(crate) fn upgrade(&self) -> Option<DataSet> {
        self.shared.upgrade().map(|shared| DataSet { shared })
    }
}

impl std::fmt::Debug for WeakDataSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WeakDataSet")
    }
}

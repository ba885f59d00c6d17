//! Master-detail cascading
//!
//! A detail data set is bound to a parent under a name, with link pairs
//! `(parent_field, child_field)`. The detail's records always belong to the
//! parent's current record: when the parent's current record changes, the
//! detail records are stashed into the old current record as a
//! [`ChildCache`] and the new current record's stash (if any) is restored.

use std::mem;

use log::debug;

use super::DataSet;
use super::Event;
use super::Paging;
use super::QueryResult;
use super::Selection;
use super::WeakDataSet;
use crate::error::Error;
use crate::error::SchemaError;
use crate::model::Record;
use crate::model::RecordId;
use crate::model::RecordStatus;
use crate::model::Row;
use crate::schema::bind_rest;
use crate::schema::bind_root;

/// Detail records stashed inside a parent record.
#[derive(Debug, Clone, Default)]
pub struct ChildCache {
    pub(crate) records: Vec<Record>,
    pub(crate) current: Option<RecordId>,
    pub(crate) paging: Paging,
    pub(crate) selection: Selection,
}

impl ChildCache {
    /// Returns the stashed records.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Returns `true` if any stashed record (or anything stashed below it)
    /// has pending changes.
    pub fn is_dirty(&self) -> bool {
        self.records.iter().any(record_is_dirty)
    }
}

/// Returns `true` if the record or any detail record stashed inside it has
/// pending changes.
pub(crate) fn record_is_dirty(record: &Record) -> bool {
    record.status() != RecordStatus::Sync
        || record.is_dirty()
        || record.children.values().any(ChildCache::is_dirty)
}

/// Link from a detail data set to its parent.
#[derive(Debug, Clone)]
pub(crate) struct ParentLink {
    pub(crate) dataset: WeakDataSet,
    /// `(parent_field, child_field)` pairs.
    pub(crate) links: Vec<(String, String)>,
}

/// A detail data set registered on its parent.
#[derive(Debug, Clone)]
pub(crate) struct ChildBinding {
    pub(crate) name: String,
    pub(crate) dataset: DataSet,
}

impl DataSet {
    /// Registers `child` as a detail data set under `name`.
    ///
    /// Each link pair copies `parent_field` of the parent's current record
    /// into `child_field`: as a read parameter, and into records created in
    /// the child. Child fields bound to a root the child does not declare
    /// must resolve against this data set's schema.
    pub fn bind_child(
        &self,
        name: impl Into<String>,
        child: &DataSet,
        links: &[(&str, &str)],
    ) -> Result<(), Error> {
        let name = name.into();
        let parent_schema = self.schema();
        let child_schema = child.schema();

        for &(parent_field, child_field) in links {
            if !parent_schema.contains(parent_field) {
                return Err(SchemaError::UnknownLinkField {
                    field: parent_field.to_string(),
                    side: "parent",
                }
                .into());
            }
            if !child_schema.contains(child_field) {
                return Err(SchemaError::UnknownLinkField {
                    field: child_field.to_string(),
                    side: "child",
                }
                .into());
            }
        }
        for field in child_schema.external_binds() {
            let bind = child_schema
                .field(field)
                .and_then(|d| d.bind_path())
                .unwrap_or_default();
            if !parent_schema.contains(bind_root(bind)) {
                return Err(SchemaError::UnresolvedBind {
                    field: field.clone(),
                    bind: bind.to_string(),
                }
                .into());
            }
        }

        child.write().parent = Some(ParentLink {
            dataset: self.downgrade(),
            links: links
                .iter()
                .map(|&(p, c)| (p.to_string(), c.to_string()))
                .collect(),
        });
        debug!("{} bound detail {} as '{}'", self.id(), child.id(), name);
        self.write().children.push(ChildBinding {
            name,
            dataset: child.clone(),
        });
        Ok(())
    }

    /// Returns the detail data set registered under `name`.
    pub fn child(&self, name: &str) -> Option<DataSet> {
        self.read()
            .children
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.dataset.clone())
    }

    /// Returns the parent data set, if this is a detail data set.
    pub fn parent(&self) -> Option<DataSet> {
        self.read().parent.as_ref().and_then(|p| p.dataset.upgrade())
    }

    /// Returns `true` if any record, live detail record or stashed detail
    /// record has pending changes.
    pub fn is_dirty(&self) -> bool {
        let (own, children) = {
            let inner = self.read();
            let own = inner.records.iter().any(record_is_dirty);
            let children: Vec<DataSet> = inner.children.iter().map(|c| c.dataset.clone()).collect();
            (own, children)
        };
        own || children.iter().any(DataSet::is_dirty)
    }

    /// Reads every detail data set for the current record.
    ///
    /// Detail data sets whose records were restored from a stash are read
    /// too; use [`DataSet::child`] to read selectively.
    pub async fn query_children(&self) -> Result<Vec<(String, QueryResult)>, Error> {
        let children: Vec<ChildBinding> = self.read().children.clone();
        let mut results = Vec::with_capacity(children.len());
        for child in children {
            let result = child.dataset.query(Row::new()).await?;
            results.push((child.name, result));
        }
        Ok(results)
    }

    /// Returns the link values the parent's current record contributes.
    ///
    /// `Ok(None)` if this is not a detail data set (or the parent is gone),
    /// `Err(NoCurrentRequiredParent)` if the parent has no current record.
    pub(crate) fn parent_link_values(&self) -> Result<Option<Row>, Error> {
        let Some((parent, links)) = self.parent_with_links() else {
            return Ok(None);
        };
        let data = parent.current_data().ok_or(Error::NoCurrentRequiredParent)?;
        Ok(Some(
            links
                .into_iter()
                .map(|(parent_field, child_field)| {
                    (child_field, data.get(&parent_field).cloned().unwrap_or_default())
                })
                .collect(),
        ))
    }

    fn parent_with_links(&self) -> Option<(DataSet, Vec<(String, String)>)> {
        let inner = self.read();
        let link = inner.parent.as_ref()?;
        Some((link.dataset.upgrade()?, link.links.clone()))
    }

    /// Resolves fields bound into the parent's current record.
    pub(crate) fn external_values(&self) -> Row {
        let (paths, parent) = {
            let inner = self.read();
            let paths: Vec<(String, String)> = inner
                .schema
                .external_binds()
                .iter()
                .filter_map(|name| {
                    let path = inner.schema.field(name)?.bind_path()?;
                    Some((name.clone(), path.to_string()))
                })
                .collect();
            (paths, inner.parent.as_ref().and_then(|p| p.dataset.upgrade()))
        };
        if paths.is_empty() {
            return Row::new();
        }
        let data = parent.and_then(|p| p.current_data()).unwrap_or_default();
        paths
            .into_iter()
            .map(|(name, path)| {
                let value = data
                    .get(bind_root(&path))
                    .and_then(|v| v.get_path(bind_rest(&path)))
                    .cloned()
                    .unwrap_or_default();
                (name, value)
            })
            .collect()
    }

    /// Swaps detail records after the current record moved from `previous`
    /// to `current`. Called without holding the lock.
    pub(crate) fn cascade(&self, previous: Option<RecordId>, current: Option<RecordId>) {
        let children: Vec<ChildBinding> = self.read().children.clone();
        for child in children {
            let cache = child.dataset.stash();
            if let Some(previous) = previous {
                let mut inner = self.write();
                if let Some(record) = inner.record_mut(previous) {
                    record.children.insert(child.name.clone(), cache);
                }
            }
            let restored = current.and_then(|current| {
                let mut inner = self.write();
                inner.record_mut(current)?.children.remove(&child.name)
            });
            debug!(
                "{} cascade '{}' {:?} -> {:?} (restored: {})",
                self.id(),
                child.name,
                previous,
                current,
                restored.is_some()
            );
            child.dataset.unstash(restored.unwrap_or_default());
        }
    }

    /// Takes the records out of this data set, leaving it empty.
    fn stash(&self) -> ChildCache {
        let current = self.current();
        // Clearing the current record first lets this data set's own
        // details be stashed into it.
        self.mutate(|inner, _| inner.current = None);
        let mut inner = self.write();
        let empty = Paging::new(inner.config.page_size);
        ChildCache {
            records: mem::take(&mut inner.records),
            current,
            paging: mem::replace(&mut inner.paging, empty),
            selection: mem::take(&mut inner.selection),
        }
    }

    /// Replaces the records of this data set with a stash.
    fn unstash(&self, cache: ChildCache) {
        let ChildCache {
            records,
            current,
            paging,
            selection,
        } = cache;
        self.mutate(|inner, events| {
            inner.paging = Paging {
                page_size: inner.config.page_size,
                ..paging
            };
            inner.selection = selection;
            inner.records = records;
            inner.current = current.filter(|&id| inner.records.iter().any(|r| r.id == id));
            events.push(Event::Load {
                records: inner.records.iter().map(|r| r.id).collect(),
                total: inner.paging.total,
            });
        });
    }
}

//! Selection state management for data sets.
//!
//! Selection is tracked by string keys. In page mode the key is the record
//! identity, so a re-fetch (which creates new records) clears it. In
//! cross-page mode the key is the primary key value, so selections made on
//! other pages survive re-fetching and are re-applied to matching rows.

use std::collections::HashSet;

use serde::Deserialize;
use serde::Serialize;

use super::DataSet;
use super::Event;
use super::Inner;
use crate::error::Error;
use crate::model::Record;
use crate::model::RecordId;
use crate::model::RecordStatus;

/// Selection mode for data sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// No selection allowed
    #[default]
    None,
    /// Single record selection
    Single,
    /// Multiple records can be selected
    Multiple,
}

/// Key-based selection state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Currently selected keys
    selected: HashSet<String>,
}

impl Selection {
    /// Create a new empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all selected keys (sorted for deterministic ordering).
    pub fn selected(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.selected.iter().cloned().collect();
        keys.sort();
        keys
    }

    /// Check if a key is selected.
    pub fn is_selected(&self, key: &str) -> bool {
        self.selected.contains(key)
    }

    /// Get the number of selected keys.
    pub fn len(&self) -> usize {
        self.selected.len()
    }

    /// Check if nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Clear all selection.
    /// Returns the keys that were deselected.
    pub fn clear(&mut self) -> Vec<String> {
        self.selected.drain().collect()
    }

    /// Select a single key (clears others).
    /// Returns the keys that were deselected.
    pub fn select_only(&mut self, key: &str) -> Vec<String> {
        let removed: Vec<_> = self.selected.iter().filter(|&k| k != key).cloned().collect();
        self.selected.clear();
        self.selected.insert(key.to_string());
        removed
    }

    /// Add a key. Returns `false` if it was already selected.
    pub fn insert(&mut self, key: &str) -> bool {
        self.selected.insert(key.to_string())
    }

    /// Remove a key. Returns `false` if it was not selected.
    pub fn remove(&mut self, key: &str) -> bool {
        self.selected.remove(key)
    }

    /// Select all keys from the provided list.
    /// Returns the keys that were newly selected.
    pub fn select_all(&mut self, keys: &[String]) -> Vec<String> {
        let mut added = Vec::new();
        for key in keys {
            if self.selected.insert(key.clone()) {
                added.push(key.clone());
            }
        }
        added
    }
}

impl Inner {
    /// Returns the selection key of a record.
    ///
    /// Cross-page mode falls back to the record identity while the record
    /// has no primary key value (e.g. before its first submit).
    pub(crate) fn selection_key(&self, record: &Record) -> String {
        if self.config.cross_page_select
            && let Some(pk) = self.config.primary_key.as_deref()
            && let Some(value) = record.get(pk).filter(|v| !v.is_null())
        {
            return value.to_key_string();
        }
        record.id().to_string()
    }

    /// Returns the selection key of the record at `index` if it is selected.
    pub(crate) fn selected_key_at(&self, index: usize) -> Option<String> {
        let record = &self.records[index];
        record.selected.then(|| self.selection_key(record))
    }

    /// Moves a selected record's key after its primary key value changed.
    pub(crate) fn rekey_selection(&mut self, index: usize, previous: Option<String>) {
        let Some(previous) = previous else {
            return;
        };
        let current = self.selection_key(&self.records[index]);
        if current != previous {
            self.selection.remove(&previous);
            self.selection.insert(&current);
        }
    }

    /// Re-applies the selection to freshly loaded records.
    pub(crate) fn sync_selection(&mut self) {
        if !self.config.cross_page_select {
            self.selection.clear();
        }
        let keys: Vec<bool> = self
            .records
            .iter()
            .map(|r| self.selection.is_selected(&self.selection_key(r)))
            .collect();
        for (record, selected) in self.records.iter_mut().zip(keys) {
            record.selected = selected;
        }
    }
}

// =============================================================================
// Selection API
// =============================================================================

impl DataSet {
    /// Selects a record.
    ///
    /// In single mode every other record is unselected. Returns `false` if
    /// selection is disabled or the record was already selected.
    pub fn select(&self, id: RecordId) -> Result<bool, Error> {
        self.mutate(|inner, events| {
            let index = inner.index_of(id).ok_or(Error::RecordNotFound(id))?;
            let key = inner.selection_key(&inner.records[index]);
            match inner.config.selection {
                SelectionMode::None => return Ok(false),
                SelectionMode::Single => {
                    inner.selection.select_only(&key);
                    for record in inner.records.iter_mut().filter(|r| r.selected && r.id != id) {
                        record.selected = false;
                        events.push(Event::Unselect { record: record.id });
                    }
                }
                SelectionMode::Multiple => {
                    inner.selection.insert(&key);
                }
            }
            let record = &mut inner.records[index];
            if record.selected {
                return Ok(false);
            }
            record.selected = true;
            events.push(Event::Select { record: id });
            Ok(true)
        })
    }

    /// Unselects a record. Returns `false` if it was not selected.
    pub fn unselect(&self, id: RecordId) -> Result<bool, Error> {
        self.mutate(|inner, events| {
            let index = inner.index_of(id).ok_or(Error::RecordNotFound(id))?;
            let key = inner.selection_key(&inner.records[index]);
            inner.selection.remove(&key);
            let record = &mut inner.records[index];
            if !record.selected {
                return Ok(false);
            }
            record.selected = false;
            events.push(Event::Unselect { record: id });
            Ok(true)
        })
    }

    /// Selects every live record of the loaded page.
    ///
    /// Only available in multiple mode. Returns the newly selected records.
    pub fn select_all(&self) -> Vec<RecordId> {
        self.mutate(|inner, events| {
            if inner.config.selection != SelectionMode::Multiple {
                return Vec::new();
            }
            let keys: Vec<String> = inner
                .records
                .iter()
                .filter(|r| r.status != RecordStatus::Delete)
                .map(|r| inner.selection_key(r))
                .collect();
            inner.selection.select_all(&keys);
            let added: Vec<RecordId> = inner
                .records
                .iter_mut()
                .filter(|r| r.status != RecordStatus::Delete && !r.selected)
                .map(|r| {
                    r.selected = true;
                    r.id
                })
                .collect();
            if !added.is_empty() {
                events.push(Event::SelectAll {
                    records: added.clone(),
                });
            }
            added
        })
    }

    /// Clears the selection, including keys selected on other pages.
    ///
    /// Returns the loaded records that were unselected.
    pub fn unselect_all(&self) -> Vec<RecordId> {
        self.mutate(|inner, events| {
            inner.selection.clear();
            let removed: Vec<RecordId> = inner
                .records
                .iter_mut()
                .filter(|r| r.selected)
                .map(|r| {
                    r.selected = false;
                    r.id
                })
                .collect();
            if !removed.is_empty() {
                events.push(Event::UnselectAll {
                    records: removed.clone(),
                });
            }
            removed
        })
    }

    /// Returns the selected records of the loaded page, in order.
    pub fn selected(&self) -> Vec<RecordId> {
        self.read()
            .records
            .iter()
            .filter(|r| r.selected)
            .map(|r| r.id)
            .collect()
    }

    /// Returns every selection key, including keys of records on other
    /// pages in cross-page mode.
    pub fn selected_keys(&self) -> Vec<String> {
        self.read().selection.selected()
    }

    /// Returns `true` if the record is selected.
    pub fn is_selected(&self, id: RecordId) -> bool {
        let inner = self.read();
        inner.record(id).is_some_and(|r| r.selected)
    }
}

//! Data set events and subscriptions

use std::sync::Arc;

use log::trace;

use super::DataSet;
use crate::error::TransportError;
use crate::model::RecordId;
use crate::model::Row;
use crate::model::Value;

/// Which write batch an event or outcome refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchKind {
    Create,
    Update,
    Destroy,
}

impl std::fmt::Display for BatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchKind::Create => write!(f, "create"),
            BatchKind::Update => write!(f, "update"),
            BatchKind::Destroy => write!(f, "destroy"),
        }
    }
}

/// A change notification emitted by a data set.
///
/// Events are delivered after the data set's lock is released, so
/// listeners may call back into the data set.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A read is about to be sent with the merged parameters.
    Query { params: Row },
    /// Records were replaced by a read (or restored from a stash).
    Load { records: Vec<RecordId>, total: usize },
    /// Validated records are about to be sent.
    Submit { records: Vec<RecordId> },
    /// Every batch of a submit succeeded.
    SubmitSuccess { records: Vec<RecordId> },
    /// One batch of a submit failed.
    SubmitFailed {
        batch: BatchKind,
        records: Vec<RecordId>,
        error: TransportError,
    },
    /// A field value changed.
    Update {
        record: RecordId,
        field: String,
        old: Value,
        new: Value,
    },
    /// A record was created locally.
    Create { record: RecordId },
    /// Records were removed or marked for deletion.
    Remove { records: Vec<RecordId> },
    /// Records were reverted to their synced values.
    Reset { records: Vec<RecordId> },
    Select { record: RecordId },
    Unselect { record: RecordId },
    SelectAll { records: Vec<RecordId> },
    UnselectAll { records: Vec<RecordId> },
    /// The current record changed.
    IndexChange {
        previous: Option<RecordId>,
        current: Option<RecordId>,
    },
    /// A record was moved in memory.
    OrderChange { record: RecordId, from: usize, to: usize },
}

/// Discriminant of an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Query,
    Load,
    Submit,
    SubmitSuccess,
    SubmitFailed,
    Update,
    Create,
    Remove,
    Reset,
    Select,
    Unselect,
    SelectAll,
    UnselectAll,
    IndexChange,
    OrderChange,
}

impl Event {
    /// Returns the kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Query { .. } => EventKind::Query,
            Event::Load { .. } => EventKind::Load,
            Event::Submit { .. } => EventKind::Submit,
            Event::SubmitSuccess { .. } => EventKind::SubmitSuccess,
            Event::SubmitFailed { .. } => EventKind::SubmitFailed,
            Event::Update { .. } => EventKind::Update,
            Event::Create { .. } => EventKind::Create,
            Event::Remove { .. } => EventKind::Remove,
            Event::Reset { .. } => EventKind::Reset,
            Event::Select { .. } => EventKind::Select,
            Event::Unselect { .. } => EventKind::Unselect,
            Event::SelectAll { .. } => EventKind::SelectAll,
            Event::UnselectAll { .. } => EventKind::UnselectAll,
            Event::IndexChange { .. } => EventKind::IndexChange,
            Event::OrderChange { .. } => EventKind::OrderChange,
        }
    }
}

/// Callback invoked for each delivered event.
pub type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    /// Record-level subscriptions only receive `Update` events of this record.
    record: Option<RecordId>,
    listener: Listener,
}

impl Subscription {
    fn wants(&self, event: &Event) -> bool {
        match (self.record, event) {
            (None, _) => true,
            (Some(id), Event::Update { record, .. }) => id == *record,
            (Some(_), _) => false,
        }
    }
}

/// Subscription registry of one data set.
#[derive(Default)]
pub(crate) struct Listeners {
    next: u64,
    entries: Vec<Subscription>,
}

impl Listeners {
    fn add(&mut self, record: Option<RecordId>, listener: Listener) -> SubscriptionId {
        self.next += 1;
        let id = SubscriptionId(self.next);
        self.entries.push(Subscription { id, record, listener });
        id
    }

    fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|s| s.id != id);
        self.entries.len() != before
    }

    /// Returns the listeners interested in `event`.
    pub(crate) fn matching(&self, event: &Event) -> Vec<Listener> {
        self.entries
            .iter()
            .filter(|s| s.wants(event))
            .map(|s| Arc::clone(&s.listener))
            .collect()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.entries.len())
            .finish()
    }
}

// =============================================================================
// Subscription API
// =============================================================================

impl DataSet {
    /// Subscribes to every event of this data set.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.write().listeners.add(None, Arc::new(listener))
    }

    /// Subscribes to field updates of one record.
    pub fn subscribe_record<F>(&self, record: RecordId, listener: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.write().listeners.add(Some(record), Arc::new(listener))
    }

    /// Removes a subscription. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.write().listeners.remove(id)
    }

    /// Delivers events to their listeners. Must be called without holding
    /// the lock.
    pub(crate) fn emit(&self, events: Vec<Event>) {
        if events.is_empty() {
            return;
        }
        let targets: Vec<(Event, Vec<Listener>)> = {
            let inner = self.read();
            if inner.listeners.is_empty() {
                return;
            }
            events
                .into_iter()
                .map(|event| {
                    let listeners = inner.listeners.matching(&event);
                    (event, listeners)
                })
                .collect()
        };
        for (event, listeners) in targets {
            trace!("{} event {:?} -> {} listener(s)", self.id(), event.kind(), listeners.len());
            for listener in listeners {
                listener(&event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_subscription_filters_updates() {
        let mut listeners = Listeners::default();
        let target = RecordId::new();
        let other = RecordId::new();
        listeners.add(Some(target), Arc::new(|_| {}));
        listeners.add(None, Arc::new(|_| {}));

        let update = |record| Event::Update {
            record,
            field: "name".into(),
            old: Value::Null,
            new: Value::from("x"),
        };
        assert_eq!(listeners.matching(&update(target)).len(), 2);
        assert_eq!(listeners.matching(&update(other)).len(), 1);
        assert_eq!(listeners.matching(&Event::Create { record: target }).len(), 1);
    }

    #[test]
    fn test_remove_subscription() {
        let mut listeners = Listeners::default();
        let id = listeners.add(None, Arc::new(|_| {}));
        assert!(listeners.remove(id));
        assert!(!listeners.remove(id));
        assert!(listeners.is_empty());
    }
}

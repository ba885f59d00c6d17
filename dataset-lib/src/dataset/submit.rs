//! Submitting pending changes

use std::iter;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use futures::future::join3;
use log::debug;
use log::warn;

use super::BatchKind;
use super::DataSet;
use super::Event;
use crate::error::Error;
use crate::error::RecordValidationError;
use crate::error::TransportError;
use crate::model::RecordId;
use crate::model::RecordStatus;
use crate::model::Row;
use crate::transport::Transport;
use crate::validation::validate_record;

/// Outcome of one write batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    /// The batch was empty; no call was made.
    Skipped,
    /// The batch was accepted.
    Succeeded { count: usize },
    /// The batch was rejected; its records keep their pending status.
    Failed(TransportError),
}

impl BatchOutcome {
    /// Returns `true` unless the batch failed.
    pub fn is_ok(&self) -> bool {
        !matches!(self, BatchOutcome::Failed(_))
    }
}

/// Per-batch outcomes of a submit. Batches succeed or fail independently.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitReport {
    pub create: BatchOutcome,
    pub update: BatchOutcome,
    pub destroy: BatchOutcome,
}

impl SubmitReport {
    /// Returns `true` if no batch failed.
    pub fn is_success(&self) -> bool {
        self.create.is_ok() && self.update.is_ok() && self.destroy.is_ok()
    }

    /// Returns the failed batches with their errors.
    pub fn failures(&self) -> Vec<(BatchKind, &TransportError)> {
        [
            (BatchKind::Create, &self.create),
            (BatchKind::Update, &self.update),
            (BatchKind::Destroy, &self.destroy),
        ]
        .into_iter()
        .filter_map(|(kind, outcome)| match outcome {
            BatchOutcome::Failed(err) => Some((kind, err)),
            _ => None,
        })
        .collect()
    }
}

/// Result of [`DataSet::submit`].
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitResult {
    /// No record had pending changes; nothing was sent.
    Unchanged,
    /// Local validation failed; nothing was sent.
    ValidationFailure(Vec<RecordValidationError>),
    /// The batches were sent.
    Submitted(SubmitReport),
}

impl SubmitResult {
    /// Returns `true` if every sent batch succeeded (or nothing was pending).
    pub fn is_success(&self) -> bool {
        match self {
            SubmitResult::Unchanged => true,
            SubmitResult::ValidationFailure(_) => false,
            SubmitResult::Submitted(report) => report.is_success(),
        }
    }
}

/// Holds the single submit slot of a data set until dropped.
struct SubmitGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> SubmitGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, Error> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::SubmitInProgress)?;
        Ok(Self { flag })
    }
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[derive(Default)]
struct Batch {
    ids: Vec<RecordId>,
    rows: Vec<Row>,
}

impl Batch {
    fn push(&mut self, id: RecordId, row: Row) {
        self.ids.push(id);
        self.rows.push(row);
    }
}

enum Prepared {
    Unchanged,
    Invalid(Vec<RecordValidationError>),
    Ready {
        transport: Arc<dyn Transport>,
        create: Batch,
        update: Batch,
        destroy: Batch,
    },
}

async fn send(
    transport: &dyn Transport,
    kind: BatchKind,
    rows: Vec<Row>,
) -> Option<Result<Vec<Row>, TransportError>> {
    if rows.is_empty() {
        return None;
    }
    debug!("sending {} batch of {} row(s)", kind, rows.len());
    let result = match kind {
        BatchKind::Create => transport.create(rows).await,
        BatchKind::Update => transport.update(rows).await,
        BatchKind::Destroy => transport.destroy(rows).await,
    };
    Some(result)
}

impl DataSet {
    /// Validates and sends every pending record.
    ///
    /// Added, updated and deleted records are validated first; if any fails
    /// nothing is sent. Otherwise the create, update and destroy batches are
    /// sent concurrently. A succeeded batch commits its records (destroyed
    /// records are dropped); a failed batch leaves its records pending and
    /// writes the backend's field errors into them.
    ///
    /// Only one submit may be pending per data set; a second call fails
    /// with [`Error::SubmitInProgress`]. Dropping the returned future frees
    /// the slot.
    pub async fn submit(&self) -> Result<SubmitResult, Error> {
        let _guard = SubmitGuard::acquire(self.submitting())?;

        let (transport, create, update, destroy) = match self.prepare_submit()? {
            Prepared::Unchanged => return Ok(SubmitResult::Unchanged),
            Prepared::Invalid(errors) => {
                debug!("{} submit blocked by {} invalid record(s)", self.id(), errors.len());
                return Ok(SubmitResult::ValidationFailure(errors));
            }
            Prepared::Ready {
                transport,
                create,
                update,
                destroy,
            } => (transport, create, update, destroy),
        };

        let records: Vec<RecordId> = create
            .ids
            .iter()
            .chain(&update.ids)
            .chain(&destroy.ids)
            .copied()
            .collect();
        self.emit(vec![Event::Submit { records }]);

        let (created, updated, destroyed) = join3(
            send(transport.as_ref(), BatchKind::Create, create.rows),
            send(transport.as_ref(), BatchKind::Update, update.rows),
            send(transport.as_ref(), BatchKind::Destroy, destroy.rows),
        )
        .await;

        let report = self.apply_submit([
            (BatchKind::Create, create.ids, created),
            (BatchKind::Update, update.ids, updated),
            (BatchKind::Destroy, destroy.ids, destroyed),
        ]);
        Ok(SubmitResult::Submitted(report))
    }

    /// Marks records for deletion and submits.
    pub async fn delete(&self, ids: &[RecordId]) -> Result<SubmitResult, Error> {
        self.remove(ids)?;
        self.submit().await
    }

    fn prepare_submit(&self) -> Result<Prepared, Error> {
        let external = self.external_values();
        let mut inner = self.write();
        let schema = Arc::clone(&inner.schema);
        let mode = inner.config.validation_mode;
        let key = inner.config.primary_key.clone();

        let pending: Vec<usize> = inner
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.status != RecordStatus::Sync)
            .map(|(i, _)| i)
            .collect();
        if pending.is_empty() {
            return Ok(Prepared::Unchanged);
        }

        let results: Vec<_> = {
            let peers: Vec<&_> = inner.records.iter().collect();
            pending
                .iter()
                .map(|&i| (i, validate_record(&schema, &inner.records[i], &peers, &external, mode)))
                .collect()
        };
        let mut failures = Vec::new();
        for (index, errors) in results {
            let record = &mut inner.records[index];
            if !errors.is_empty() {
                failures.push(RecordValidationError::from_map(record.id, &errors, schema.names()));
            }
            record.validation_errors = errors;
        }
        if !failures.is_empty() {
            return Ok(Prepared::Invalid(failures));
        }

        let transport = inner
            .transport
            .clone()
            .ok_or(Error::NoTransport)?;
        let mut create = Batch::default();
        let mut update = Batch::default();
        let mut destroy = Batch::default();
        for &index in &pending {
            let record = &inner.records[index];
            let row = record.to_row(&schema, key.as_deref());
            match record.status {
                RecordStatus::Add => create.push(record.id, row),
                RecordStatus::Update => update.push(record.id, row),
                RecordStatus::Delete => destroy.push(record.id, row),
                RecordStatus::Sync => {}
            }
        }
        Ok(Prepared::Ready {
            transport,
            create,
            update,
            destroy,
        })
    }

    fn apply_submit(
        &self,
        batches: [(BatchKind, Vec<RecordId>, Option<Result<Vec<Row>, TransportError>>); 3],
    ) -> SubmitReport {
        self.mutate(|inner, events| {
            let schema = Arc::clone(&inner.schema);
            let mut outcomes = Vec::with_capacity(3);
            let mut committed = Vec::new();

            for (kind, ids, result) in batches {
                let outcome = match result {
                    None => BatchOutcome::Skipped,
                    Some(Ok(rows)) => {
                        let count = ids.len();
                        let rows = rows.into_iter().chain(iter::repeat_with(Row::new));
                        for (id, row) in ids.iter().zip(rows) {
                            let Some(index) = inner.index_of(*id) else {
                                continue;
                            };
                            match kind {
                                BatchKind::Destroy => {
                                    inner.destroy_at(index);
                                }
                                _ => {
                                    let previous = inner.selected_key_at(index);
                                    inner.records[index].commit_sync(&schema, row);
                                    inner.rekey_selection(index, previous);
                                }
                            }
                        }
                        debug!("{} {} batch committed {} record(s)", inner.id, kind, count);
                        committed.extend(ids);
                        BatchOutcome::Succeeded { count }
                    }
                    Some(Err(err)) => {
                        warn!("{} {} batch failed: {}", inner.id, kind, err);
                        for (position, id) in ids.iter().enumerate() {
                            if let Some(rejections) = err.rejections_for(position)
                                && let Some(record) = inner.record_mut(*id)
                            {
                                record.apply_rejections(rejections);
                            }
                        }
                        events.push(Event::SubmitFailed {
                            batch: kind,
                            records: ids,
                            error: err.clone(),
                        });
                        BatchOutcome::Failed(err)
                    }
                };
                outcomes.push(outcome);
            }

            if inner.current.is_none() {
                let first = inner.live().next().map(|r| r.id);
                inner.current = first;
            }
            let mut outcomes = outcomes.into_iter();
            let report = SubmitReport {
                create: outcomes.next().unwrap_or(BatchOutcome::Skipped),
                update: outcomes.next().unwrap_or(BatchOutcome::Skipped),
                destroy: outcomes.next().unwrap_or(BatchOutcome::Skipped),
            };
            if report.is_success() {
                events.push(Event::SubmitSuccess { records: committed });
            }
            report
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_is_single_flight() {
        let flag = AtomicBool::new(false);
        let guard = SubmitGuard::acquire(&flag).unwrap();
        assert!(matches!(SubmitGuard::acquire(&flag), Err(Error::SubmitInProgress)));
        drop(guard);
        assert!(SubmitGuard::acquire(&flag).is_ok());
    }

    #[test]
    fn test_report_failures() {
        let report = SubmitReport {
            create: BatchOutcome::Succeeded { count: 1 },
            update: BatchOutcome::Skipped,
            destroy: BatchOutcome::Failed(TransportError::new("locked")),
        };
        assert!(!report.is_success());
        let failures = report.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, BatchKind::Destroy);
    }
}

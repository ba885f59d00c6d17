//! Integration tests for submitting pending changes.

mod common;

use std::sync::Arc;

use common::GatedTransport;
use common::people;
use common::people_schema;
use common::record_events;
use common::seeded;
use dataset_lib::dataset::BatchKind;
use dataset_lib::dataset::BatchOutcome;
use dataset_lib::dataset::DataSet;
use dataset_lib::dataset::DataSetConfig;
use dataset_lib::dataset::Event;
use dataset_lib::dataset::EventKind;
use dataset_lib::dataset::SubmitResult;
use dataset_lib::error::Error;
use dataset_lib::error::TransportError;
use dataset_lib::model::RecordStatus;
use dataset_lib::model::Row;
use dataset_lib::model::Value;
use dataset_lib::model::row;
use dataset_lib::transport::InMemoryTransport;
use dataset_lib::transport::Operation;
use dataset_lib::validation::ValidationKind;

async fn loaded(count: i64) -> (Arc<InMemoryTransport>, DataSet) {
    let transport = seeded(count);
    let ds = people(transport.clone());
    ds.query(Row::new()).await.unwrap();
    (transport, ds)
}

fn report(result: SubmitResult) -> dataset_lib::dataset::SubmitReport {
    match result {
        SubmitResult::Submitted(report) => report,
        other => panic!("expected a submitted report, got {other:?}"),
    }
}

// =============================================================================
// Local validation
// =============================================================================

mod validation {
    use super::*;

    #[tokio::test]
    async fn test_invalid_record_blocks_submit() {
        let (transport, ds) = loaded(2).await;
        let id = ds.create(row([("name", Value::from("")), ("age", Value::from("abc"))])).unwrap();

        let result = ds.submit().await.unwrap();

        let SubmitResult::ValidationFailure(failures) = result else {
            panic!("expected a validation failure");
        };
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].record, id);
        assert!(failures[0].has_kind("name", ValidationKind::ValueMissing));
        assert!(failures[0].has_kind("age", ValidationKind::TypeMismatch));
        assert_eq!(transport.write_calls(), 0);

        let record = ds.get(id).unwrap();
        assert_eq!(record.status(), RecordStatus::Add);
        assert!(!record.errors_for("name").is_empty());
    }

    #[tokio::test]
    async fn test_fixing_the_record_allows_submit() {
        let (transport, ds) = loaded(0).await;
        let id = ds.create(row([("age", Value::from("41"))])).unwrap();
        assert!(matches!(ds.submit().await.unwrap(), SubmitResult::ValidationFailure(_)));

        ds.set(id, "name", "Ada").unwrap();
        let report = report(ds.submit().await.unwrap());

        assert_eq!(report.create, BatchOutcome::Succeeded { count: 1 });
        assert_eq!(transport.calls(Operation::Create), 1);
        let record = ds.get(id).unwrap();
        assert_eq!(record.status(), RecordStatus::Sync);
        assert_eq!(record.get("age"), Some(&Value::Int(41)));
        assert_eq!(record.get("id"), Some(&Value::Int(1)));
        assert_eq!(transport.find(&Value::Int(1)).unwrap().get("name"), Some(&Value::from("Ada")));
    }

    #[tokio::test]
    async fn test_nothing_pending() {
        let (transport, ds) = loaded(3).await;

        assert_eq!(ds.submit().await.unwrap(), SubmitResult::Unchanged);
        assert_eq!(transport.write_calls(), 0);
    }

    #[tokio::test]
    async fn test_submit_without_transport() {
        let ds = DataSet::new(people_schema(), DataSetConfig::named("people"));
        ds.create(row([("name", Value::from("Ada"))])).unwrap();

        assert_eq!(ds.submit().await, Err(Error::NoTransport));
    }
}

// =============================================================================
// Batches
// =============================================================================

mod batches {
    use super::*;

    #[tokio::test]
    async fn test_update_commits_record() {
        let (transport, ds) = loaded(3).await;
        let id = ds.ids()[1];
        ds.set(id, "age", 99).unwrap();
        assert_eq!(ds.status(id), Some(RecordStatus::Update));
        assert!(ds.is_dirty());

        let report = report(ds.submit().await.unwrap());

        assert_eq!(report.update, BatchOutcome::Succeeded { count: 1 });
        assert_eq!(report.create, BatchOutcome::Skipped);
        assert_eq!(report.destroy, BatchOutcome::Skipped);
        assert_eq!(ds.status(id), Some(RecordStatus::Sync));
        assert!(!ds.is_dirty());
        assert_eq!(transport.find(&Value::Int(2)).unwrap().get("age"), Some(&Value::Int(99)));
    }

    #[tokio::test]
    async fn test_delete_destroys_record() {
        let (transport, ds) = loaded(3).await;
        let id = ds.ids()[0];

        let result = ds.delete(&[id]).await.unwrap();

        assert!(result.is_success());
        assert!(ds.get(id).is_none());
        assert_eq!(ds.len(), 2);
        assert_eq!(transport.len(), 2);
        assert_eq!(ds.current(), ds.ids().first().copied());
    }

    #[tokio::test]
    async fn test_create_then_remove_sends_nothing() {
        let (transport, ds) = loaded(1).await;
        let id = ds.create(row([("name", Value::from("temp"))])).unwrap();

        ds.remove(&[id]).unwrap();

        assert!(ds.get(id).is_none());
        assert_eq!(ds.submit().await.unwrap(), SubmitResult::Unchanged);
        assert_eq!(transport.calls(Operation::Destroy), 0);
        assert_eq!(transport.write_calls(), 0);
    }

    #[tokio::test]
    async fn test_batches_sent_together() {
        let (transport, ds) = loaded(3).await;
        let ids = ds.ids();
        ds.set(ids[0], "name", "renamed").unwrap();
        ds.remove(&[ids[1]]).unwrap();
        ds.create(row([("name", Value::from("new"))])).unwrap();
        let events = record_events(&ds);

        let report = report(ds.submit().await.unwrap());

        assert!(report.is_success());
        assert_eq!(transport.calls(Operation::Create), 1);
        assert_eq!(transport.calls(Operation::Update), 1);
        assert_eq!(transport.calls(Operation::Destroy), 1);
        assert_eq!(transport.len(), 3);
        assert!(!ds.is_dirty());

        let kinds: Vec<EventKind> = events.lock().unwrap().iter().map(Event::kind).collect();
        assert_eq!(kinds.first(), Some(&EventKind::Submit));
        assert!(kinds.contains(&EventKind::SubmitSuccess));
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_failed_batch_pending() {
        let (transport, ds) = loaded(2).await;
        let updated = ds.ids()[0];
        ds.set(updated, "name", "taken").unwrap();
        let created = ds.create(row([("name", Value::from("fresh"))])).unwrap();
        transport.fail_next(
            Operation::Update,
            TransportError::with_status(422, "Invalid rows")
                .reject_field(0, "name", "Name already taken."),
        );
        let events = record_events(&ds);

        let report = report(ds.submit().await.unwrap());

        assert!(!report.is_success());
        assert_eq!(report.create, BatchOutcome::Succeeded { count: 1 });
        assert!(matches!(report.update, BatchOutcome::Failed(_)));
        let failures = report.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, BatchKind::Update);

        assert_eq!(ds.status(created), Some(RecordStatus::Sync));
        assert_eq!(ds.status(updated), Some(RecordStatus::Update));
        let errors = ds.get(updated).unwrap().errors_for("name").to_vec();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ValidationKind::ServerRejected);
        assert_eq!(errors[0].message, "Name already taken.");

        let events = events.lock().unwrap();
        assert!(events.iter().any(|e| matches!(
            e,
            Event::SubmitFailed { batch: BatchKind::Update, records, .. }
                if records == &vec![updated]
        )));
        assert!(!events.iter().any(|e| e.kind() == EventKind::SubmitSuccess));
    }

    #[tokio::test]
    async fn test_retry_after_failure() {
        let (transport, ds) = loaded(2).await;
        let id = ds.ids()[1];
        ds.set(id, "age", 50).unwrap();
        transport.fail_next(Operation::Update, TransportError::with_status(503, "busy"));
        assert!(!ds.submit().await.unwrap().is_success());

        let report = report(ds.submit().await.unwrap());

        assert_eq!(report.update, BatchOutcome::Succeeded { count: 1 });
        assert_eq!(ds.status(id), Some(RecordStatus::Sync));
        assert_eq!(transport.calls(Operation::Update), 2);
    }

    #[tokio::test]
    async fn test_reset_reverts_before_submit() {
        let (transport, ds) = loaded(2).await;
        let id = ds.ids()[0];
        ds.set(id, "name", "changed").unwrap();

        ds.reset(id).unwrap();

        assert_eq!(ds.status(id), Some(RecordStatus::Sync));
        assert_eq!(ds.value(id, "name").unwrap(), Value::from("person01"));
        assert_eq!(ds.submit().await.unwrap(), SubmitResult::Unchanged);
        assert_eq!(transport.write_calls(), 0);
    }
}

// =============================================================================
// Single flight
// =============================================================================

mod single_flight {
    use super::*;

    #[tokio::test]
    async fn test_second_submit_is_rejected() {
        let inner = seeded(0);
        let transport = Arc::new(GatedTransport::new(inner.clone()));
        let release = transport.gate("create");
        let ds = people(transport.clone());
        ds.create(row([("name", Value::from("Ada"))])).unwrap();

        let pending = tokio::spawn({
            let ds = ds.clone();
            async move { ds.submit().await }
        });
        transport.wait_entered(1).await;

        assert_eq!(ds.submit().await, Err(Error::SubmitInProgress));

        release.send(()).unwrap();
        let result = pending.await.unwrap().unwrap();
        assert!(result.is_success());
        assert_eq!(inner.calls(Operation::Create), 1);
        assert_eq!(ds.submit().await.unwrap(), SubmitResult::Unchanged);
    }

    #[tokio::test]
    async fn test_cancelled_submit_frees_slot() {
        let inner = seeded(0);
        let transport = Arc::new(GatedTransport::new(inner.clone()));
        let _release = transport.gate("create");
        let ds = people(transport.clone());
        let id = ds.create(row([("name", Value::from("Ada"))])).unwrap();

        let pending = tokio::spawn({
            let ds = ds.clone();
            async move { ds.submit().await }
        });
        transport.wait_entered(1).await;
        pending.abort();
        let _ = pending.await;

        assert_eq!(ds.status(id), Some(RecordStatus::Add));
        let result = ds.submit().await.unwrap();
        assert!(result.is_success());
        assert_eq!(ds.status(id), Some(RecordStatus::Sync));
    }
}

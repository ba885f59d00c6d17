//! Integration tests for master-detail data sets.

use std::sync::Arc;

use dataset_lib::dataset::DataSet;
use dataset_lib::dataset::DataSetConfig;
use dataset_lib::dataset::QueryResult;
use dataset_lib::error::Error;
use dataset_lib::error::SchemaError;
use dataset_lib::model::RecordStatus;
use dataset_lib::model::Row;
use dataset_lib::model::Value;
use dataset_lib::model::row;
use dataset_lib::schema::FieldDescriptor;
use dataset_lib::schema::FieldType;
use dataset_lib::schema::Schema;
use dataset_lib::transport::InMemoryTransport;
use dataset_lib::transport::Operation;

struct Fixture {
    orders: DataSet,
    lines: DataSet,
    order_store: Arc<InMemoryTransport>,
    line_store: Arc<InMemoryTransport>,
}

fn orders_schema() -> Schema {
    Schema::new(vec![
        FieldDescriptor::new("id", FieldType::Number),
        FieldDescriptor::new("customer", FieldType::String).required(),
    ])
    .unwrap()
}

fn lines_schema() -> Schema {
    Schema::new(vec![
        FieldDescriptor::new("id", FieldType::Number),
        FieldDescriptor::new("order_id", FieldType::Number),
        FieldDescriptor::new("product", FieldType::String).required(),
        FieldDescriptor::new("qty", FieldType::Number).min(1i64),
        FieldDescriptor::new("customer", FieldType::String).bind("customer"),
    ])
    .unwrap()
}

fn line(id: i64, order: i64, product: &str, qty: i64) -> Row {
    row([
        ("id", Value::Int(id)),
        ("order_id", Value::Int(order)),
        ("product", Value::from(product)),
        ("qty", Value::Int(qty)),
    ])
}

fn fixture() -> Fixture {
    let order_store = Arc::new(InMemoryTransport::new("id"));
    order_store.seed([
        row([("id", Value::Int(1)), ("customer", Value::from("acme"))]),
        row([("id", Value::Int(2)), ("customer", Value::from("globex"))]),
        row([("id", Value::Int(3)), ("customer", Value::from("initech"))]),
    ]);
    let line_store = Arc::new(InMemoryTransport::new("id"));
    line_store.seed([
        line(1, 1, "bolts", 10),
        line(2, 1, "nuts", 20),
        line(3, 2, "gears", 2),
    ]);

    let orders = DataSet::with_transport(
        orders_schema(),
        DataSetConfig::named("orders").with_primary_key("id"),
        order_store.clone(),
    );
    let lines = DataSet::with_transport(
        lines_schema(),
        DataSetConfig::named("lines").with_primary_key("id"),
        line_store.clone(),
    );
    orders.bind_child("lines", &lines, &[("id", "order_id")]).unwrap();
    Fixture {
        orders,
        lines,
        order_store,
        line_store,
    }
}

// =============================================================================
// Binding
// =============================================================================

mod binding {
    use super::*;

    #[test]
    fn test_unknown_link_fields_rejected() {
        let orders = DataSet::new(orders_schema(), DataSetConfig::named("orders"));
        let lines = DataSet::new(lines_schema(), DataSetConfig::named("lines"));

        let err = orders.bind_child("lines", &lines, &[("number", "order_id")]).unwrap_err();
        assert!(matches!(
            err,
            Error::Schema(SchemaError::UnknownLinkField { ref field, side: "parent" })
                if field == "number"
        ));

        let err = orders.bind_child("lines", &lines, &[("id", "order")]).unwrap_err();
        assert!(matches!(
            err,
            Error::Schema(SchemaError::UnknownLinkField { side: "child", .. })
        ));
        assert!(orders.child("lines").is_none());
    }

    #[test]
    fn test_unresolved_external_bind_rejected() {
        let parent = DataSet::new(
            Schema::new(vec![FieldDescriptor::new("id", FieldType::Number)]).unwrap(),
            DataSetConfig::named("orders"),
        );
        let lines = DataSet::new(lines_schema(), DataSetConfig::named("lines"));

        let err = parent.bind_child("lines", &lines, &[("id", "order_id")]).unwrap_err();

        assert!(matches!(err, Error::Schema(SchemaError::UnresolvedBind { .. })));
    }

    #[test]
    fn test_child_and_parent_handles() {
        let f = fixture();

        assert!(f.orders.child("lines").unwrap().ptr_eq(&f.lines));
        assert!(f.lines.parent().unwrap().ptr_eq(&f.orders));
        assert!(f.orders.parent().is_none());
    }
}

// =============================================================================
// Reads and creates
// =============================================================================

mod linking {
    use super::*;

    #[tokio::test]
    async fn test_create_requires_parent_record() {
        let f = fixture();

        let err = f.lines.create(row([("product", Value::from("bolts"))])).unwrap_err();

        assert_eq!(err, Error::NoCurrentRequiredParent);
        assert!(f.lines.is_empty());
    }

    #[tokio::test]
    async fn test_query_without_parent_record_clears() {
        let f = fixture();

        let result = f.lines.query(Row::new()).await.unwrap();

        assert_eq!(result, QueryResult::Loaded { count: 0, total: 0 });
        assert_eq!(f.line_store.calls(Operation::Read), 0);
    }

    #[tokio::test]
    async fn test_query_sends_link_values() {
        let f = fixture();
        f.orders.query(Row::new()).await.unwrap();

        let result = f.lines.query(Row::new()).await.unwrap();

        assert_eq!(result, QueryResult::Loaded { count: 2, total: 2 });
        let params = f.line_store.last_read().unwrap().params;
        assert_eq!(params.get("order_id"), Some(&Value::Int(1)));
    }

    #[tokio::test]
    async fn test_create_fills_link_fields() {
        let f = fixture();
        f.orders.query(Row::new()).await.unwrap();
        f.orders.next().unwrap();

        let id = f.lines.create(row([("product", Value::from("springs"))])).unwrap();

        assert_eq!(f.lines.value(id, "order_id").unwrap(), Value::Int(2));
        assert!(f.lines.is_dirty());
        assert!(f.orders.is_dirty());
    }

    #[tokio::test]
    async fn test_external_bind_follows_parent() {
        let f = fixture();
        f.orders.query(Row::new()).await.unwrap();
        f.lines.query(Row::new()).await.unwrap();
        let id = f.lines.ids()[0];

        assert_eq!(f.lines.value(id, "customer").unwrap(), Value::from("acme"));

        let order = f.orders.current().unwrap();
        f.orders.set(order, "customer", "acme ltd").unwrap();
        assert_eq!(f.lines.value(id, "customer").unwrap(), Value::from("acme ltd"));
        assert_eq!(
            f.lines.current_data().unwrap().get("customer"),
            Some(&Value::from("acme ltd"))
        );

        let err = f.lines.set(id, "customer", "other").unwrap_err();
        assert!(matches!(err, Error::ReadOnlyBoundField { .. }));
    }

    #[tokio::test]
    async fn test_query_children() {
        let f = fixture();
        f.orders.query(Row::new()).await.unwrap();

        let results = f.orders.query_children().await.unwrap();

        let loaded = QueryResult::Loaded { count: 2, total: 2 };
        assert_eq!(results, vec![("lines".to_string(), loaded)]);
        assert_eq!(f.order_store.calls(Operation::Read), 1);
    }
}

// =============================================================================
// Cascading
// =============================================================================

mod cascading {
    use super::*;

    #[tokio::test]
    async fn test_moving_parent_stashes_detail_records() {
        let f = fixture();
        f.orders.query(Row::new()).await.unwrap();
        f.lines.query(Row::new()).await.unwrap();
        let edited = f.lines.ids()[1];
        f.lines.set(edited, "qty", 25).unwrap();

        f.orders.next().unwrap();

        assert!(f.lines.is_empty());
        assert!(!f.lines.is_dirty());
        assert!(f.orders.is_dirty());
        let first = f.orders.ids()[0];
        let stashed = f.orders.with_record(first, |r| r.status()).unwrap();
        assert_eq!(stashed, RecordStatus::Sync);

        f.lines.query(Row::new()).await.unwrap();
        assert_eq!(f.lines.len(), 1);

        f.orders.previous().unwrap();

        assert_eq!(f.lines.len(), 2);
        assert_eq!(f.lines.status(edited), Some(RecordStatus::Update));
        assert_eq!(f.lines.value(edited, "qty").unwrap(), Value::Int(25));
        assert_eq!(f.lines.current(), Some(f.lines.ids()[0]));
    }

    #[tokio::test]
    async fn test_detail_submits_independently() {
        let f = fixture();
        f.orders.query(Row::new()).await.unwrap();
        f.lines.query(Row::new()).await.unwrap();
        let line = f.lines.ids()[0];
        f.lines.set(line, "qty", 11).unwrap();

        let result = f.lines.submit().await.unwrap();

        assert!(result.is_success());
        assert!(!f.orders.is_dirty());
        assert_eq!(f.line_store.find(&Value::Int(1)).unwrap().get("qty"), Some(&Value::Int(11)));
        assert_eq!(f.order_store.write_calls(), 0);
    }

    #[tokio::test]
    async fn test_detail_validation_blocks_detail_submit() {
        let f = fixture();
        f.orders.query(Row::new()).await.unwrap();
        f.lines.query(Row::new()).await.unwrap();
        let line = f.lines.ids()[0];
        f.lines.set(line, "qty", 0).unwrap();

        let result = f.lines.submit().await.unwrap();

        assert!(!result.is_success());
        assert_eq!(f.line_store.write_calls(), 0);
        assert!(!f.lines.errors(line).unwrap().is_empty());
    }
}

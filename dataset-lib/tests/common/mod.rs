//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use dataset_lib::dataset::DataSet;
use dataset_lib::dataset::DataSetConfig;
use dataset_lib::dataset::Event;
use dataset_lib::error::TransportError;
use dataset_lib::model::Row;
use dataset_lib::model::Value;
use dataset_lib::model::row;
use dataset_lib::schema::FieldDescriptor;
use dataset_lib::schema::FieldType;
use dataset_lib::schema::Schema;
use dataset_lib::transport::InMemoryTransport;
use dataset_lib::transport::ReadRequest;
use dataset_lib::transport::ReadResponse;
use dataset_lib::transport::Transport;
use tokio::sync::oneshot;

/// `{id, name: required string, age: number, team}`
pub fn people_schema() -> Schema {
    Schema::new(vec![
        FieldDescriptor::new("id", FieldType::Number),
        FieldDescriptor::new("name", FieldType::String).required(),
        FieldDescriptor::new("age", FieldType::Number),
        FieldDescriptor::new("team", FieldType::String),
    ])
    .unwrap()
}

pub fn person(id: i64) -> Row {
    row([
        ("id", Value::Int(id)),
        ("name", Value::from(format!("person{id:02}"))),
        ("age", Value::Int(20 + id)),
        ("team", Value::from(if id % 2 == 0 { "even" } else { "odd" })),
    ])
}

pub fn seeded(count: i64) -> Arc<InMemoryTransport> {
    let transport = Arc::new(InMemoryTransport::new("id"));
    transport.seed((1..=count).map(person));
    transport
}

pub fn people(transport: Arc<dyn Transport>) -> DataSet {
    DataSet::with_transport(
        people_schema(),
        DataSetConfig::named("people").with_primary_key("id"),
        transport,
    )
}

/// Collects every event a data set emits.
pub fn record_events(ds: &DataSet) -> Arc<Mutex<Vec<Event>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    ds.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
    seen
}

/// Wraps an in-memory transport and holds selected calls until released.
///
/// Reads are gated by their `gate` parameter (removed before delegating),
/// writes by the operation name (`"create"`, `"update"`, `"destroy"`).
pub struct GatedTransport {
    pub inner: Arc<InMemoryTransport>,
    gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
    entered: AtomicUsize,
}

impl GatedTransport {
    pub fn new(inner: Arc<InMemoryTransport>) -> Self {
        Self {
            inner,
            gates: Mutex::new(HashMap::new()),
            entered: AtomicUsize::new(0),
        }
    }

    /// Registers a gate; the gated call waits until the sender fires (or is
    /// dropped).
    pub fn gate(&self, key: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().insert(key.to_string(), rx);
        tx
    }

    /// Number of gated calls that have started waiting.
    pub fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }

    pub async fn wait_entered(&self, count: usize) {
        while self.entered() < count {
            tokio::task::yield_now().await;
        }
    }

    async fn pass(&self, key: Option<String>) {
        let gate = key.and_then(|key| self.gates.lock().unwrap().remove(&key));
        if let Some(gate) = gate {
            self.entered.fetch_add(1, Ordering::SeqCst);
            let _ = gate.await;
        }
    }
}

#[async_trait]
impl Transport for GatedTransport {
    async fn read(&self, mut request: ReadRequest) -> Result<ReadResponse, TransportError> {
        let key = request.params.remove("gate").map(|v| v.to_key_string());
        self.pass(key).await;
        self.inner.read(request).await
    }

    async fn create(&self, rows: Vec<Row>) -> Result<Vec<Row>, TransportError> {
        self.pass(Some("create".into())).await;
        self.inner.create(rows).await
    }

    async fn update(&self, rows: Vec<Row>) -> Result<Vec<Row>, TransportError> {
        self.pass(Some("update".into())).await;
        self.inner.update(rows).await
    }

    async fn destroy(&self, rows: Vec<Row>) -> Result<Vec<Row>, TransportError> {
        self.pass(Some("destroy".into())).await;
        self.inner.destroy(rows).await
    }
}

//! Master-detail order entry against an in-memory backend.
//!
//! Run with: cargo run --example order_entry

use std::sync::Arc;

use dataset_lib::dataset::DataSet;
use dataset_lib::dataset::DataSetConfig;
use dataset_lib::dataset::SubmitResult;
use dataset_lib::model::Row;
use dataset_lib::model::Value;
use dataset_lib::model::row;
use dataset_lib::schema::FieldDescriptor;
use dataset_lib::schema::FieldType;
use dataset_lib::schema::Schema;
use dataset_lib::transport::InMemoryTransport;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let order_store = Arc::new(InMemoryTransport::new("id"));
    order_store.seed([row([("id", Value::Int(1)), ("customer", Value::from("acme"))])]);
    let line_store = Arc::new(InMemoryTransport::new("id"));

    let orders = DataSet::with_transport(
        Schema::new(vec![
            FieldDescriptor::new("id", FieldType::Number),
            FieldDescriptor::new("customer", FieldType::String).required(),
        ])?,
        DataSetConfig::named("orders").with_primary_key("id"),
        order_store,
    );
    let lines = DataSet::with_transport(
        Schema::new(vec![
            FieldDescriptor::new("id", FieldType::Number),
            FieldDescriptor::new("order_id", FieldType::Number),
            FieldDescriptor::new("product", FieldType::String).required(),
            FieldDescriptor::new("qty", FieldType::Number).min(1i64),
        ])?,
        DataSetConfig::named("lines").with_primary_key("id"),
        line_store.clone(),
    );
    orders.bind_child("lines", &lines, &[("id", "order_id")])?;

    orders.query(Row::new()).await?;
    println!("Loaded {} order(s)", orders.len());

    let line = lines.create(row([("product", Value::from("bolts"))]))?;
    lines.set(line, "qty", 0)?;

    match lines.submit().await? {
        SubmitResult::ValidationFailure(failures) => {
            for failure in &failures {
                println!("Rejected locally: {}", failure);
            }
        }
        other => println!("Unexpected: {:?}", other),
    }

    lines.set(line, "qty", 12)?;
    let result = lines.submit().await?;
    println!("Submitted: {}", result.is_success());
    println!("Stored lines: {:?}", line_store.rows());

    Ok(())
}

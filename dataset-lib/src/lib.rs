//! Reactive record-set data core
//!
//! An observable, hierarchical collection of records with typed fields,
//! validation, dirty tracking, paging and query binding, synchronized with
//! a remote source through a pluggable [`Transport`](transport::Transport).
//!
//! # Overview
//!
//! - [`schema`]: field descriptors resolved into a [`Schema`](schema::Schema)
//! - [`validation`]: the validator pipeline
//! - [`model`]: values, records and their lifecycle
//! - [`dataset`]: the [`DataSet`](dataset::DataSet) handle (query, submit,
//!   selection, master-detail, events)
//! - [`query`]: sort and filter expressions
//! - [`transport`]: the backend trait and an in-memory implementation
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use dataset_lib::dataset::{DataSet, DataSetConfig, SubmitResult};
//! use dataset_lib::model::{row, Value};
//! use dataset_lib::schema::{FieldDescriptor, FieldType, Schema};
//! use dataset_lib::transport::InMemoryTransport;
//!
//! let schema = Schema::new(vec![
//!     FieldDescriptor::new("id", FieldType::Number),
//!     FieldDescriptor::new("name", FieldType::String).required(),
//!     FieldDescriptor::new("age", FieldType::Number),
//! ])?;
//! let transport = Arc::new(InMemoryTransport::new("id"));
//! let config = DataSetConfig::named("people").with_primary_key("id");
//! let people = DataSet::with_transport(schema, config, transport);
//!
//! people.query(Default::default()).await?;
//! let id = people.create(row([("name", Value::from("Ada"))]))?;
//! people.set(id, "age", 36)?;
//! assert!(matches!(people.submit().await?, SubmitResult::Submitted(_)));
//! ```

pub mod dataset;
pub mod error;
pub mod model;
pub mod query;
pub mod schema;
pub mod transport;
pub mod validation;

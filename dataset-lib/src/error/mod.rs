//! Error types

mod dataset;
mod field;
mod schema;
mod transport;
mod validation;

pub use dataset::*;
pub use field::*;
pub use schema::*;
pub use transport::*;
pub use validation::*;

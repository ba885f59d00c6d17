//! Record model

mod id;
mod record;
mod value;

pub use id::*;
pub use record::*;
pub use value::*;

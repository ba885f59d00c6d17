//! Query expressions
//!
//! Sort and filter types folded into every [`ReadRequest`](crate::transport::ReadRequest).
//! Both are plain data: remote transports translate them into their own
//! query language, the in-memory transport evaluates them directly.

mod filter;
mod order;

pub use filter::*;
pub use order::*;

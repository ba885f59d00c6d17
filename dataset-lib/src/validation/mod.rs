//! Validation pipeline
//!
//! Every field runs an ordered set of checks: the implicit `required` and
//! type checks first, then the declared [`Validator`]s in declaration order.
//! Blocking failures (`ValueMissing`, `TypeMismatch`) stop the pipeline for
//! that field; the others accumulate unless
//! [`ValidationMode::FirstFailure`] is configured.
//!
//! Results are data, not errors: they are stored in the record's
//! `validation_errors` map for the UI to render.

mod pipeline;
mod result;
mod validator;

pub use pipeline::*;
pub use result::*;
pub use validator::*;

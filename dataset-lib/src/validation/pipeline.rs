//! Field and record validation

use std::collections::HashMap;

use log::trace;
use serde::Deserialize;
use serde::Serialize;

use super::ValidationContext;
use super::ValidationKind;
use super::ValidationMessage;
use super::ValidationResult;
use crate::model::Record;
use crate::model::Row;
use crate::model::Value;
use crate::schema::FieldDescriptor;
use crate::schema::Schema;

/// How many non-blocking failures a field collects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Collect every non-blocking failure.
    #[default]
    Accumulate,
    /// Stop at the first failure of any kind.
    FirstFailure,
}

/// Runs the pipeline for one value.
pub fn validate_value(
    value: &Value,
    ctx: &ValidationContext<'_>,
    mode: ValidationMode,
) -> ValidationResult {
    let field = ctx.field;

    if value.is_empty() {
        if field.is_required() {
            return ValidationResult::Invalid(vec![ValidationMessage::new(
                ValidationKind::ValueMissing,
                format!("Please input {}.", field.display_label()),
            )]);
        }
        return ValidationResult::Valid;
    }

    if let Some(mismatch) = type_mismatch(field, value) {
        return ValidationResult::Invalid(vec![mismatch]);
    }

    let mut failures = Vec::new();
    for validator in field.validators() {
        let found = match (field.is_multiple(), value, validator.is_elementwise()) {
            (true, Value::List(items), true) => items
                .iter()
                .filter(|item| !item.is_empty())
                .find_map(|item| validator.check(item, ctx)),
            _ => validator.check(value, ctx),
        };
        if let Some(message) = found {
            let blocking = message.kind.is_blocking();
            failures.push(message);
            if blocking || mode == ValidationMode::FirstFailure {
                break;
            }
        }
    }
    ValidationResult::from_messages(failures)
}

fn type_mismatch(field: &FieldDescriptor, value: &Value) -> Option<ValidationMessage> {
    let field_type = field.field_type();
    let ok = match (field.is_multiple(), value) {
        (true, Value::List(items)) => items.iter().all(|item| field_type.accepts(item)),
        (true, _) => false,
        (false, value) => field_type.accepts(value),
    };
    (!ok).then(|| {
        ValidationMessage::new(
            ValidationKind::TypeMismatch,
            format!("Please input a valid {} for {}.", field_type.name(), field.display_label()),
        )
    })
}

/// Runs the pipeline over the named fields of a record.
///
/// `peers` are the other records of the data set (used for uniqueness),
/// `external` holds the values of fields bound into an ancestor data set.
pub fn validate_fields<'n>(
    schema: &Schema,
    record: &Record,
    names: impl IntoIterator<Item = &'n str>,
    peers: &[&Record],
    external: &Row,
    mode: ValidationMode,
) -> Vec<(String, ValidationResult)> {
    names
        .into_iter()
        .filter_map(|name| {
            let field = schema.field(name)?;
            let ctx = ValidationContext {
                schema,
                field,
                record,
                peers,
                external,
            };
            let value = ctx.value_of(name);
            let result = validate_value(&value, &ctx, mode);
            trace!("validate {}.{} -> {:?}", record.id(), name, result);
            Some((name.to_string(), result))
        })
        .collect()
}

/// Runs the pipeline over every field of a record and returns the failing
/// fields only.
pub fn validate_record(
    schema: &Schema,
    record: &Record,
    peers: &[&Record],
    external: &Row,
    mode: ValidationMode,
) -> HashMap<String, Vec<ValidationMessage>> {
    validate_fields(schema, record, schema.names(), peers, external, mode)
        .into_iter()
        .filter(|(_, result)| result.is_invalid())
        .map(|(name, result)| (name, result.into_errors()))
        .collect()
}

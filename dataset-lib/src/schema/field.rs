//! Field descriptors

use std::sync::Arc;

use chrono::DateTime;
use chrono::NaiveDate;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::model::Value;
use crate::validation::CustomCheck;
use crate::validation::ValidationContext;
use crate::validation::Validator;

/// A value hook applied when rows cross the transport boundary.
pub type Transform = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// The declared type of a field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Accepts any value.
    #[default]
    Auto,
    /// Text.
    String,
    /// Integer, float or decimal.
    Number,
    /// True/false.
    Boolean,
    /// Date and time.
    Date,
    /// Text holding an email address.
    Email,
    /// Text holding an absolute URL.
    Url,
    /// Nested mapping.
    Object,
    /// Sequence of untyped values.
    List,
}

impl FieldType {
    /// Returns the type name used in messages.
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Auto => "auto",
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Email => "email",
            FieldType::Url => "url",
            FieldType::Object => "object",
            FieldType::List => "list",
        }
    }

    /// Returns `true` if a single (non-null) value conforms to this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) | (FieldType::Auto, _) => true,
            (FieldType::String, Value::String(_)) => true,
            (FieldType::Number, v) => v.is_number(),
            (FieldType::Boolean, Value::Bool(_)) => true,
            (FieldType::Date, Value::DateTime(_)) => true,
            (FieldType::Email, Value::String(s)) => email_address::EmailAddress::is_valid(s),
            (FieldType::Url, Value::String(s)) => url::Url::parse(s).is_ok(),
            (FieldType::Object, Value::Object(_)) => true,
            (FieldType::List, Value::List(_)) => true,
            _ => false,
        }
    }

    /// Converts loosely-typed input into this type where the conversion is
    /// unambiguous. Values that cannot be converted are returned unchanged
    /// and later fail the type check.
    pub fn coerce(&self, value: Value) -> Value {
        match (self, value) {
            (FieldType::Number, Value::String(s)) => {
                let trimmed = s.trim();
                if let Ok(n) = trimmed.parse::<i64>() {
                    Value::Int(n)
                } else if let Ok(n) = trimmed.parse::<f64>() {
                    Value::Float(n)
                } else {
                    Value::String(s)
                }
            }
            (FieldType::Boolean, Value::String(s)) => match s.as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => Value::String(s),
            },
            (FieldType::Date, Value::String(s)) => parse_date(&s)
                .map(Value::DateTime)
                .unwrap_or(Value::String(s)),
            (FieldType::Date, Value::Int(millis)) => DateTime::<Utc>::from_timestamp_millis(millis)
                .map(Value::DateTime)
                .unwrap_or(Value::Int(millis)),
            (_, value) => value,
        }
    }
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Whether a field is sent to the transport on submit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldIgnore {
    /// Always sent.
    #[default]
    Never,
    /// Never sent.
    Always,
    /// Sent only when changed from the synced value.
    Clean,
}

/// Declarative metadata for one attribute of a record.
///
/// Descriptors are built fluently and resolved into a
/// [`Schema`](super::Schema) once per data set.
///
/// # Example
///
/// ```
/// use dataset_lib::schema::{FieldDescriptor, FieldType};
///
/// let name = FieldDescriptor::new("name", FieldType::String)
///     .required()
///     .max_length(40);
/// let city = FieldDescriptor::new("city", FieldType::String).bind("address.city");
/// assert!(name.is_required());
/// assert_eq!(city.bind_path(), Some("address.city"));
/// ```
#[derive(Clone)]
pub struct FieldDescriptor {
    pub(crate) name: String,
    pub(crate) field_type: FieldType,
    pub(crate) label: Option<String>,
    pub(crate) required: bool,
    pub(crate) multiple: bool,
    pub(crate) unique: bool,
    pub(crate) bind: Option<String>,
    pub(crate) default_value: Option<Value>,
    pub(crate) ignore: FieldIgnore,
    pub(crate) validators: Vec<Validator>,
    pub(crate) transform_request: Option<Transform>,
    pub(crate) transform_response: Option<Transform>,
}

impl FieldDescriptor {
    /// Creates a descriptor with the given name and type.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            label: None,
            required: false,
            multiple: false,
            unique: false,
            bind: None,
            default_value: None,
            ignore: FieldIgnore::Never,
            validators: Vec::new(),
            transform_request: None,
            transform_response: None,
        }
    }

    // =========================================================================
    // Builder
    // =========================================================================

    /// Sets the display label used in validation messages.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Marks the field as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Declares the value as a sequence of elements of the field type.
    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    /// Requires the value to be unique among the records of the data set.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self.validators.push(Validator::unique());
        self
    }

    /// Derives the value from a dotted path into another field.
    ///
    /// Bound fields are read-only.
    pub fn bind(mut self, path: impl Into<String>) -> Self {
        self.bind = Some(path.into());
        self
    }

    /// Sets the value assigned to newly created records.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Sets whether the field is sent on submit.
    pub fn ignore(mut self, ignore: FieldIgnore) -> Self {
        self.ignore = ignore;
        self
    }

    /// Appends a validator. Validators run in declaration order.
    pub fn validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Requires string values to match a regular expression.
    pub fn pattern(self, pattern: impl Into<String>) -> Self {
        self.validator(Validator::pattern(pattern))
    }

    /// Sets the lower bound (numbers and dates).
    pub fn min(self, min: impl Into<Value>) -> Self {
        self.validator(Validator::min(min))
    }

    /// Sets the upper bound (numbers and dates).
    pub fn max(self, max: impl Into<Value>) -> Self {
        self.validator(Validator::max(max))
    }

    /// Requires numbers to be a multiple of `step` from the lower bound.
    pub fn step(self, step: f64) -> Self {
        self.validator(Validator::step(step))
    }

    /// Sets the minimum length in characters.
    pub fn min_length(self, min: usize) -> Self {
        self.validator(Validator::min_length(min))
    }

    /// Sets the maximum length in characters.
    pub fn max_length(self, max: usize) -> Self {
        self.validator(Validator::max_length(max))
    }

    /// Appends a custom predicate with a failure message.
    pub fn validate_with<F>(self, check: F) -> Self
    where
        F: Fn(&Value, &ValidationContext<'_>) -> Result<(), String> + Send + Sync + 'static,
    {
        let check: CustomCheck = Arc::new(check);
        self.validator(Validator::custom(check))
    }

    /// Transforms the value before it is sent to the transport.
    pub fn transform_request<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.transform_request = Some(Arc::new(f));
        self
    }

    /// Transforms the value when it arrives from the transport.
    pub fn transform_response<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.transform_response = Some(Arc::new(f));
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared type.
    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Returns the label, falling back to the name.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// Returns `true` if the field is required.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Returns `true` if the value is a sequence.
    pub fn is_multiple(&self) -> bool {
        self.multiple
    }

    /// Returns `true` if the field must be unique within the data set.
    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Returns the bind path, if the field is bound.
    pub fn bind_path(&self) -> Option<&str> {
        self.bind.as_deref()
    }

    /// Returns `true` if the field is derived from another field.
    pub fn is_bound(&self) -> bool {
        self.bind.is_some()
    }

    /// Returns the default value, if any.
    pub fn default(&self) -> Option<&Value> {
        self.default_value.as_ref()
    }

    /// Returns the ignore policy.
    pub fn ignore_policy(&self) -> FieldIgnore {
        self.ignore
    }

    /// Returns the declared validators.
    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    /// Normalizes a value written to or loaded into this field.
    pub(crate) fn coerce(&self, value: Value) -> Value {
        if !self.multiple {
            return self.field_type.coerce(value);
        }
        match value {
            Value::Null => Value::Null,
            Value::List(items) => Value::List(
                items
                    .into_iter()
                    .map(|v| self.field_type.coerce(v))
                    .collect(),
            ),
            single => Value::List(vec![self.field_type.coerce(single)]),
        }
    }

    /// Applies the response transform then coerces.
    pub(crate) fn load(&self, value: Value) -> Value {
        match &self.transform_response {
            Some(transform) => self.coerce(transform(&value)),
            None => self.coerce(value),
        }
    }

    /// Applies the request transform.
    pub(crate) fn dump(&self, value: &Value) -> Value {
        match &self.transform_request {
            Some(transform) => transform(value),
            None => value.clone(),
        }
    }
}

impl std::fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("field_type", &self.field_type)
            .field("required", &self.required)
            .field("multiple", &self.multiple)
            .field("unique", &self.unique)
            .field("bind", &self.bind)
            .field("default_value", &self.default_value)
            .field("ignore", &self.ignore)
            .field("validators", &self.validators)
            .finish_non_exhaustive()
    }
}

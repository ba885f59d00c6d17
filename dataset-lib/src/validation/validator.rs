//! Declared validators

use std::cmp::Ordering;
use std::sync::Arc;

use regex::Regex;

use super::ValidationKind;
use super::ValidationMessage;
use crate::model::Record;
use crate::model::Row;
use crate::model::Value;
use crate::model::RecordStatus;
use crate::schema::FieldDescriptor;
use crate::schema::Schema;

/// Type alias for custom validation predicates.
pub type CustomCheck =
    Arc<dyn Fn(&Value, &ValidationContext<'_>) -> Result<(), String> + Send + Sync>;

/// What a validator checks.
#[derive(Clone)]
pub enum Rule {
    /// Regular expression match on the textual value.
    Pattern {
        source: String,
        regex: Option<Regex>,
    },
    /// Lower bound.
    Min(Value),
    /// Upper bound.
    Max(Value),
    /// Numeric step from the lower bound (or zero).
    Step(f64),
    /// Minimum length in characters.
    MinLength(usize),
    /// Maximum length in characters.
    MaxLength(usize),
    /// No other live record of the data set holds the same value.
    Unique,
    /// Caller-supplied predicate.
    Custom(CustomCheck),
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rule::Pattern { source, .. } => f.debug_tuple("Pattern").field(source).finish(),
            Rule::Min(v) => f.debug_tuple("Min").field(v).finish(),
            Rule::Max(v) => f.debug_tuple("Max").field(v).finish(),
            Rule::Step(s) => f.debug_tuple("Step").field(s).finish(),
            Rule::MinLength(n) => f.debug_tuple("MinLength").field(n).finish(),
            Rule::MaxLength(n) => f.debug_tuple("MaxLength").field(n).finish(),
            Rule::Unique => f.write_str("Unique"),
            Rule::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// A single declared check with an optional message override.
///
/// # Example
///
/// ```
/// use dataset_lib::validation::{ValidationKind, Validator};
///
/// let v = Validator::max_length(8).with_message("Codes are at most 8 characters");
/// assert_eq!(v.kind(), ValidationKind::TooLong);
/// ```
#[derive(Debug, Clone)]
pub struct Validator {
    rule: Rule,
    message: Option<String>,
}

impl Validator {
    fn from_rule(rule: Rule) -> Self {
        Self {
            rule,
            message: None,
        }
    }

    /// Require the textual value to match a regular expression.
    pub fn pattern(source: impl Into<String>) -> Self {
        Self::from_rule(Rule::Pattern {
            source: source.into(),
            regex: None,
        })
    }

    /// Require the value to be at least `min`.
    pub fn min(min: impl Into<Value>) -> Self {
        Self::from_rule(Rule::Min(min.into()))
    }

    /// Require the value to be at most `max`.
    pub fn max(max: impl Into<Value>) -> Self {
        Self::from_rule(Rule::Max(max.into()))
    }

    /// Require the value to lie on a multiple of `step`.
    pub fn step(step: f64) -> Self {
        Self::from_rule(Rule::Step(step))
    }

    /// Require minimum length (in characters).
    pub fn min_length(min: usize) -> Self {
        Self::from_rule(Rule::MinLength(min))
    }

    /// Require maximum length (in characters).
    pub fn max_length(max: usize) -> Self {
        Self::from_rule(Rule::MaxLength(max))
    }

    /// Require uniqueness within the data set.
    pub fn unique() -> Self {
        Self::from_rule(Rule::Unique)
    }

    /// A custom predicate returning `Err(message)` on failure.
    pub fn custom(check: CustomCheck) -> Self {
        Self::from_rule(Rule::Custom(check))
    }

    /// Replaces the default failure message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Returns the rule.
    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    /// Returns the kind reported when this validator fails.
    pub fn kind(&self) -> ValidationKind {
        match self.rule {
            Rule::Pattern { .. } => ValidationKind::PatternMismatch,
            Rule::Min(_) => ValidationKind::RangeUnderflow,
            Rule::Max(_) => ValidationKind::RangeOverflow,
            Rule::Step(_) => ValidationKind::StepMismatch,
            Rule::MinLength(_) => ValidationKind::TooShort,
            Rule::MaxLength(_) => ValidationKind::TooLong,
            Rule::Unique => ValidationKind::UniqueConflict,
            Rule::Custom(_) => ValidationKind::Custom,
        }
    }

    /// Returns `true` if the rule applies to each element of a `multiple`
    /// value rather than to the whole sequence.
    pub(crate) fn is_elementwise(&self) -> bool {
        !matches!(self.rule, Rule::Unique | Rule::Custom(_))
    }

    /// Compiles pattern rules. Returns the regex error message on failure.
    pub(crate) fn compile(&mut self) -> Result<(), String> {
        if let Rule::Pattern { source, regex } = &mut self.rule
            && regex.is_none()
        {
            *regex = Some(Regex::new(source).map_err(|e| e.to_string())?);
        }
        Ok(())
    }

    /// Runs the check against one (non-empty) value.
    pub(crate) fn check(
        &self,
        value: &Value,
        ctx: &ValidationContext<'_>,
    ) -> Option<ValidationMessage> {
        let label = ctx.field.display_label();
        let failure = match &self.rule {
            Rule::Pattern { source, regex } => {
                let text = value
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| value.to_key_string());
                let matched = match regex {
                    Some(re) => re.is_match(&text),
                    None => Regex::new(source).map(|re| re.is_match(&text)).unwrap_or(true),
                };
                (!matched).then(|| format!("{} does not match the required format.", label))
            }
            Rule::Min(min) => (value.compare(min) == Some(Ordering::Less))
                .then(|| format!("{} must be greater than or equal to {}.", label, min)),
            Rule::Max(max) => (value.compare(max) == Some(Ordering::Greater))
                .then(|| format!("{} must be less than or equal to {}.", label, max)),
            Rule::Step(step) => step_failure(value, *step, lower_bound(ctx.field))
                .map(|(lo, hi)| {
                    format!(
                        "Please input a valid value. The two nearest valid values are {} and {}.",
                        lo, hi
                    )
                }),
            Rule::MinLength(min) => value.length().filter(|len| len < min).map(|len| {
                format!(
                    "Please lengthen {} to {} characters or more (currently {}).",
                    label, min, len
                )
            }),
            Rule::MaxLength(max) => value.length().filter(|len| len > max).map(|len| {
                format!(
                    "Please shorten {} to {} characters or less (currently {}).",
                    label, max, len
                )
            }),
            Rule::Unique => ctx
                .has_duplicate(value)
                .then(|| format!("{} must be unique.", label)),
            Rule::Custom(check) => check(value, ctx).err(),
        }?;
        Some(ValidationMessage::new(
            self.kind(),
            self.message.clone().unwrap_or(failure),
        ))
    }
}

fn lower_bound(field: &FieldDescriptor) -> f64 {
    field
        .validators()
        .iter()
        .find_map(|v| match &v.rule {
            Rule::Min(min) => min.as_f64(),
            _ => None,
        })
        .unwrap_or(0.0)
}

/// Returns the two nearest valid values when `value` is off-step.
fn step_failure(value: &Value, step: f64, base: f64) -> Option<(f64, f64)> {
    let n = value.as_f64()?;
    if step <= 0.0 {
        return None;
    }
    let steps = (n - base) / step;
    if (steps - steps.round()).abs() < 1e-9 {
        return None;
    }
    let lo = base + steps.floor() * step;
    Some((lo, lo + step))
}

/// Everything a validator may look at besides the value itself.
pub struct ValidationContext<'a> {
    pub(crate) schema: &'a Schema,
    pub(crate) field: &'a FieldDescriptor,
    pub(crate) record: &'a Record,
    pub(crate) peers: &'a [&'a Record],
    pub(crate) external: &'a Row,
}

impl<'a> ValidationContext<'a> {
    /// Returns the descriptor of the field being validated.
    pub fn field(&self) -> &FieldDescriptor {
        self.field
    }

    /// Returns the record being validated.
    pub fn record(&self) -> &Record {
        self.record
    }

    /// Returns the value of another field of the same record, resolving
    /// bound fields.
    pub fn value_of(&self, name: &str) -> Value {
        self.record.resolve(self.schema, name, self.external)
    }

    /// Returns the other live records of the data set.
    pub fn peers(&self) -> &[&Record] {
        self.peers
    }

    fn has_duplicate(&self, value: &Value) -> bool {
        let name = self.field.name();
        self.peers
            .iter()
            .filter(|peer| peer.id() != self.record.id() && peer.status() != RecordStatus::Delete)
            .any(|peer| same_value(&peer.value(self.schema, name), value))
    }
}

fn same_value(a: &Value, b: &Value) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a == b || (a.is_number() && b.is_number() && a.compare(b) == Some(Ordering::Equal))
}

//! Record: one row of typed field values with lifecycle tracking

use std::collections::HashMap;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use super::DataSetId;
use super::RecordId;
use super::Row;
use super::Value;
use crate::dataset::ChildCache;
use crate::error::Error;
use crate::error::FieldError;
use crate::error::FieldRejections;
use crate::schema::FieldIgnore;
use crate::schema::Schema;
use crate::schema::bind_rest;
use crate::schema::bind_root;
use crate::validation::ValidationKind;
use crate::validation::ValidationMessage;
use crate::validation::ValidationMode;
use crate::validation::ValidationResult;
use crate::validation::validate_record;

/// Lifecycle status of a record relative to the backend.
///
/// ```text
/// sync --set--> update --commit_sync--> sync
/// (create) --> add --commit_sync--> sync
/// any --remove--> delete --commit_sync--> (destroyed)
/// delete --restore--> prior status
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Matches the last synced snapshot.
    Sync,
    /// Created locally, never persisted.
    Add,
    /// Modified since the last sync.
    Update,
    /// Marked for deletion on the next submit.
    Delete,
}

/// What `reset()` did to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    /// Values were restored from the synced snapshot.
    Reverted,
    /// The record was never persisted and must be destroyed.
    Destroy,
}

/// A record owned by a data set.
///
/// Records hold stored field values as a [`Row`], the snapshot captured at
/// the last sync, and the per-field validation errors. Bound fields are not
/// stored; [`Record::value`] derives them from their source field.
///
/// # Example
///
/// ```
/// use dataset_lib::model::{row, DataSetId, Record, RecordStatus, Value};
/// use dataset_lib::schema::{FieldDescriptor, FieldType, Schema};
///
/// let schema = Schema::new(vec![FieldDescriptor::new("name", FieldType::String)]).unwrap();
/// let mut record = Record::synced(DataSetId::new(), &schema, row([("name", Value::from("Ada"))]));
///
/// record.set(&schema, "name", "Grace").unwrap();
/// assert_eq!(record.status(), RecordStatus::Update);
/// assert!(record.is_dirty());
///
/// record.commit_sync(&schema, row([("name", Value::from("Grace"))]));
/// assert_eq!(record.status(), RecordStatus::Sync);
/// assert!(!record.is_dirty());
/// ```
#[derive(Debug, Clone)]
pub struct Record {
    pub(crate) id: RecordId,
    pub(crate) dataset: DataSetId,
    pub(crate) status: RecordStatus,
    /// Status to return to when a deletion is restored.
    pub(crate) prior_status: Option<RecordStatus>,
    pub(crate) fields: Row,
    pub(crate) original_fields: Row,
    pub(crate) validation_errors: HashMap<String, Vec<ValidationMessage>>,
    pub(crate) selected: bool,
    /// Detail records stashed while this record is not the parent's current.
    pub(crate) children: HashMap<String, ChildCache>,
}

impl Record {
    fn empty(dataset: DataSetId, status: RecordStatus) -> Self {
        Self {
            id: RecordId::new(),
            dataset,
            status,
            prior_status: None,
            fields: Row::new(),
            original_fields: Row::new(),
            validation_errors: HashMap::new(),
            selected: false,
            children: HashMap::new(),
        }
    }

    /// Builds a synced record from a transport row.
    ///
    /// Declared fields are converted through the field's response transform
    /// and type coercion. Undeclared keys are kept verbatim so they round-trip
    /// on update.
    pub fn synced(dataset: DataSetId, schema: &Schema, row: Row) -> Self {
        let mut record = Self::empty(dataset, RecordStatus::Sync);
        record.merge_row(schema, row);
        for name in schema.stored_names() {
            record.fields.entry(name.to_string()).or_insert(Value::Null);
        }
        record.original_fields = record.fields.clone();
        record
    }

    /// Builds a new record with status `Add`.
    ///
    /// Defaults are applied first, then `initial`. Writes to undeclared or
    /// bound fields are rejected.
    pub fn added(dataset: DataSetId, schema: &Schema, initial: Row) -> Result<Self, Error> {
        let mut record = Self::empty(dataset, RecordStatus::Add);
        for descriptor in schema.fields().iter().filter(|d| !d.is_bound()) {
            let value = descriptor
                .default()
                .cloned()
                .map(|v| descriptor.coerce(v))
                .unwrap_or_default();
            record.fields.insert(descriptor.name().to_string(), value);
        }
        for (name, value) in initial {
            let descriptor = schema.field(&name).ok_or_else(|| FieldError::missing(&name))?;
            if let Some(bind) = descriptor.bind_path() {
                return Err(Error::read_only_bound(name, bind));
            }
            let value = descriptor.coerce(value);
            record.fields.insert(name, value);
        }
        Ok(record)
    }

    fn merge_row(&mut self, schema: &Schema, row: Row) {
        for (name, value) in row {
            match schema.field(&name) {
                Some(descriptor) if descriptor.is_bound() => {}
                Some(descriptor) => {
                    let value = descriptor.load(value);
                    self.fields.insert(name, value);
                }
                None => {
                    self.fields.insert(name, value);
                }
            }
        }
    }

    // =========================================================================
    // Metadata accessors
    // =========================================================================

    /// Returns the record identity.
    pub fn id(&self) -> RecordId {
        self.id
    }

    /// Returns the identity of the owning data set.
    pub fn dataset(&self) -> DataSetId {
        self.dataset
    }

    /// Returns the lifecycle status.
    pub fn status(&self) -> RecordStatus {
        self.status
    }

    /// Returns `true` if the record is selected.
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Returns the per-field validation failures.
    pub fn validation_errors(&self) -> &HashMap<String, Vec<ValidationMessage>> {
        &self.validation_errors
    }

    /// Returns the validation failures of one field.
    pub fn errors_for(&self, field: &str) -> &[ValidationMessage] {
        self.validation_errors
            .get(field)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns `true` if no validation failure is recorded.
    pub fn is_valid(&self) -> bool {
        self.validation_errors.values().all(Vec::is_empty)
    }

    // =========================================================================
    // Dirty tracking
    // =========================================================================

    /// Returns `true` if any field differs from the synced snapshot.
    pub fn is_dirty(&self) -> bool {
        self.fields.keys().chain(self.original_fields.keys()).any(|k| self.is_dirty_field(k))
    }

    /// Returns `true` if the field differs from the synced snapshot.
    pub fn is_dirty_field(&self, field: &str) -> bool {
        let current = self.fields.get(field).unwrap_or(&Value::Null);
        let original = self.original_fields.get(field).unwrap_or(&Value::Null);
        current != original
    }

    /// Returns the names of the fields that differ from the synced snapshot.
    pub fn changed_fields(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .fields
            .keys()
            .filter(|k| self.is_dirty_field(k))
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names
    }

    /// Returns the synced snapshot.
    pub fn original_fields(&self) -> &Row {
        &self.original_fields
    }

    /// Returns the synced value of a field.
    pub fn original(&self, field: &str) -> Option<&Value> {
        self.original_fields.get(field)
    }

    // =========================================================================
    // Raw field access
    // =========================================================================

    /// Returns a reference to a stored field value, if it exists.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns a reference to all stored fields.
    pub fn fields(&self) -> &Row {
        &self.fields
    }

    /// Returns the value of a field, deriving bound fields from their source.
    ///
    /// Missing values read as `Null`, as do fields bound into an ancestor
    /// data set; [`DataSet::value`](crate::dataset::DataSet::value) resolves
    /// those.
    pub fn value(&self, schema: &Schema, field: &str) -> Value {
        self.resolve(schema, field, &Row::new())
    }

    /// Like [`Record::value`], reading ancestor-bound fields from `external`.
    pub(crate) fn resolve(&self, schema: &Schema, field: &str, external: &Row) -> Value {
        if schema.is_external(field) {
            return external.get(field).cloned().unwrap_or_default();
        }
        match schema.field(field).and_then(|d| d.bind_path()) {
            Some(path) => {
                let source = self.resolve(schema, bind_root(path), external);
                source.get_path(bind_rest(path)).cloned().unwrap_or_default()
            }
            None => self.fields.get(field).cloned().unwrap_or_default(),
        }
    }

    /// Returns every declared field's value, bound fields included.
    pub fn data(&self, schema: &Schema) -> Row {
        self.resolve_data(schema, &Row::new())
    }

    pub(crate) fn resolve_data(&self, schema: &Schema, external: &Row) -> Row {
        schema
            .names()
            .map(|name| (name.to_string(), self.resolve(schema, name, external)))
            .collect()
    }

    // =========================================================================
    // Typed getters
    //
    // Return Err if the field is not stored or holds another type.
    // Return Ok(None) only if the field exists and is Value::Null.
    // =========================================================================

    /// Gets a string field value.
    pub fn get_string(&self, field: &str) -> Result<Option<&str>, FieldError> {
        match self.fields.get(field) {
            None => Err(FieldError::missing(field)),
            Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(FieldError::type_mismatch(field, "string", other.type_name())),
        }
    }

    /// Gets a boolean field value.
    pub fn get_bool(&self, field: &str) -> Result<Option<bool>, FieldError> {
        match self.fields.get(field) {
            None => Err(FieldError::missing(field)),
            Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(FieldError::type_mismatch(field, "bool", other.type_name())),
        }
    }

    /// Gets an integer field value.
    pub fn get_int(&self, field: &str) -> Result<Option<i64>, FieldError> {
        match self.fields.get(field) {
            None => Err(FieldError::missing(field)),
            Some(Value::Null) => Ok(None),
            Some(Value::Int(n)) => Ok(Some(*n)),
            Some(other) => Err(FieldError::type_mismatch(field, "int", other.type_name())),
        }
    }

    /// Gets a numeric field value as `f64` (allows widening from int and decimal).
    pub fn get_float(&self, field: &str) -> Result<Option<f64>, FieldError> {
        match self.fields.get(field) {
            None => Err(FieldError::missing(field)),
            Some(Value::Null) => Ok(None),
            Some(v) if v.is_number() => Ok(v.as_f64()),
            Some(other) => Err(FieldError::type_mismatch(field, "float", other.type_name())),
        }
    }

    /// Gets a DateTime field value.
    pub fn get_datetime(&self, field: &str) -> Result<Option<DateTime<Utc>>, FieldError> {
        match self.fields.get(field) {
            None => Err(FieldError::missing(field)),
            Some(Value::Null) => Ok(None),
            Some(Value::DateTime(dt)) => Ok(Some(*dt)),
            Some(other) => Err(FieldError::type_mismatch(field, "datetime", other.type_name())),
        }
    }

    /// Gets a list field value.
    pub fn get_list(&self, field: &str) -> Result<Option<&[Value]>, FieldError> {
        match self.fields.get(field) {
            None => Err(FieldError::missing(field)),
            Some(Value::Null) => Ok(None),
            Some(Value::List(items)) => Ok(Some(items)),
            Some(other) => Err(FieldError::type_mismatch(field, "list", other.type_name())),
        }
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Writes a declared, non-bound field.
    ///
    /// Returns the previous value when the stored value changed, `None` when
    /// the write was a no-op. A `Sync` record becomes `Update`; an `Update`
    /// record whose values all match the snapshot again becomes `Sync`.
    ///
    /// Revalidation is driven by the owning data set, which knows the peers
    /// needed for uniqueness; see [`Schema::dependents_of`] for the fields
    /// that must be rechecked with this one.
    pub fn set(
        &mut self,
        schema: &Schema,
        field: &str,
        value: impl Into<Value>,
    ) -> Result<Option<Value>, Error> {
        let descriptor = schema.field(field).ok_or_else(|| FieldError::missing(field))?;
        if let Some(bind) = descriptor.bind_path() {
            return Err(Error::read_only_bound(field, bind));
        }
        let value = descriptor.coerce(value.into());
        let old = self.fields.get(field).cloned().unwrap_or_default();
        if old == value {
            return Ok(None);
        }
        self.fields.insert(field.to_string(), value);
        self.refresh_status();
        Ok(Some(old))
    }

    fn refresh_status(&mut self) {
        match self.status {
            RecordStatus::Sync if self.is_dirty() => self.status = RecordStatus::Update,
            RecordStatus::Update if !self.is_dirty() => self.status = RecordStatus::Sync,
            _ => {}
        }
    }

    /// Restores every field from the synced snapshot.
    ///
    /// An `Add` record is left untouched and [`ResetOutcome::Destroy`] is
    /// returned; the owning data set removes it.
    pub fn reset(&mut self) -> ResetOutcome {
        if self.status == RecordStatus::Add {
            return ResetOutcome::Destroy;
        }
        self.fields = self.original_fields.clone();
        self.validation_errors.clear();
        self.status = RecordStatus::Sync;
        self.prior_status = None;
        ResetOutcome::Reverted
    }

    /// Merges a server response and makes it the new synced snapshot.
    pub fn commit_sync(&mut self, schema: &Schema, server_fields: Row) {
        self.merge_row(schema, server_fields);
        self.original_fields = self.fields.clone();
        self.validation_errors.clear();
        self.status = RecordStatus::Sync;
        self.prior_status = None;
    }

    /// Marks the record for deletion.
    ///
    /// Returns `false` for an `Add` record, which must be destroyed instead.
    pub fn mark_deleted(&mut self) -> bool {
        match self.status {
            RecordStatus::Add => false,
            RecordStatus::Delete => true,
            status => {
                self.prior_status = Some(status);
                self.status = RecordStatus::Delete;
                true
            }
        }
    }

    /// Reverts a pending deletion. Returns `false` if the record was not
    /// marked for deletion.
    pub fn restore(&mut self) -> bool {
        if self.status != RecordStatus::Delete {
            return false;
        }
        self.status = self.prior_status.take().unwrap_or(RecordStatus::Sync);
        self.refresh_status();
        true
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Validates every field in isolation (no peers, no ancestor values) and
    /// stores the failures. Returns `true` if the record is valid.
    pub fn validate(&mut self, schema: &Schema, mode: ValidationMode) -> bool {
        self.validation_errors = validate_record(schema, self, &[], &Row::new(), mode);
        self.validation_errors.is_empty()
    }

    /// Stores per-field results, clearing fields that passed.
    pub(crate) fn apply_validation(&mut self, results: Vec<(String, ValidationResult)>) {
        for (name, result) in results {
            match result {
                ValidationResult::Valid => {
                    self.validation_errors.remove(&name);
                }
                ValidationResult::Invalid(messages) => {
                    self.validation_errors.insert(name, messages);
                }
            }
        }
    }

    /// Records field errors reported by the backend.
    pub(crate) fn apply_rejections(&mut self, rejections: &FieldRejections) {
        for (field, messages) in rejections {
            let entry = self.validation_errors.entry(field.clone()).or_default();
            entry.extend(
                messages
                    .iter()
                    .map(|m| ValidationMessage::new(ValidationKind::ServerRejected, m.clone())),
            );
        }
    }

    // =========================================================================
    // Transport
    // =========================================================================

    /// Builds the row sent to the transport.
    ///
    /// Honors each field's ignore policy and request transform. `key` names a
    /// field that is always sent (the primary key).
    pub fn to_row(&self, schema: &Schema, key: Option<&str>) -> Row {
        let mut row = Row::with_capacity(self.fields.len());
        for (name, value) in &self.fields {
            let always = key == Some(name.as_str());
            match schema.field(name) {
                Some(descriptor) => {
                    let skip = match descriptor.ignore_policy() {
                        FieldIgnore::Never => false,
                        FieldIgnore::Always => true,
                        FieldIgnore::Clean => !self.is_dirty_field(name),
                    };
                    if !skip || always {
                        row.insert(name.clone(), descriptor.dump(value));
                    }
                }
                None => {
                    row.insert(name.clone(), value.clone());
                }
            }
        }
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::row;
    use crate::schema::FieldDescriptor;
    use crate::schema::FieldType;

    fn schema() -> Schema {
        Schema::new(vec![
            FieldDescriptor::new("id", FieldType::Number),
            FieldDescriptor::new("name", FieldType::String).required(),
            FieldDescriptor::new("age", FieldType::Number),
            FieldDescriptor::new("address", FieldType::Object),
            FieldDescriptor::new("city", FieldType::String).bind("address.city"),
            FieldDescriptor::new("secret", FieldType::String).ignore(FieldIgnore::Always),
            FieldDescriptor::new("note", FieldType::String).ignore(FieldIgnore::Clean),
        ])
        .unwrap()
    }

    fn synced(schema: &Schema) -> Record {
        Record::synced(
            DataSetId::new(),
            schema,
            row([
                ("id", Value::Int(1)),
                ("name", Value::from("Ada")),
                ("age", Value::from("36")),
                ("address", Value::Object(row([("city", Value::from("London"))]))),
                ("version", Value::Int(3)),
            ]),
        )
    }

    #[test]
    fn test_synced_coerces_and_keeps_extra_keys() {
        let schema = schema();
        let record = synced(&schema);
        assert_eq!(record.get_int("age").unwrap(), Some(36));
        assert_eq!(record.get_int("version").unwrap(), Some(3));
        assert_eq!(record.get_string("secret").unwrap(), None);
        assert!(!record.is_dirty());
        assert_eq!(record.status(), RecordStatus::Sync);
    }

    #[test]
    fn test_typed_getter_errors() {
        let schema = schema();
        let record = synced(&schema);
        assert_eq!(record.get_string("nope"), Err(FieldError::missing("nope")));
        assert_eq!(
            record.get_bool("name"),
            Err(FieldError::type_mismatch("name", "bool", "string"))
        );
    }

    #[test]
    fn test_set_marks_update_and_back() {
        let schema = schema();
        let mut record = synced(&schema);
        let old = record.set(&schema, "name", "Grace").unwrap();
        assert_eq!(old, Some(Value::from("Ada")));
        assert_eq!(record.status(), RecordStatus::Update);
        assert_eq!(record.changed_fields(), vec!["name"]);

        record.set(&schema, "name", "Ada").unwrap();
        assert_eq!(record.status(), RecordStatus::Sync);
        assert!(!record.is_dirty());
    }

    #[test]
    fn test_set_rejects_bound_and_unknown_fields() {
        let schema = schema();
        let mut record = synced(&schema);
        assert!(matches!(
            record.set(&schema, "city", "Paris"),
            Err(Error::ReadOnlyBoundField { .. })
        ));
        assert!(matches!(
            record.set(&schema, "nope", 1i64),
            Err(Error::Field(FieldError::Missing { .. }))
        ));
        assert!(!record.is_dirty());
    }

    #[test]
    fn test_bound_value_follows_source() {
        let schema = schema();
        let mut record = synced(&schema);
        assert_eq!(record.value(&schema, "city"), Value::from("London"));
        record
            .set(&schema, "address", Value::Object(row([("city", Value::from("Paris"))])))
            .unwrap();
        assert_eq!(record.value(&schema, "city"), Value::from("Paris"));
    }

    #[test]
    fn test_ancestor_bound_value_reads_context() {
        let schema = Schema::new(vec![
            FieldDescriptor::new("qty", FieldType::Number),
            FieldDescriptor::new("customer", FieldType::Object).bind("customer"),
            FieldDescriptor::new("city", FieldType::String).bind("customer.city"),
        ])
        .unwrap();
        let record = Record::synced(DataSetId::new(), &schema, row([("qty", Value::Int(2))]));
        assert_eq!(record.value(&schema, "customer"), Value::Null);

        let external = row([("customer", Value::Object(row([("city", Value::from("Oslo"))])))]);
        assert_eq!(record.resolve(&schema, "city", &external), Value::from("Oslo"));
        let data = record.resolve_data(&schema, &external);
        assert_eq!(data.get("qty"), Some(&Value::Int(2)));
        assert_eq!(data.get("city"), Some(&Value::from("Oslo")));
    }

    #[test]
    fn test_reset_restores_snapshot() {
        let schema = schema();
        let mut record = synced(&schema);
        record.set(&schema, "age", 40i64).unwrap();
        record.validation_errors.insert(
            "age".into(),
            vec![ValidationMessage::new(ValidationKind::Custom, "x")],
        );
        assert_eq!(record.reset(), ResetOutcome::Reverted);
        assert!(!record.is_dirty());
        assert!(record.is_valid());
        assert_eq!(record.status(), RecordStatus::Sync);
    }

    #[test]
    fn test_reset_on_added_requests_destroy() {
        let schema = schema();
        let mut record =
            Record::added(DataSetId::new(), &schema, row([("name", Value::from("x"))])).unwrap();
        assert_eq!(record.reset(), ResetOutcome::Destroy);
        assert_eq!(record.status(), RecordStatus::Add);
    }

    #[test]
    fn test_set_then_commit_sync_round_trip() {
        let schema = schema();
        let mut record = synced(&schema);
        record.set(&schema, "age", 41i64).unwrap();
        record.commit_sync(&schema, row([("age", Value::Int(41))]));
        assert!(!record.is_dirty());
        assert_eq!(record.original("age"), Some(&Value::Int(41)));
        assert_eq!(record.status(), RecordStatus::Sync);
    }

    #[test]
    fn test_delete_and_restore() {
        let schema = schema();
        let mut record = synced(&schema);
        record.set(&schema, "age", 50i64).unwrap();
        assert!(record.mark_deleted());
        assert_eq!(record.status(), RecordStatus::Delete);
        assert!(record.restore());
        assert_eq!(record.status(), RecordStatus::Update);
        assert!(!record.restore());
    }

    #[test]
    fn test_to_row_honors_ignore() {
        let schema = schema();
        let mut record = synced(&schema);
        let sent = record.to_row(&schema, Some("id"));
        assert!(!sent.contains_key("secret"));
        assert!(!sent.contains_key("note"));
        assert!(!sent.contains_key("city"));
        assert_eq!(sent.get("version"), Some(&Value::Int(3)));

        record.set(&schema, "note", "changed").unwrap();
        let sent = record.to_row(&schema, Some("id"));
        assert_eq!(sent.get("note"), Some(&Value::from("changed")));
    }

    #[test]
    fn test_validate_in_isolation() {
        let schema = schema();
        let mut record =
            Record::added(DataSetId::new(), &schema, row([("age", Value::Int(5))])).unwrap();
        assert!(!record.validate(&schema, ValidationMode::Accumulate));
        assert_eq!(record.errors_for("name")[0].kind, ValidationKind::ValueMissing);
    }
}

//! Data set configuration

use serde::Deserialize;
use serde::Serialize;

use super::SelectionMode;
use crate::validation::ValidationMode;

/// Behavior settings for a [`DataSet`](super::DataSet).
///
/// # Example
///
/// ```
/// use dataset_lib::dataset::{DataSetConfig, SelectionMode};
///
/// let config = DataSetConfig::named("orders")
///     .with_page_size(25)
///     .with_primary_key("id")
///     .with_cross_page_select(true)
///     .with_selection(SelectionMode::Multiple);
/// assert_eq!(config.page_size, 25);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSetConfig {
    /// Name used in log output.
    pub name: String,

    /// Rows per page.
    ///
    /// Default: 10
    pub page_size: usize,

    /// Whether reads are paged. When disabled the full result is loaded.
    ///
    /// Default: true
    pub paging: bool,

    /// Field holding the backend identity of a record. Always sent on
    /// update and destroy, and used as the selection key across pages.
    pub primary_key: Option<String>,

    /// Selection behavior.
    ///
    /// Default: [`SelectionMode::Multiple`]
    pub selection: SelectionMode,

    /// Track selection by primary key so it survives re-fetching.
    ///
    /// Default: false
    pub cross_page_select: bool,

    /// How many failures a field collects.
    pub validation_mode: ValidationMode,

    /// Create an empty record when a query loads nothing.
    ///
    /// Default: false
    pub auto_create: bool,
}

impl Default for DataSetConfig {
    fn default() -> Self {
        Self {
            name: String::from("dataset"),
            page_size: 10,
            paging: true,
            primary_key: None,
            selection: SelectionMode::Multiple,
            cross_page_select: false,
            validation_mode: ValidationMode::Accumulate,
            auto_create: false,
        }
    }
}

impl DataSetConfig {
    /// Creates a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a config with default values and the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the page size. A size of 0 is treated as 1.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Enables or disables paging.
    pub fn with_paging(mut self, paging: bool) -> Self {
        self.paging = paging;
        self
    }

    /// Sets the primary key field.
    pub fn with_primary_key(mut self, field: impl Into<String>) -> Self {
        self.primary_key = Some(field.into());
        self
    }

    /// Sets the selection mode.
    pub fn with_selection(mut self, mode: SelectionMode) -> Self {
        self.selection = mode;
        self
    }

    /// Enables or disables cross-page selection.
    pub fn with_cross_page_select(mut self, enabled: bool) -> Self {
        self.cross_page_select = enabled;
        self
    }

    /// Sets the validation mode.
    pub fn with_validation_mode(mut self, mode: ValidationMode) -> Self {
        self.validation_mode = mode;
        self
    }

    /// Enables or disables creating a record on empty loads.
    pub fn with_auto_create(mut self, enabled: bool) -> Self {
        self.auto_create = enabled;
        self
    }

    /// Config suited to a query (search form) data set: unpaged, no
    /// selection, always holding one record.
    pub fn query_form(name: impl Into<String>) -> Self {
        Self::named(name)
            .with_paging(false)
            .with_selection(SelectionMode::None)
            .with_auto_create(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DataSetConfig::default();
        assert_eq!(config.page_size, 10);
        assert!(config.paging);
        assert_eq!(config.selection, SelectionMode::Multiple);
        assert!(!config.cross_page_select);
    }

    #[test]
    fn test_deserialize_partial() {
        let json = r#"{"name":"lines","page_size":50,"validation_mode":"first_failure"}"#;
        let config: DataSetConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.name, "lines");
        assert_eq!(config.page_size, 50);
        assert_eq!(config.validation_mode, ValidationMode::FirstFailure);
        assert!(config.paging);
    }
}

//! Request and response types of the admin service.
//!
//! These are plain serde types so a transport layer can decode query
//! strings into [`ListParams`] and encode every response as JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strata_db::registry::{FieldMetadata, PermissionAction};

/// Parameters of a list call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListParams {
    /// The page number, 1-indexed. `0` is treated as `1`.
    pub page: u64,
    /// Page size; `None` uses the configured default. Clamped to the
    /// configured maximum.
    pub per_page: Option<u64>,
    /// Substring matched against the model's search fields.
    pub search: Option<String>,
    /// Ordering column, `-` prefixed for descending.
    pub ordering: Option<String>,
    /// Equality filters as raw text, keyed by field name.
    pub filters: BTreeMap<String, String>,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: None,
            search: None,
            ordering: None,
            filters: BTreeMap::new(),
        }
    }
}

impl ListParams {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn page(mut self, page: u64) -> Self {
        self.page = page;
        self
    }

    #[must_use]
    pub const fn per_page(mut self, per_page: u64) -> Self {
        self.per_page = Some(per_page);
        self
    }

    #[must_use]
    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    #[must_use]
    pub fn ordering(mut self, spec: impl Into<String>) -> Self {
        self.ordering = Some(spec.into());
        self
    }

    #[must_use]
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(field.into(), value.into());
        self
    }
}

/// One page of a list call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResponse {
    /// Redacted rows of the current page.
    pub results: Vec<serde_json::Value>,
    /// Rows matching the filters and search, across all pages.
    pub count: u64,
    /// The page served, after `0` is treated as `1`.
    pub page: u64,
    /// Page size after applying the default and the maximum.
    pub per_page: u64,
    /// At least 1, even when nothing matched.
    pub total_pages: u64,
}

impl ListResponse {
    /// Number of pages needed for `count` rows.
    pub fn total_pages(count: u64, per_page: u64) -> u64 {
        count.div_ceil(per_page.max(1)).max(1)
    }
}

/// The models a caller may see, grouped by app.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexResponse {
    /// Apps with at least one visible model, in the order their first
    /// model was registered.
    pub apps: Vec<AppModels>,
}

/// Models of one app, in registration order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppModels {
    /// App label, `default` when the model was registered without one.
    pub app: String,
    /// Models of this app the caller may act on.
    pub models: Vec<ModelInfo>,
}

/// Summary of one model for the index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    /// Registry name, used to address the model in later calls.
    pub name: String,
    pub display_name: String,
    /// Front-end icon hint, if one was registered.
    pub icon: Option<String>,
    /// Verbs the caller may perform on this model.
    pub actions: Vec<PermissionAction>,
}

/// What a front-end needs to render forms and lists for one model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaResponse {
    /// Registry name.
    pub name: String,
    pub app: String,
    pub display_name: String,
    /// Front-end icon hint, if one was registered.
    pub icon: Option<String>,
    /// Visible fields only: hidden and excluded fields are left out.
    pub fields: Vec<FieldMetadata>,
    /// Columns for the list view; every visible column when none were
    /// registered.
    pub list_display: Vec<String>,
    /// Fields matched by `ListParams::search`.
    pub search_fields: Vec<String>,
    /// Fields accepted by `ListParams::filter`.
    pub filter_fields: Vec<String>,
    /// Verbs the caller may perform on this model.
    pub actions: Vec<PermissionAction>,
}

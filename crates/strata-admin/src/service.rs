//! The admin service: generic CRUD over registered models.
//!
//! [`AdminService`] resolves a model by name in the [`ModelRegistry`] and
//! reads and writes its table through the dynamic operations of
//! `strata_db::executor`, so no per-model code is needed. Every call is
//! gated in the same order:
//!
//! 1. the caller must be active staff or a superuser,
//! 2. the model must be registered,
//! 3. the verb must be among the model's allowed permissions,
//! 4. the caller must hold the `<verb>_<model>` permission.
//!
//! Excluded and hidden fields never appear in responses and are ignored in
//! input.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use strata_auth::Caller;
use strata_core::logging::admin_span;
use strata_core::settings::AdminSettings;
use strata_core::{StrataError, StrataResult, ValidationError};
use strata_db::executor::{delete_by_id, fetch_by_id, insert_values, update_values, DbExecutor};
use strata_db::fields::FieldDef;
use strata_db::query::{OrderBy, Query, Row, SqlCompiler};
use strata_db::registry::{FieldMetadata, ModelMetadata, ModelRegistry, PermissionAction};
use strata_db::value::Value;
use tracing::Instrument;

use crate::api::{AppModels, IndexResponse, ListParams, ListResponse, ModelInfo, SchemaResponse};

/// Generic admin operations over every registered model.
#[derive(Clone)]
pub struct AdminService {
    registry: Arc<ModelRegistry>,
    db: Arc<dyn DbExecutor>,
    settings: AdminSettings,
}

impl std::fmt::Debug for AdminService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminService")
            .field("models", &self.registry.names())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl AdminService {
    pub fn new(
        registry: Arc<ModelRegistry>,
        db: Arc<dyn DbExecutor>,
        settings: AdminSettings,
    ) -> Self {
        Self {
            registry,
            db,
            settings,
        }
    }

    pub fn settings(&self) -> &AdminSettings {
        &self.settings
    }

    // ── Metadata ───────────────────────────────────────────────────────

    /// The models the caller may act on, grouped by app in registration
    /// order. Models where the caller holds no verb are left out.
    pub fn index(&self, caller: &Caller) -> StrataResult<IndexResponse> {
        let _span = admin_span("*", "index").entered();
        ensure_admin_access(caller)?;

        let mut apps: Vec<AppModels> = Vec::new();
        for entry in self.registry.list() {
            let actions = caller_actions(caller, &entry);
            if actions.is_empty() {
                continue;
            }
            let info = ModelInfo {
                name: entry.name.clone(),
                display_name: entry.display_name.clone(),
                icon: entry.icon.clone(),
                actions,
            };
            match apps.iter_mut().find(|a| a.app == entry.app) {
                Some(app) => app.models.push(info),
                None => apps.push(AppModels {
                    app: entry.app.clone(),
                    models: vec![info],
                }),
            }
        }
        Ok(IndexResponse { apps })
    }

    /// Field and option metadata for one model. Requires `view`.
    pub fn schema(&self, caller: &Caller, model: &str) -> StrataResult<SchemaResponse> {
        let _span = admin_span(model, "schema").entered();
        let entry = self.authorize(caller, model, PermissionAction::View)?;

        let fields: Vec<FieldMetadata> = entry
            .fields
            .iter()
            .filter(|f| !f.hidden && !entry.is_excluded(&f.name))
            .cloned()
            .collect();
        let list_display = if entry.options.list_display.is_empty() {
            fields
                .iter()
                .filter(|f| entry.meta.has_column(&f.name))
                .map(|f| f.name.clone())
                .collect()
        } else {
            entry.options.list_display.clone()
        };

        Ok(SchemaResponse {
            name: entry.name.clone(),
            app: entry.app.clone(),
            display_name: entry.display_name.clone(),
            icon: entry.icon.clone(),
            fields,
            list_display,
            search_fields: entry.options.search_fields.clone(),
            filter_fields: entry.options.filter_fields.clone(),
            actions: caller_actions(caller, &entry),
        })
    }

    // ── CRUD ───────────────────────────────────────────────────────────

    /// One page of rows, filtered, searched and ordered. Requires `view`.
    pub async fn list(
        &self,
        caller: &Caller,
        model: &str,
        params: ListParams,
    ) -> StrataResult<ListResponse> {
        async {
            let entry = self.authorize(caller, model, PermissionAction::View)?;
            let mut query = Query::new(&entry.table);

            for (name, raw) in &params.filters {
                if !entry.options.filter_fields.contains(name) {
                    return Err(StrataError::BadRequest(format!(
                        "Cannot filter {model} on '{name}'"
                    )));
                }
                let field = column(&entry, name)?;
                let value = field.value_from_str(raw).map_err(|e| field_error(name, e))?;
                query.add_filter(name.clone(), value);
            }

            if let Some(term) = params.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
                query.search(entry.options.search_fields.clone(), term);
            }

            let order = match params.ordering.as_deref().filter(|s| !s.is_empty()) {
                Some(spec) => {
                    let order = OrderBy::parse(spec);
                    if !is_visible_column(&entry, &order.column) {
                        return Err(StrataError::BadRequest(format!(
                            "Cannot order {model} by '{}'",
                            order.column
                        )));
                    }
                    order
                }
                None => OrderBy::asc("id"),
            };
            query.order_by = Some(order);

            let per_page = params
                .per_page
                .unwrap_or(self.settings.per_page)
                .clamp(1, self.settings.max_per_page.max(1));
            let page = params.page.max(1);

            let (sql, values) = SqlCompiler::compile_count(&query);
            let total: i64 = self.db.query_one(&sql, &values).await?.get_by_index(0)?;
            let count = u64::try_from(total).unwrap_or(0);

            // A page past the last row is empty; skip the select.
            let rows = match (page - 1).checked_mul(per_page).filter(|&offset| offset < count) {
                Some(offset) => {
                    query.limit = Some(per_page);
                    query.offset = Some(offset);
                    let (sql, values) = SqlCompiler::compile_select(&query);
                    self.db.query(&sql, &values).await?
                }
                None => Vec::new(),
            };

            tracing::debug!(count, page, per_page, "Listed rows");
            Ok(ListResponse {
                results: rows.iter().map(|row| redact(&entry, row)).collect(),
                count,
                page,
                per_page,
                total_pages: ListResponse::total_pages(count, per_page),
            })
        }
        .instrument(admin_span(model, "list"))
        .await
    }

    /// One row by id. Requires `view`.
    pub async fn get(&self, caller: &Caller, model: &str, id: i64) -> StrataResult<serde_json::Value> {
        async {
            let entry = self.authorize(caller, model, PermissionAction::View)?;
            let row = self.fetch(&entry, id).await?;
            Ok(redact(&entry, &row))
        }
        .instrument(admin_span(model, "get"))
        .await
    }

    /// Inserts a row from a JSON object and returns it. Requires `add`.
    pub async fn create(
        &self,
        caller: &Caller,
        model: &str,
        input: &serde_json::Value,
    ) -> StrataResult<serde_json::Value> {
        async {
            let entry = self.authorize(caller, model, PermissionAction::Add)?;
            let values = parse_input(&entry, input, true)?;
            let id = insert_values(self.db.as_ref(), entry.meta, values).await?;
            tracing::info!(id, user = %caller.username, "Created row");
            let row = self.fetch(&entry, id).await?;
            Ok(redact(&entry, &row))
        }
        .instrument(admin_span(model, "create"))
        .await
    }

    /// Applies the fields present in a JSON object to row `id` and returns
    /// the updated row. Requires `change`.
    pub async fn update(
        &self,
        caller: &Caller,
        model: &str,
        id: i64,
        input: &serde_json::Value,
    ) -> StrataResult<serde_json::Value> {
        async {
            let entry = self.authorize(caller, model, PermissionAction::Change)?;
            self.fetch(&entry, id).await?;
            let values = parse_input(&entry, input, false)?;
            update_values(self.db.as_ref(), entry.meta, id, values).await?;
            tracing::info!(id, user = %caller.username, "Updated row");
            let row = self.fetch(&entry, id).await?;
            Ok(redact(&entry, &row))
        }
        .instrument(admin_span(model, "update"))
        .await
    }

    /// Deletes row `id`. Requires `delete`.
    pub async fn delete(&self, caller: &Caller, model: &str, id: i64) -> StrataResult<()> {
        async {
            let entry = self.authorize(caller, model, PermissionAction::Delete)?;
            if delete_by_id(self.db.as_ref(), entry.meta, id).await? == 0 {
                return Err(not_found(&entry, id));
            }
            tracing::info!(id, user = %caller.username, "Deleted row");
            Ok(())
        }
        .instrument(admin_span(model, "delete"))
        .await
    }

    // ── Helpers ────────────────────────────────────────────────────────

    fn authorize(
        &self,
        caller: &Caller,
        model: &str,
        action: PermissionAction,
    ) -> StrataResult<Arc<ModelMetadata>> {
        ensure_admin_access(caller)?;
        let entry = self.registry.require(model)?;
        if !entry.allows(action) {
            return Err(StrataError::PermissionDenied(format!(
                "{action} is not enabled for {model}"
            )));
        }
        if !caller.can(action, &entry.name) {
            tracing::warn!(user = %caller.username, %action, "Permission denied");
            return Err(StrataError::PermissionDenied(format!(
                "You do not have permission to {action} {model}"
            )));
        }
        Ok(entry)
    }

    async fn fetch(&self, entry: &ModelMetadata, id: i64) -> StrataResult<Row> {
        fetch_by_id(self.db.as_ref(), entry.meta, id)
            .await?
            .ok_or_else(|| not_found(entry, id))
    }
}

fn ensure_admin_access(caller: &Caller) -> StrataResult<()> {
    if caller.can_access_admin() {
        return Ok(());
    }
    tracing::warn!(user = %caller.username, "Admin access denied");
    Err(StrataError::PermissionDenied(
        "Admin access requires an active staff account".to_string(),
    ))
}

fn caller_actions(caller: &Caller, entry: &ModelMetadata) -> Vec<PermissionAction> {
    entry
        .permissions
        .iter()
        .copied()
        .filter(|&action| caller.can(action, &entry.name))
        .collect()
}

fn not_found(entry: &ModelMetadata, id: i64) -> StrataError {
    StrataError::NotFound(format!("{} with id {id} does not exist", entry.name))
}

fn field_error(name: &str, error: ValidationError) -> StrataError {
    StrataError::ValidationError(ValidationError::with_field_errors(BTreeMap::from([(
        name.to_string(),
        vec![error],
    )])))
}

fn column<'a>(entry: &'a ModelMetadata, name: &str) -> StrataResult<&'a FieldDef> {
    entry
        .meta
        .columns()
        .find(|f| f.name == name)
        .ok_or_else(|| StrataError::BadRequest(format!("{} has no column '{name}'", entry.name)))
}

fn is_visible_column(entry: &ModelMetadata, name: &str) -> bool {
    entry
        .meta
        .columns()
        .any(|f| f.name == name && !f.hidden && !entry.is_excluded(name))
}

/// Serializes a row without hidden or excluded fields.
fn redact(entry: &ModelMetadata, row: &Row) -> serde_json::Value {
    let mut map = entry.meta.row_to_json(row);
    map.retain(|name, _| !entry.is_excluded(name));
    serde_json::Value::Object(map)
}

/// Converts a JSON object into column values for an insert or update.
///
/// Only writable fields are read: `id`, hidden, excluded and unknown keys
/// are ignored. When `creating`, a field that is absent, not nullable and
/// has no default is reported as required. All field errors are collected
/// before failing.
fn parse_input(
    entry: &ModelMetadata,
    input: &serde_json::Value,
    creating: bool,
) -> StrataResult<HashMap<String, Value>> {
    let object = input.as_object().ok_or_else(|| {
        StrataError::BadRequest("Request body must be a JSON object".to_string())
    })?;

    let mut values = HashMap::new();
    let mut errors: BTreeMap<String, Vec<ValidationError>> = BTreeMap::new();
    for field in entry.meta.data_fields() {
        if field.hidden || entry.is_excluded(field.name) {
            continue;
        }
        match object.get(field.name) {
            Some(raw) => {
                let parsed = field
                    .value_from_json(raw)
                    .and_then(|value| field.validate_value(&value).map(|()| value));
                match parsed {
                    Ok(value) => {
                        values.insert(field.name.to_string(), value);
                    }
                    Err(err) => errors.entry(field.name.to_string()).or_default().push(err),
                }
            }
            None if creating && !field.null && field.default.is_none() => {
                errors
                    .entry(field.name.to_string())
                    .or_default()
                    .push(ValidationError::new("This field is required.", "required"));
            }
            None => {}
        }
    }

    if errors.is_empty() {
        Ok(values)
    } else {
        Err(StrataError::ValidationError(ValidationError::with_field_errors(errors)))
    }
}

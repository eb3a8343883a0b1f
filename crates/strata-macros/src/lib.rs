//! # strata-macros
//!
//! Procedural macros for strata. Currently provides `#[derive(Model)]`,
//! which implements `strata_db::model::Model` for a named struct.
//!
//! This crate is independent of the other strata crates because proc-macro
//! crates cannot depend on crates that use them. Generated code refers to
//! `::strata_db`, so the deriving crate must depend on `strata-db`.

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod model;

/// Derives `strata_db::model::Model`.
///
/// The struct must have an `id: Option<i64>` field. Every other field is a
/// column unless marked `many_to_many`.
///
/// Struct attributes, `#[model(...)]`:
/// - `name = "..."` - model name (defaults to the struct name)
/// - `table = "..."` - table name (defaults to the pluralized, lower-cased name)
///
/// Field attributes, `#[field(...)]`:
/// - `max_length = n`, `min_length = n`
/// - `unique`, `null`, `hidden`, `email`
/// - `default = "..."` - a literal; parsed as a Rust expression for
///   non-text fields (`default = "true"`, `default = "0"`)
/// - `default_fn = "path::to::fn"` - a `fn() -> Value` invoked per save
/// - `foreign_key = "Model"`, `on_delete = "..."`, `on_update = "..."`
///   (`cascade`, `restrict`, `set_null`, `set_default`, `no_action`)
/// - `many_to_many = "Model"` - the field's type must be `ManyToMany`
///
/// `Option<T>` fields are not implicitly nullable; add `null` to allow NULL
/// in the column.
#[proc_macro_derive(Model, attributes(model, field))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    model::derive_model_impl(input).into()
}

//! `#[derive(Model)]` implementation.
//!
//! Generates the `strata_db::model::Model` impl for a struct: a lazily built
//! `ModelMeta`, the id accessors, column values, and row hydration.

use darling::{FromDeriveInput, FromField};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Type};

/// Struct-level attributes parsed from `#[model(...)]`.
#[derive(Debug, FromDeriveInput)]
#[darling(attributes(model), supports(struct_named))]
pub struct ModelOpts {
    pub ident: syn::Ident,
    pub data: darling::ast::Data<(), FieldOpts>,

    /// The model name; defaults to the struct name.
    #[darling(default)]
    pub name: Option<String>,

    /// The table name; defaults to the pluralized, lower-cased model name.
    #[darling(default)]
    pub table: Option<String>,
}

/// Per-field attributes parsed from `#[field(...)]`.
#[derive(Debug, FromField)]
#[darling(attributes(field))]
pub struct FieldOpts {
    pub ident: Option<syn::Ident>,
    pub ty: syn::Type,

    /// Maximum text length; makes a `String` field a bounded `Char` field.
    #[darling(default)]
    pub max_length: Option<u32>,

    /// Minimum text length.
    #[darling(default)]
    pub min_length: Option<u32>,

    /// Unique constraint.
    #[darling(default)]
    pub unique: bool,

    /// Allow NULL.
    #[darling(default)]
    pub null: bool,

    /// Literal default, as source text.
    #[darling(default)]
    pub default: Option<String>,

    /// Default producer invoked on each save.
    #[darling(default)]
    pub default_fn: Option<syn::Path>,

    /// Store as an email field.
    #[darling(default)]
    pub email: bool,

    /// Never serialize the field.
    #[darling(default)]
    pub hidden: bool,

    /// Foreign key target model.
    #[darling(default)]
    pub foreign_key: Option<String>,

    /// ON DELETE behavior.
    #[darling(default)]
    pub on_delete: Option<String>,

    /// ON UPDATE behavior.
    #[darling(default)]
    pub on_update: Option<String>,

    /// Many-to-many target model.
    #[darling(default)]
    pub many_to_many: Option<String>,
}

impl FieldOpts {
    fn name(&self) -> String {
        self.ident
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default()
    }

    fn is_id(&self) -> bool {
        self.ident.as_ref().is_some_and(|i| i == "id")
    }
}

/// Generates the `Model` trait implementation for the given derive input.
pub fn derive_model_impl(input: DeriveInput) -> TokenStream {
    let opts = match ModelOpts::from_derive_input(&input) {
        Ok(o) => o,
        Err(e) => return e.write_errors(),
    };
    match expand(&opts) {
        Ok(tokens) => tokens,
        Err(e) => e.to_compile_error(),
    }
}

fn expand(opts: &ModelOpts) -> syn::Result<TokenStream> {
    let struct_name = &opts.ident;
    let Some(fields) = opts.data.as_ref().take_struct() else {
        return Err(syn::Error::new_spanned(
            struct_name,
            "#[derive(Model)] only supports structs with named fields",
        ));
    };
    let fields = fields.fields;

    let model_name = opts.name.clone().unwrap_or_else(|| struct_name.to_string());
    let table_tokens = match &opts.table {
        Some(table) => quote! { ::core::option::Option::Some(#table) },
        None => quote! { ::core::option::Option::None },
    };

    match fields.iter().find(|f| f.is_id()) {
        Some(id) if type_to_string(&id.ty).replace(' ', "") == "Option<i64>" => {}
        Some(id) => {
            return Err(syn::Error::new_spanned(
                &id.ty,
                "the `id` field must have type `Option<i64>`",
            ))
        }
        None => {
            return Err(syn::Error::new_spanned(
                struct_name,
                "#[derive(Model)] requires an `id: Option<i64>` field",
            ))
        }
    }

    let declared: Vec<&&FieldOpts> = fields.iter().filter(|f| !f.is_id()).collect();

    let field_defs = declared
        .iter()
        .map(|f| generate_field_def(f))
        .collect::<syn::Result<Vec<_>>>()?;

    let field_values: Vec<TokenStream> = declared
        .iter()
        .filter(|f| f.many_to_many.is_none())
        .map(|f| {
            let ident = f.ident.as_ref();
            let name = f.name();
            quote! {
                (#name, ::strata_db::value::Value::from(::core::clone::Clone::clone(&self.#ident)))
            }
        })
        .collect();

    let from_row: Vec<TokenStream> = declared
        .iter()
        .map(|f| {
            let ident = f.ident.as_ref();
            let name = f.name();
            if f.many_to_many.is_some() {
                quote! { #ident: ::core::default::Default::default() }
            } else {
                quote! { #ident: row.get(#name)? }
            }
        })
        .collect();

    Ok(quote! {
        impl ::strata_db::model::Model for #struct_name {
            fn meta() -> &'static ::strata_db::model::ModelMeta {
                static META: ::std::sync::LazyLock<::strata_db::model::ModelMeta> =
                    ::std::sync::LazyLock::new(|| {
                        ::strata_db::model::ModelMeta::new(
                            #model_name,
                            #table_tokens,
                            ::std::vec![#(#field_defs),*],
                        )
                    });
                &META
            }

            fn id(&self) -> ::core::option::Option<i64> {
                self.id
            }

            fn set_id(&mut self, id: ::core::option::Option<i64>) {
                self.id = id;
            }

            fn field_values(&self) -> ::std::vec::Vec<(&'static str, ::strata_db::value::Value)> {
                ::std::vec![#(#field_values),*]
            }

            fn from_row(row: &::strata_db::query::Row) -> ::strata_db::StrataResult<Self> {
                ::core::result::Result::Ok(Self {
                    id: row.get("id")?,
                    #(#from_row),*
                })
            }
        }
    })
}

/// Generates a `FieldDef` construction expression for one field.
fn generate_field_def(f: &FieldOpts) -> syn::Result<TokenStream> {
    let name = f.name();
    let base = infer_field_def(f, &name)?;
    let is_text = base.1;
    let mut chain = Vec::new();

    if let Some(min) = f.min_length {
        chain.push(quote! { .min_length(#min) });
    }
    if f.unique {
        chain.push(quote! { .unique() });
    }
    if f.null {
        chain.push(quote! { .nullable() });
    }
    if f.hidden {
        chain.push(quote! { .hidden() });
    }
    if let Some(def) = &f.default {
        if is_text {
            chain.push(quote! { .default(#def) });
        } else {
            let expr: syn::Expr = syn::parse_str(def).map_err(|e| {
                syn::Error::new_spanned(&f.ty, format!("invalid default `{def}`: {e}"))
            })?;
            chain.push(quote! { .default(#expr) });
        }
    }
    if let Some(producer) = &f.default_fn {
        chain.push(quote! { .default_fn(#producer) });
    }
    if let Some(action) = &f.on_delete {
        let action = referential_action(action, &f.ty)?;
        chain.push(quote! { .on_delete(#action) });
    }
    if let Some(action) = &f.on_update {
        let action = referential_action(action, &f.ty)?;
        chain.push(quote! { .on_update(#action) });
    }

    let ctor = base.0;
    Ok(quote! { #ctor #(#chain)* })
}

/// Picks the `FieldDef` constructor from the attributes and Rust type.
/// The flag reports whether the field holds text.
fn infer_field_def(f: &FieldOpts, name: &str) -> syn::Result<(TokenStream, bool)> {
    let fields = quote! { ::strata_db::fields::FieldDef };

    if let Some(target) = &f.foreign_key {
        return Ok((quote! { #fields::foreign_key(#name, #target) }, false));
    }
    if let Some(target) = &f.many_to_many {
        if !type_to_string(&f.ty).ends_with("ManyToMany") {
            return Err(syn::Error::new_spanned(
                &f.ty,
                "many_to_many fields must have type `ManyToMany`",
            ));
        }
        return Ok((quote! { #fields::many_to_many(#name, #target) }, false));
    }

    let inner = unwrap_option_type(&f.ty).unwrap_or(&f.ty);
    let type_str = type_to_string(inner);

    let ctor = match type_str.as_str() {
        "String" if f.email => {
            let base = quote! { #fields::email(#name) };
            return Ok((
                f.max_length
                    .map_or_else(|| base.clone(), |ml| quote! { #base.max_length(#ml) }),
                true,
            ));
        }
        "String" => {
            return Ok((
                f.max_length.map_or_else(
                    || quote! { #fields::text(#name) },
                    |ml| quote! { #fields::char(#name, #ml) },
                ),
                true,
            ));
        }
        "i64" | "i32" => quote! { #fields::integer(#name) },
        "f64" => quote! { #fields::float(#name) },
        "bool" => quote! { #fields::boolean(#name) },
        s if s.contains("NaiveDateTime") => {
            return Err(syn::Error::new_spanned(
                &f.ty,
                "use `DateTime<Utc>` for timestamp fields",
            ))
        }
        s if s.contains("DateTime") => quote! { #fields::datetime(#name) },
        s if s.contains("NaiveDate") => quote! { #fields::date(#name) },
        other => {
            return Err(syn::Error::new_spanned(
                &f.ty,
                format!("unsupported field type `{other}`"),
            ))
        }
    };

    let ctor = match f.max_length {
        Some(ml) => quote! { #ctor.max_length(#ml) },
        None => ctor,
    };
    Ok((ctor, false))
}

fn referential_action(action: &str, span: &Type) -> syn::Result<TokenStream> {
    let variant = match action {
        "cascade" => quote! { Cascade },
        "restrict" => quote! { Restrict },
        "set_null" => quote! { SetNull },
        "set_default" => quote! { SetDefault },
        "no_action" => quote! { NoAction },
        other => {
            return Err(syn::Error::new_spanned(
                span,
                format!("unknown referential action `{other}`"),
            ))
        }
    };
    Ok(quote! { ::strata_db::fields::ReferentialAction::#variant })
}

/// If the type is `Option<T>`, returns `Some(&T)`. Otherwise `None`.
pub(crate) fn unwrap_option_type(ty: &Type) -> Option<&Type> {
    if let Type::Path(type_path) = ty {
        let segment = type_path.path.segments.last()?;
        if segment.ident == "Option" {
            if let syn::PathArguments::AngleBracketed(ref args) = segment.arguments {
                if let Some(syn::GenericArgument::Type(inner)) = args.args.first() {
                    return Some(inner);
                }
            }
        }
    }
    None
}

/// Converts a `syn::Type` to a string for matching.
pub(crate) fn type_to_string(ty: &Type) -> String {
    quote!(#ty).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    fn expand_str(input: DeriveInput) -> String {
        derive_model_impl(input).to_string()
    }

    #[test]
    fn test_unwrap_option_type() {
        let ty: Type = parse_quote!(Option<i64>);
        assert_eq!(type_to_string(unwrap_option_type(&ty).unwrap()), "i64");
        let ty: Type = parse_quote!(String);
        assert!(unwrap_option_type(&ty).is_none());
    }

    #[test]
    fn test_missing_id_is_an_error() {
        let out = expand_str(parse_quote! {
            struct Tag { label: String }
        });
        assert!(out.contains("compile_error"));
        assert!(out.contains("requires an `id: Option<i64>` field"));
    }

    #[test]
    fn test_wrong_id_type_is_an_error() {
        let out = expand_str(parse_quote! {
            struct Tag { id: i64 }
        });
        assert!(out.contains("must have type `Option<i64>`"));
    }

    #[test]
    fn test_unsupported_type_is_an_error() {
        let out = expand_str(parse_quote! {
            struct Tag { id: Option<i64>, blob: Vec<u8> }
        });
        assert!(out.contains("unsupported field type"));
    }

    #[test]
    fn test_unknown_action_is_an_error() {
        let out = expand_str(parse_quote! {
            struct Post {
                id: Option<i64>,
                #[field(foreign_key = "User", on_delete = "explode")]
                author_id: i64,
            }
        });
        assert!(out.contains("unknown referential action `explode`"));
    }

    #[test]
    fn test_text_default_stays_literal() {
        let out = expand_str(parse_quote! {
            struct Post {
                id: Option<i64>,
                #[field(max_length = 20, default = "draft")]
                status: String,
                #[field(default = "3")]
                rank: i64,
            }
        });
        assert!(out.contains(". default (\"draft\")"));
        assert!(out.contains(". default (3)"));
    }

    #[test]
    fn test_many_to_many_requires_marker_type() {
        let out = expand_str(parse_quote! {
            struct Post {
                id: Option<i64>,
                #[field(many_to_many = "Tag")]
                tags: Vec<i64>,
            }
        });
        assert!(out.contains("must have type `ManyToMany`"));
    }
}

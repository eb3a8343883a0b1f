//! Model field definitions.
//!
//! [`FieldDef`] describes a single column (or, for many-to-many fields, a
//! junction table) and knows how to render its DDL fragment.

pub mod types;
pub mod validation;

pub use types::{now, FieldDef, FieldDefault, FieldType, ReferentialAction};

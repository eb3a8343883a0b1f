//! Query building and compilation.
//!
//! - [`compiler`] - [`Query`], [`SqlCompiler`], and [`Row`]
//! - [`queryset`] - The lazy [`QuerySet`] and the per-model [`Manager`]

pub mod compiler;
pub mod queryset;

pub use compiler::{FromValue, OrderBy, Query, Row, Search, SqlCompiler, Statement};
pub use queryset::{Manager, QuerySet};

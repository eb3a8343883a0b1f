//! # strata-core
//!
//! Foundation types shared by every strata crate. This crate has no other
//! workspace dependencies.
//!
//! ## Modules
//!
//! - [`error`] - [`StrataError`], [`ValidationError`], and the result alias
//! - [`settings`] - Application settings
//! - [`settings_loader`] - TOML/JSON/environment loading
//! - [`logging`] - Tracing subscriber setup

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;

pub use error::{StrataError, StrataResult, ValidationError};
pub use settings::Settings;

//! # strata-admin
//!
//! A generic admin service over every model in a
//! [`ModelRegistry`](strata_db::registry::ModelRegistry). It lists, reads,
//! creates, updates and deletes rows by model name, checks the caller's
//! permissions on every call, and redacts hidden and excluded fields.
//!
//! The service is transport-agnostic: an HTTP layer decodes requests into
//! [`ListParams`] and JSON bodies, builds a
//! [`Caller`](strata_auth::Caller), and serializes the responses.

#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]

pub mod api;
pub mod service;

pub use api::{AppModels, IndexResponse, ListParams, ListResponse, ModelInfo, SchemaResponse};
pub use service::AdminService;

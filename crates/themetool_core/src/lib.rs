//! Core library for themetool: catalog records, reconciliation,
//! entry building, persistence with backups, and validation.

pub mod builder;
pub mod catalog;
pub mod config;
pub mod github;
pub mod macros;
pub mod reconcile;
pub mod session;
pub mod store;
pub mod validate;

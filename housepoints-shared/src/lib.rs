//! # Housepoints Shared Library
//!
//! Core of the house points system, used by the API server and the
//! standings reconciler.
//!
//! ## Module Organization
//!
//! - `models`: database rows and their queries
//! - `store`: persistence interface with PostgreSQL and in-memory backends
//! - `auth`: password hashing, session tokens and role checks
//! - `ledger`: recording, editing and removing activity results
//! - `standings`: house totals and their reconciliation
//! - `db`: connection pool and migrations

pub mod auth;
pub mod db;
pub mod ledger;
pub mod models;
pub mod standings;
pub mod store;

/// Current version of the housepoints shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
